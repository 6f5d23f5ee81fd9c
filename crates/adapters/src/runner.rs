// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Build runner.
//!
//! Turns a source reference into a [`BenchmarkResult`] in four steps:
//! fetch, install, benchmark, load. Each step can fail and nothing is
//! retried. The runner writes only inside the target directory and never
//! removes it; the workspace manager owns teardown.

use crate::config::{ResultSource, RunnerConfig};
use crate::error::{BuildError, ExecutionFailure};
use crate::upstream::git::SourceFetcher;
use crate::upstream::process::{display_command, run_command, ProcessError};
use benchwatch_benchmarks::normalize::normalize_slice;
use benchwatch_benchmarks::BenchmarkResult;
use benchwatch_core::SourceRef;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// File the module loader writes the exported result to, inside the target.
pub const MODULE_OUTPUT_FILE: &str = ".benchwatch-result.json";

/// Builds one checkout and collects its benchmark result.
#[derive(Clone)]
pub struct BuildRunner {
    fetcher: Arc<dyn SourceFetcher>,
    install_command: Vec<String>,
    bench_command: Vec<String>,
    result_source: ResultSource,
    timeout: Duration,
}

impl std::fmt::Debug for BuildRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildRunner")
            .field("install_command", &self.install_command)
            .field("bench_command", &self.bench_command)
            .field("result_source", &self.result_source)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl BuildRunner {
    /// Create a runner that fetches with `fetcher` and kills any external
    /// process running longer than `timeout`. No install or benchmark command
    /// is run until configured.
    pub fn new(fetcher: Arc<dyn SourceFetcher>, timeout: Duration) -> Self {
        Self {
            fetcher,
            install_command: Vec::new(),
            bench_command: Vec::new(),
            result_source: ResultSource::default(),
            timeout,
        }
    }

    /// Create a runner from configuration.
    pub fn from_config(fetcher: Arc<dyn SourceFetcher>, config: &RunnerConfig) -> Self {
        Self::new(fetcher, config.command_timeout())
            .with_install_command(config.install_command.clone())
            .with_bench_command(config.bench_command.clone())
            .with_result_source(config.result_source.clone())
    }

    /// Set the dependency installation command. Empty skips the step.
    pub fn with_install_command(mut self, argv: Vec<String>) -> Self {
        self.install_command = argv;
        self
    }

    /// Set the benchmark command. Empty skips the step.
    pub fn with_bench_command(mut self, argv: Vec<String>) -> Self {
        self.bench_command = argv;
        self
    }

    /// Set where the result is loaded from.
    pub fn with_result_source(mut self, source: ResultSource) -> Self {
        self.result_source = source;
        self
    }

    /// Fetch, install and benchmark `source` in `target`, then load the result.
    pub async fn build(
        &self,
        source: &SourceRef,
        target: &Path,
    ) -> Result<BenchmarkResult, BuildError> {
        let started = Instant::now();

        self.fetcher.fetch(source, target).await?;

        if !self.install_command.is_empty() {
            info!(dir = %target.display(), command = %display_command(&self.install_command), "Installing dependencies");
            run_command(&self.install_command, target, self.timeout)
                .await
                .map_err(|e| install_error(&self.install_command, e))?;
        }

        if !self.bench_command.is_empty() {
            info!(dir = %target.display(), command = %display_command(&self.bench_command), "Running benchmarks");
            self.run_bench_step(&self.bench_command, target).await?;
        }

        let result = self.load_result(target).await?;
        info!(
            source = %source,
            suites = result.suites.len(),
            tests = result.test_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Build finished"
        );
        Ok(result)
    }

    async fn load_result(&self, target: &Path) -> Result<BenchmarkResult, BuildError> {
        match &self.result_source {
            ResultSource::Artifact { path } => {
                let step = if self.bench_command.is_empty() {
                    format!("load {}", path.display())
                } else {
                    display_command(&self.bench_command)
                };
                read_result(&target.join(path), step).await
            }
            ResultSource::Module {
                entry_point,
                loader,
            } => {
                // The loader runs inside the target, so hand it absolute paths.
                let target = absolute(target);
                let output = target.join(MODULE_OUTPUT_FILE);
                let mut argv = loader.clone();
                argv.push(target.join(entry_point).to_string_lossy().into_owned());
                argv.push(output.to_string_lossy().into_owned());
                debug!(entry_point = %entry_point.display(), "Loading result module");
                self.run_bench_step(&argv, &target).await?;
                read_result(&output, display_command(loader)).await
            }
        }
    }

    async fn run_bench_step(&self, argv: &[String], target: &Path) -> Result<(), BuildError> {
        run_command(argv, target, self.timeout)
            .await
            .map(|_| ())
            .map_err(|e| BuildError::BenchmarkExecution {
                command: display_command(argv),
                reason: e.into(),
            })
    }
}

// Timeouts count as benchmark execution failures regardless of the step.
fn install_error(argv: &[String], err: ProcessError) -> BuildError {
    match err {
        ProcessError::Timeout { .. } => BuildError::BenchmarkExecution {
            command: display_command(argv),
            reason: err.into(),
        },
        source => BuildError::Dependency {
            command: display_command(argv),
            source,
        },
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

async fn read_result(path: &Path, command: String) -> Result<BenchmarkResult, BuildError> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BuildError::BenchmarkExecution {
                command,
                reason: ExecutionFailure::MissingArtifact {
                    path: path.to_path_buf(),
                },
            })
        }
        Err(source) => {
            return Err(BuildError::BenchmarkExecution {
                command,
                reason: ExecutionFailure::UnreadableArtifact {
                    path: path.to_path_buf(),
                    source,
                },
            })
        }
    };
    Ok(normalize_slice(&data)?)
}
