// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run-fatal error types.

use crate::upstream::git::FetchError;
use crate::upstream::process::ProcessError;
use benchwatch_benchmarks::compare::Side;
use benchwatch_benchmarks::MalformedResultError;
use benchwatch_core::WorkspaceError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why the benchmark step failed.
#[derive(Debug, Error)]
pub enum ExecutionFailure {
    /// The process was killed after exceeding its timeout.
    #[error("timed out after {after:?}")]
    Timeout {
        /// The enforced limit.
        after: Duration,
    },

    /// The process exited unsuccessfully.
    #[error("exited with status {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZeroExit {
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Tail of stderr.
        stderr: String,
    },

    /// The process could not be started or awaited.
    #[error("could not run: {0}")]
    Spawn(String),

    /// The process succeeded but left no result artifact.
    #[error("no result artifact at {}", .path.display())]
    MissingArtifact {
        /// Expected artifact location.
        path: PathBuf,
    },

    /// The result artifact exists but could not be read.
    #[error("cannot read result artifact {}: {source}", .path.display())]
    UnreadableArtifact {
        /// Artifact location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl From<ProcessError> for ExecutionFailure {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Timeout { timeout, .. } => ExecutionFailure::Timeout { after: timeout },
            ProcessError::NonZeroExit { code, stderr, .. } => {
                ExecutionFailure::NonZeroExit { code, stderr }
            }
            other => ExecutionFailure::Spawn(other.to_string()),
        }
    }
}

/// Errors raised while building one side of a run.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The source tree could not be materialized.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Dependency installation failed.
    #[error("Dependency installation '{command}' failed: {source}")]
    Dependency {
        /// Command line that failed.
        command: String,
        /// Process failure.
        #[source]
        source: ProcessError,
    },

    /// The benchmark step failed or timed out.
    #[error("Benchmark execution '{command}' failed: {reason}")]
    BenchmarkExecution {
        /// Command line that failed, or the artifact load when no command ran.
        command: String,
        /// Failure reason.
        reason: ExecutionFailure,
    },

    /// The produced artifact does not match the result schema.
    #[error("Malformed benchmark result: {0}")]
    MalformedResult(#[from] MalformedResultError),
}

impl BuildError {
    /// Whether the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BuildError::BenchmarkExecution {
                reason: ExecutionFailure::Timeout { .. },
                ..
            }
        )
    }
}

/// Errors that abort an evaluation run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The workspace could not be allocated.
    #[error("Workspace allocation failed: {0}")]
    Workspace(#[from] WorkspaceError),

    /// One of the two builds failed.
    #[error("{side} build failed: {source}")]
    Build {
        /// Which build failed.
        side: Side,
        /// Underlying failure.
        #[source]
        source: BuildError,
    },
}

impl RunError {
    pub(crate) fn build(side: Side) -> impl FnOnce(BuildError) -> RunError {
        move |source| RunError::Build { side, source }
    }
}
