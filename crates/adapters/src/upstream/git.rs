// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Source tree materialization.
//!
//! [`SourceFetcher`] is the seam between the build runner and whatever
//! produces a working tree from a [`SourceRef`]. [`GitFetcher`] shells out to
//! the `git` client.

use super::process::{run_command, ProcessError};
use async_trait::async_trait;
use benchwatch_core::SourceRef;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// The source could not be materialized.
#[derive(Debug, Error)]
#[error("Failed to fetch {location}: {reason}")]
pub struct FetchError {
    /// The requested source, as displayed.
    pub location: String,
    /// Why fetching failed.
    pub reason: String,
}

impl FetchError {
    /// Create a fetch error for `source`.
    pub fn new(source: &SourceRef, reason: impl Into<String>) -> Self {
        Self {
            location: source.to_string(),
            reason: reason.into(),
        }
    }
}

/// Materializes a source tree into a directory.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Populate the (empty, existing) `target` directory with `source`.
    async fn fetch(&self, source: &SourceRef, target: &Path) -> Result<(), FetchError>;
}

/// Fetches sources with `git clone`.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: String,
    timeout: Duration,
    shallow: bool,
}

impl GitFetcher {
    /// Use the `git` on `PATH`, killing clones that exceed `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "git".to_string(),
            timeout,
            shallow: true,
        }
    }

    /// Use a specific git executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Clone full history instead of a single commit.
    pub fn full_history(mut self) -> Self {
        self.shallow = false;
        self
    }

    /// The argument vector for cloning `source` into `target`.
    pub fn clone_args(&self, source: &SourceRef, target: &Path) -> Vec<String> {
        let mut argv = vec![self.program.clone(), "clone".to_string(), "--quiet".to_string()];
        if self.shallow {
            argv.push("--depth".to_string());
            argv.push("1".to_string());
        }
        if let Some(rev) = &source.revision {
            argv.push("--branch".to_string());
            argv.push(rev.clone());
        }
        argv.push("--".to_string());
        argv.push(source.url.clone());
        argv.push(target.to_string_lossy().into_owned());
        argv
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, source: &SourceRef, target: &Path) -> Result<(), FetchError> {
        if source.url.trim().is_empty() {
            return Err(FetchError::new(source, "empty clone URL"));
        }
        info!(source = %source, dir = %target.display(), "Cloning source");
        // The target exists and is empty, so git clones straight into it.
        run_command(&self.clone_args(source, Path::new(".")), target, self.timeout)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                ProcessError::NonZeroExit { stderr, .. } => FetchError::new(source, stderr),
                other => FetchError::new(source, other.to_string()),
            })
    }
}
