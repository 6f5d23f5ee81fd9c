// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Integrations with the external collaborators of an evaluation run.
//!
//! - **Process**: external command execution with an enforced timeout
//! - **Git**: source tree materialization from a clone URL
//! - **GitHub**: publishing the rendered report as a PR comment
//!
//! Each integration exposes a small trait or function so the orchestrator
//! can be exercised with in-process fakes.

pub mod git;
pub mod github;
pub mod process;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use super::git::{FetchError, GitFetcher, SourceFetcher};
    pub use super::github::{CommentPostError, CommentPoster, CommentTarget, GitHubClient};
    pub use super::process::{run_command, ProcessError, ProcessOutput};
}
