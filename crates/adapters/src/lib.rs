// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Build runner, run orchestrator and external integrations for Benchwatch.
//!
//! # Overview
//!
//! [`RunOrchestrator`] takes a pull-request event through the whole
//! pipeline. It owns a [`BuildRunner`] (fetch, install, benchmark, load) and
//! optionally a [`CommentPoster`] for publishing the report. Both external
//! seams, [`SourceFetcher`] and [`CommentPoster`], are traits so runs can be
//! driven entirely in-process.
//!
//! # Modules
//!
//! - [`config`] - layered settings
//! - [`error`] - run-fatal errors
//! - [`runner`] - the build runner
//! - [`orchestrator`] - the per-run state machine driver
//! - [`upstream`] - process, git and GitHub integrations

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod runner;
pub mod upstream;

pub use config::{ConfigError, ResultSource, RunnerConfig, Settings};
pub use error::{BuildError, ExecutionFailure, RunError};
pub use orchestrator::{RunOrchestrator, RunSummary};
pub use runner::BuildRunner;
pub use upstream::git::{FetchError, GitFetcher, SourceFetcher};
pub use upstream::github::{CommentPostError, CommentPoster, CommentTarget, GitHubClient};
