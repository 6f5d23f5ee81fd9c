// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core types for Benchwatch.
//!
//! This crate holds the pieces every other Benchwatch crate agrees on:
//!
//! - [`event`] - the pull-request webhook payload and its qualification rules
//! - [`execution`] - evaluation runs, run identifiers and the run state machine
//! - [`workspace`] - isolated per-run working directories
//! - [`error`] - the core error type

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod event;
pub mod execution;
pub mod workspace;

pub use error::{Error, Result};
pub use event::PullRequestEvent;
pub use execution::{EvaluationRun, RunId, RunOutcome, RunRecord, RunState, SourceRef};
pub use workspace::{Workspace, WorkspaceError, WorkspaceLease, WorkspaceManager};
