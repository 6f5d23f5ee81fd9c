// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core error type.

use crate::execution::RunState;
use thiserror::Error;

/// Errors raised by core model operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A value failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A run attempted a state change the state machine forbids.
    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidTransition {
        /// State the run was in.
        from: RunState,
        /// State that was requested.
        to: RunState,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
