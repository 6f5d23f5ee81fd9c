// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Evaluation runs and their lifecycle.
//!
//! An [`EvaluationRun`] is one end-to-end comparison triggered by a single
//! qualifying pull-request event. Its progress is tracked by a [`RunRecord`]
//! that enforces the run state machine:
//!
//! ```text
//! Received -> WorkspaceAllocated -> BaseBuilt -> HeadBuilt -> Compared -> Reported -> Released
//!     \______________\________________\____________\____________\___________\
//!                                                                            -> Aborted
//! ```
//!
//! `Released` and `Aborted` are terminal. `Aborted` is reachable from every
//! non-terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an evaluation run.
///
/// Generated from a v4 UUID (122 bits from the OS random source) and
/// rendered as 32 lowercase hex characters, so it is safe to use as a
/// directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh, collision-resistant run identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing identifier.
    ///
    /// Only ASCII alphanumerics, `-` and `_` are accepted so the identifier
    /// can never escape the workspace root when used as a path component.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::invalid_input("run id must not be empty"));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(crate::Error::invalid_input(format!(
                "run id '{}' contains characters outside [A-Za-z0-9_-]",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Get the ID as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fetchable source location: a clone URL plus an optional revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Repository clone URL (or any location the fetcher understands).
    pub url: String,
    /// Branch or tag to check out. `None` means the repository default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl SourceRef {
    /// Source at the repository's default branch.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revision: None,
        }
    }

    /// Pin the source to a branch or tag.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(rev) => write!(f, "{}#{}", self.url, rev),
            None => write!(f, "{}", self.url),
        }
    }
}

/// One PR-triggered comparison of a base and a head source tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    /// Unique run identifier; also names the run's workspace.
    pub run_id: RunId,
    /// Source of the base (target branch) build.
    pub base: SourceRef,
    /// Source of the head (PR branch) build.
    pub head: SourceRef,
    /// Pull request number the report is posted to.
    pub pr_number: u64,
    /// Pull request title, for logging only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
}

impl EvaluationRun {
    /// Create a run with a freshly generated identifier.
    pub fn new(base: SourceRef, head: SourceRef, pr_number: u64) -> Self {
        Self {
            run_id: RunId::generate(),
            base,
            head,
            pr_number,
            title: None,
            created_at: Utc::now(),
        }
    }

    /// Override the generated identifier.
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// Attach the pull request title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// States of the per-run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Qualifying event received, nothing allocated yet.
    Received,
    /// Base and head directories exist.
    WorkspaceAllocated,
    /// Base tree built and its result normalized.
    BaseBuilt,
    /// Head tree built and its result normalized.
    HeadBuilt,
    /// Comparison computed.
    Compared,
    /// Report rendered and submitted (successfully or not).
    Reported,
    /// Workspace removed. Terminal.
    Released,
    /// Run failed. Terminal.
    Aborted,
}

impl RunState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Released | RunState::Aborted)
    }

    /// The next state on the success path, if any.
    pub fn successor(self) -> Option<RunState> {
        match self {
            RunState::Received => Some(RunState::WorkspaceAllocated),
            RunState::WorkspaceAllocated => Some(RunState::BaseBuilt),
            RunState::BaseBuilt => Some(RunState::HeadBuilt),
            RunState::HeadBuilt => Some(RunState::Compared),
            RunState::Compared => Some(RunState::Reported),
            RunState::Reported => Some(RunState::Released),
            RunState::Released | RunState::Aborted => None,
        }
    }

    /// Whether `self -> next` is allowed.
    pub fn can_transition_to(self, next: RunState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == RunState::Aborted || self.successor() == Some(next)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Received => "received",
            RunState::WorkspaceAllocated => "workspace_allocated",
            RunState::BaseBuilt => "base_built",
            RunState::HeadBuilt => "head_built",
            RunState::Compared => "compared",
            RunState::Reported => "reported",
            RunState::Released => "released",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Report posted as a PR comment.
    Reported,
    /// Report rendered but the comment could not be posted, or posting was disabled.
    ReportedWithoutComment,
    /// Event did not qualify; nothing was built.
    Ignored,
    /// A run-fatal error occurred.
    Aborted,
}

impl RunOutcome {
    /// Lowercase outcome name, also used as a metrics label.
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Reported => "reported",
            RunOutcome::ReportedWithoutComment => "reported_without_comment",
            RunOutcome::Ignored => "ignored",
            RunOutcome::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// Previous state.
    pub from: RunState,
    /// New state.
    pub to: RunState,
    /// When the change happened.
    pub at: DateTime<Utc>,
}

/// Progress and result bookkeeping for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// The run this record belongs to.
    pub run_id: RunId,
    /// Pull request number.
    pub pr_number: u64,
    /// Current state.
    pub state: RunState,
    /// Append-only transition log.
    #[serde(default)]
    pub transitions: Vec<StateTransition>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Set once the run reaches a terminal state or is finished as ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Final outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
    /// Number of comparison warnings raised.
    #[serde(default)]
    pub warnings: usize,
    /// Cause of an abort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Whether the workspace was removed (also tracked for aborted runs).
    #[serde(default)]
    pub cleaned_up: bool,
}

impl RunRecord {
    /// Start a record in [`RunState::Received`].
    pub fn new(run: &EvaluationRun) -> Self {
        Self {
            run_id: run.run_id.clone(),
            pr_number: run.pr_number,
            state: RunState::Received,
            transitions: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            outcome: None,
            warnings: 0,
            error_message: None,
            cleaned_up: false,
        }
    }

    /// Move to `next`, rejecting transitions the state machine forbids.
    pub fn advance(&mut self, next: RunState) -> crate::Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(crate::Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(run_id = %self.run_id, from = %self.state, to = %next, "Run state transition");
        self.transitions.push(StateTransition {
            from: self.state,
            to: next,
            at: Utc::now(),
        });
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        if next == RunState::Released && self.outcome.is_none() {
            self.outcome = Some(RunOutcome::Reported);
        }
        Ok(())
    }

    /// Enter [`RunState::Aborted`] with the given cause. No-op on terminal records.
    pub fn abort(&mut self, error: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        // Aborted is reachable from every non-terminal state.
        let _ = self.advance(RunState::Aborted);
        self.outcome = Some(RunOutcome::Aborted);
        self.error_message = Some(error.into());
    }

    /// Close a record for an event that did not qualify.
    pub fn ignore(&mut self) {
        self.outcome = Some(RunOutcome::Ignored);
        self.finished_at = Some(Utc::now());
    }

    /// Wall time between start and finish, if finished.
    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at.map(|end| {
            end.signed_duration_since(self.started_at)
                .num_milliseconds()
                .unsigned_abs()
        })
    }
}
