// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pull-request webhook payload.
//!
//! Only the fields the pipeline needs are modelled; everything else in the
//! GitHub payload is ignored during deserialization.

use crate::execution::{EvaluationRun, SourceRef};
use serde::{Deserialize, Serialize};

/// Actions that trigger an evaluation run.
pub const QUALIFYING_ACTIONS: &[&str] = &["opened", "synchronize"];

/// A `pull_request` webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestEvent {
    /// Event action (`opened`, `synchronize`, `closed`, ...).
    pub action: String,
    /// Pull request number.
    pub number: u64,
    /// Pull request details.
    pub pull_request: PullRequest,
    /// The repository the pull request targets.
    pub repository: Repository,
}

/// Pull request section of the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// Title, used for logging.
    #[serde(default)]
    pub title: Option<String>,
    /// The PR branch.
    pub head: BranchRef,
    /// The target branch.
    #[serde(default)]
    pub base: Option<BranchRef>,
}

/// One side of a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRef {
    /// Branch name.
    #[serde(rename = "ref", default)]
    pub branch: Option<String>,
    /// Repository holding the branch.
    pub repo: Repository,
}

/// Repository section of the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// Clone URL.
    pub clone_url: String,
}

impl PullRequestEvent {
    /// Whether this event should start an evaluation run.
    pub fn is_qualifying(&self) -> bool {
        QUALIFYING_ACTIONS.contains(&self.action.as_str())
    }

    /// Build the evaluation run for this event.
    ///
    /// The base source is the target repository and the head source is the
    /// PR's repository, each pinned to its branch when the payload names one.
    pub fn to_run(&self) -> EvaluationRun {
        let mut base = SourceRef::new(&self.repository.clone_url);
        if let Some(branch) = self.pull_request.base.as_ref().and_then(|b| b.branch.clone()) {
            base = base.with_revision(branch);
        }
        let mut head = SourceRef::new(&self.pull_request.head.repo.clone_url);
        if let Some(branch) = self.pull_request.head.branch.clone() {
            head = head.with_revision(branch);
        }
        let run = EvaluationRun::new(base, head, self.number);
        match &self.pull_request.title {
            Some(title) => run.with_title(title.clone()),
            None => run,
        }
    }
}
