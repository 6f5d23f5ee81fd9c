// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run orchestrator.
//!
//! Sequences one evaluation run: allocate the workspace, build base and
//! head, compare, render, post the comment, release the workspace.
//!
//! ```text
//! Received -> WorkspaceAllocated -> BaseBuilt -> HeadBuilt -> Compared -> Reported -> Released
//!     \______________\_______________\___________\___________\__________\-> Aborted
//! ```
//!
//! The workspace is released on every exit path, on the blocking thread pool
//! since a checkout can hold a large `node_modules` tree. A failed release
//! after an abort is logged and never replaces the original error. Comment posting
//! failures are logged and counted; they do not abort the run.

use crate::config::Settings;
use crate::error::RunError;
use crate::runner::BuildRunner;
use crate::upstream::git::{GitFetcher, SourceFetcher};
use crate::upstream::github::{CommentPoster, CommentTarget};
use benchwatch_benchmarks::compare::Side;
use benchwatch_benchmarks::{build_report, Report, ReportOptions};
use benchwatch_core::{
    EvaluationRun, PullRequestEvent, RunOutcome, RunRecord, RunState, WorkspaceLease,
    WorkspaceManager,
};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Counter of finished runs, labelled by outcome.
pub const RUNS_TOTAL: &str = "benchwatch_runs_total";

/// Counter of comments that could not be posted.
pub const COMMENT_FAILURES_TOTAL: &str = "benchwatch_comment_failures_total";

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Bookkeeping for the run.
    pub record: RunRecord,
    /// The report, absent for ignored events.
    pub report: Option<Report>,
}

/// Drives evaluation runs end to end.
///
/// One orchestrator is shared by all runs; runs never share a workspace.
#[derive(Clone)]
pub struct RunOrchestrator {
    workspaces: WorkspaceManager,
    runner: BuildRunner,
    poster: Option<Arc<dyn CommentPoster>>,
    owner: String,
    repo: String,
    report_options: ReportOptions,
    parallel_builds: bool,
}

impl std::fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("workspace_root", &self.workspaces.root())
            .field("runner", &self.runner)
            .field("posting", &self.poster.is_some())
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("parallel_builds", &self.parallel_builds)
            .finish()
    }
}

impl RunOrchestrator {
    /// Create an orchestrator that renders reports without posting them.
    pub fn new(workspaces: WorkspaceManager, runner: BuildRunner) -> Self {
        Self {
            workspaces,
            runner,
            poster: None,
            owner: String::new(),
            repo: String::new(),
            report_options: ReportOptions::default(),
            parallel_builds: false,
        }
    }

    /// Wire an orchestrator from settings, fetching sources with `git`.
    pub fn from_settings(settings: &Settings, poster: Option<Arc<dyn CommentPoster>>) -> Self {
        let fetcher: Arc<dyn SourceFetcher> =
            Arc::new(GitFetcher::new(settings.runner.command_timeout()));
        let runner = BuildRunner::from_config(fetcher, &settings.runner);
        let mut orchestrator =
            Self::new(WorkspaceManager::new(&settings.runner.workspace_root), runner)
                .with_report_options(ReportOptions {
                    decimal_precision: settings.runner.decimal_precision,
                })
                .with_parallel_builds(settings.runner.parallel_builds);
        if let Some(poster) = poster {
            orchestrator = orchestrator.with_poster(
                poster,
                settings.github.owner.clone(),
                settings.github.repo.clone(),
            );
        }
        orchestrator
    }

    /// Post reports to pull requests of `owner/repo` through `poster`.
    pub fn with_poster(
        mut self,
        poster: Arc<dyn CommentPoster>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        self.poster = Some(poster);
        self.owner = owner.into();
        self.repo = repo.into();
        self
    }

    /// Set report rendering options.
    pub fn with_report_options(mut self, options: ReportOptions) -> Self {
        self.report_options = options;
        self
    }

    /// Build base and head concurrently.
    pub fn with_parallel_builds(mut self, parallel: bool) -> Self {
        self.parallel_builds = parallel;
        self
    }

    /// React to a pull-request event. Events whose action does not qualify
    /// are recorded as ignored without touching the filesystem.
    pub async fn handle_event(&self, event: &PullRequestEvent) -> Result<RunSummary, RunError> {
        let run = event.to_run();
        if !event.is_qualifying() {
            debug!(action = %event.action, pr = event.number, "Ignoring pull request event");
            let mut record = RunRecord::new(&run);
            record.ignore();
            count_run(RunOutcome::Ignored);
            return Ok(RunSummary {
                record,
                report: None,
            });
        }
        self.evaluate(run).await
    }

    /// Execute one evaluation run.
    pub async fn evaluate(&self, run: EvaluationRun) -> Result<RunSummary, RunError> {
        let span = info_span!("evaluation_run", run_id = %run.run_id, pr = run.pr_number);
        self.evaluate_inner(run).instrument(span).await
    }

    async fn evaluate_inner(&self, run: EvaluationRun) -> Result<RunSummary, RunError> {
        info!(base = %run.base, head = %run.head, "Evaluation run started");
        let mut record = RunRecord::new(&run);

        let lease = match self.workspaces.lease(&run.run_id) {
            Ok(lease) => lease,
            Err(e) => {
                error!(error = %e, "Workspace allocation failed");
                record.abort(e.to_string());
                count_run(RunOutcome::Aborted);
                return Err(e.into());
            }
        };
        transition(&mut record, RunState::WorkspaceAllocated);

        let outcome = self.execute(&run, &lease, &mut record).await;
        let cleanup = release_workspace(lease).await;

        match outcome {
            Ok(report) => {
                match cleanup {
                    Ok(()) => record.cleaned_up = true,
                    Err(e) => warn!(error = %e, "Workspace cleanup failed"),
                }
                transition(&mut record, RunState::Released);
                let outcome = record.outcome.unwrap_or(RunOutcome::Reported);
                count_run(outcome);
                info!(
                    outcome = %outcome,
                    warnings = record.warnings,
                    duration_ms = record.duration_ms().unwrap_or_default(),
                    "Evaluation run finished"
                );
                Ok(RunSummary {
                    record,
                    report: Some(report),
                })
            }
            Err(e) => {
                error!(error = %e, state = %record.state, "Evaluation run aborted");
                record.abort(e.to_string());
                match cleanup {
                    Ok(()) => record.cleaned_up = true,
                    Err(cleanup_err) => {
                        error!(error = %cleanup_err, "Workspace cleanup after abort failed")
                    }
                }
                count_run(RunOutcome::Aborted);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run: &EvaluationRun,
        lease: &WorkspaceLease,
        record: &mut RunRecord,
    ) -> Result<Report, RunError> {
        let build_base = async {
            self.runner
                .build(&run.base, &lease.base_dir)
                .await
                .map_err(RunError::build(Side::Base))
        };
        let build_head = async {
            self.runner
                .build(&run.head, &lease.head_dir)
                .await
                .map_err(RunError::build(Side::Head))
        };

        let (base, head) = if self.parallel_builds {
            let (base, head) = tokio::try_join!(build_base, build_head)?;
            transition(record, RunState::BaseBuilt);
            transition(record, RunState::HeadBuilt);
            (base, head)
        } else {
            let base = build_base.await?;
            transition(record, RunState::BaseBuilt);
            let head = build_head.await?;
            transition(record, RunState::HeadBuilt);
            (base, head)
        };

        let report = build_report(&base, &head, &self.report_options);
        for warning in &report.comparison.warnings {
            warn!(warning = %warning, "Comparison warning");
        }
        record.warnings = report.comparison.warnings.len();
        transition(record, RunState::Compared);

        if !self.post(run, &report.body).await {
            record.outcome = Some(RunOutcome::ReportedWithoutComment);
        }
        transition(record, RunState::Reported);
        Ok(report)
    }

    /// Returns whether the comment was posted.
    async fn post(&self, run: &EvaluationRun, body: &str) -> bool {
        let Some(poster) = &self.poster else {
            debug!("Comment posting disabled");
            return false;
        };
        let target = CommentTarget {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            number: run.pr_number,
        };
        match poster.post_comment(&target, body).await {
            Ok(()) => true,
            Err(e) => {
                warn!(pull_request = %target, error = %e, "Failed to post benchmark comment");
                metrics::counter!(COMMENT_FAILURES_TOTAL).increment(1);
                false
            }
        }
    }
}

/// Remove the leased tree without blocking the async worker. If the cleanup
/// task panics, the lease's own drop removes the tree during unwinding.
async fn release_workspace(lease: WorkspaceLease) -> Result<(), String> {
    match tokio::task::spawn_blocking(move || lease.release()).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(format!("cleanup task failed: {e}")),
    }
}

fn transition(record: &mut RunRecord, next: RunState) {
    if let Err(e) = record.advance(next) {
        error!(error = %e, "Rejected run state transition");
    }
}

fn count_run(outcome: RunOutcome) {
    metrics::counter!(RUNS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResultSource;
    use crate::upstream::git::FetchError;
    use crate::upstream::github::CommentPostError;
    use async_trait::async_trait;
    use benchwatch_core::{RunId, SourceRef};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    const BASE_URL: &str = "https://github.com/acme/lib.git";
    const HEAD_URL: &str = "https://github.com/fork/lib.git";

    /// Writes `result.json` with the content registered for the source URL.
    struct FakeFetcher {
        results: HashMap<String, String>,
    }

    #[async_trait]
    impl SourceFetcher for FakeFetcher {
        async fn fetch(&self, source: &SourceRef, target: &Path) -> Result<(), FetchError> {
            let body = self
                .results
                .get(&source.url)
                .ok_or_else(|| FetchError::new(source, "repository not found"))?;
            std::fs::write(target.join("result.json"), body).unwrap();
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPoster {
        posted: Mutex<Vec<(CommentTarget, String)>>,
    }

    #[async_trait]
    impl CommentPoster for RecordingPoster {
        async fn post_comment(
            &self,
            target: &CommentTarget,
            body: &str,
        ) -> Result<(), CommentPostError> {
            self.posted
                .lock()
                .unwrap()
                .push((target.clone(), body.to_string()));
            Ok(())
        }
    }

    struct FailingPoster;

    #[async_trait]
    impl CommentPoster for FailingPoster {
        async fn post_comment(&self, _: &CommentTarget, _: &str) -> Result<(), CommentPostError> {
            Err(CommentPostError::Other("rate limited".to_string()))
        }
    }

    fn orchestrator(root: &Path, results: &[(&str, &str)]) -> RunOrchestrator {
        let fetcher = FakeFetcher {
            results: results
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        };
        let runner = BuildRunner::new(Arc::new(fetcher), Duration::from_secs(10))
            .with_result_source(ResultSource::Artifact {
                path: PathBuf::from("result.json"),
            });
        RunOrchestrator::new(WorkspaceManager::new(root), runner)
    }

    fn run() -> EvaluationRun {
        EvaluationRun::new(SourceRef::new(BASE_URL), SourceRef::new(HEAD_URL), 42)
    }

    fn event(action: &str) -> PullRequestEvent {
        serde_json::from_value(serde_json::json!({
            "action": action,
            "number": 42,
            "pull_request": { "head": { "repo": { "clone_url": HEAD_URL } } },
            "repository": { "clone_url": BASE_URL }
        }))
        .unwrap()
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path).map_or(true, |mut d| d.next().is_none())
    }

    #[tokio::test]
    async fn test_successful_run_posts_one_comment() {
        let tmp = tempfile::tempdir().unwrap();
        let poster = Arc::new(RecordingPoster::default());
        let orchestrator = orchestrator(
            tmp.path(),
            &[
                (BASE_URL, r#"{"suiteA":[{"name":"t1","count":1000}]}"#),
                (HEAD_URL, r#"{"suiteA":[{"name":"t1","count":1300}]}"#),
            ],
        )
        .with_poster(poster.clone(), "acme", "lib");

        let summary = orchestrator.evaluate(run()).await.unwrap();

        assert_eq!(summary.record.state, RunState::Released);
        assert_eq!(summary.record.outcome, Some(RunOutcome::Reported));
        assert!(summary.record.cleaned_up);
        let states: Vec<RunState> = summary.record.transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            [
                RunState::WorkspaceAllocated,
                RunState::BaseBuilt,
                RunState::HeadBuilt,
                RunState::Compared,
                RunState::Reported,
                RunState::Released
            ]
        );

        let posted = poster.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0.to_string(), "acme/lib#42");
        assert!(posted[0].1.contains("`+300`"));
        assert!(is_empty_dir(tmp.path()));
    }

    #[tokio::test]
    async fn test_parallel_builds() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(
            tmp.path(),
            &[
                (BASE_URL, r#"[{"name":"s","tests":[{"name":"t","count":10}]}]"#),
                (HEAD_URL, r#"[{"name":"s","tests":[{"name":"t","count":10}]}]"#),
            ],
        )
        .with_parallel_builds(true);

        let summary = orchestrator.evaluate(run()).await.unwrap();
        let report = summary.report.unwrap();
        assert_eq!(report.comparison.entry_count(), 1);
        assert_eq!(
            summary.record.outcome,
            Some(RunOutcome::ReportedWithoutComment)
        );
        assert!(is_empty_dir(tmp.path()));
    }

    #[tokio::test]
    async fn test_build_failure_aborts_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let poster = Arc::new(RecordingPoster::default());
        let orchestrator = orchestrator(
            tmp.path(),
            &[(BASE_URL, r#"{"suiteA":[{"name":"t1","count":1000}]}"#)],
        )
        .with_poster(poster.clone(), "acme", "lib");

        let err = orchestrator.evaluate(run()).await.unwrap_err();
        assert!(matches!(
            err,
            RunError::Build {
                side: Side::Head,
                ..
            }
        ));
        assert!(poster.posted.lock().unwrap().is_empty());
        assert!(is_empty_dir(tmp.path()));
    }

    #[tokio::test]
    async fn test_malformed_base_result_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(
            tmp.path(),
            &[
                (BASE_URL, r#"{"suiteA":[{"name":"t1","count":-1}]}"#),
                (HEAD_URL, r#"{"suiteA":[{"name":"t1","count":1}]}"#),
            ],
        );
        let err = orchestrator.evaluate(run()).await.unwrap_err();
        assert!(matches!(
            err,
            RunError::Build {
                side: Side::Base,
                ..
            }
        ));
        assert!(is_empty_dir(tmp.path()));
    }

    #[tokio::test]
    async fn test_comment_failure_does_not_abort() {
        let tmp = tempfile::tempdir().unwrap();
        let body = r#"{"suiteA":[{"name":"t1","count":5}]}"#;
        let orchestrator = orchestrator(tmp.path(), &[(BASE_URL, body), (HEAD_URL, body)])
            .with_poster(Arc::new(FailingPoster), "acme", "lib");

        let summary = orchestrator.evaluate(run()).await.unwrap();
        assert_eq!(summary.record.state, RunState::Released);
        assert_eq!(
            summary.record.outcome,
            Some(RunOutcome::ReportedWithoutComment)
        );
        assert!(summary.record.cleaned_up);
    }

    #[tokio::test]
    async fn test_missing_suite_still_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let poster = Arc::new(RecordingPoster::default());
        let orchestrator = orchestrator(
            tmp.path(),
            &[
                (BASE_URL, r#"{"suiteA":[{"name":"t1","count":1000}]}"#),
                (HEAD_URL, r#"{"suiteB":[{"name":"t1","count":1000}]}"#),
            ],
        )
        .with_poster(poster.clone(), "acme", "lib");

        let summary = orchestrator.evaluate(run()).await.unwrap();
        assert_eq!(summary.record.warnings, 1);
        assert_eq!(summary.report.unwrap().comparison.entry_count(), 0);
        assert_eq!(poster.posted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_workspace_collision_leaves_existing_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let run_id = RunId::new("fixed").unwrap();
        let existing = tmp.path().join("fixed");
        std::fs::create_dir_all(&existing).unwrap();
        std::fs::write(existing.join("keep.txt"), "x").unwrap();

        let orchestrator = orchestrator(tmp.path(), &[]);
        let err = orchestrator
            .evaluate(run().with_run_id(run_id))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Workspace(_)));
        assert!(existing.join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_non_qualifying_event_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("workspaces");
        let poster = Arc::new(RecordingPoster::default());
        let orchestrator =
            orchestrator(&root, &[]).with_poster(poster.clone(), "acme", "lib");

        let summary = orchestrator.handle_event(&event("closed")).await.unwrap();
        assert_eq!(summary.record.outcome, Some(RunOutcome::Ignored));
        assert_eq!(summary.record.state, RunState::Received);
        assert!(summary.report.is_none());
        assert!(!root.exists());
        assert!(poster.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_synchronize_event_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let body = r#"{"s":[{"name":"t","count":1}]}"#;
        let orchestrator = orchestrator(tmp.path(), &[(BASE_URL, body), (HEAD_URL, body)]);
        let summary = orchestrator
            .handle_event(&event("synchronize"))
            .await
            .unwrap();
        assert_eq!(summary.record.pr_number, 42);
        assert_eq!(summary.record.state, RunState::Released);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_release_workspace_removes_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(tmp.path());
        let lease = manager.lease(&RunId::generate()).unwrap();
        std::fs::create_dir_all(lease.base_dir.join("node_modules/a/b")).unwrap();
        std::fs::write(lease.head_dir.join("node_modules.log"), "x").unwrap();
        let root = lease.root.clone();

        release_workspace(lease).await.unwrap();
        assert!(!root.exists());
    }

    /// `path` expressed relative to the current directory, via the filesystem root.
    #[cfg(unix)]
    fn relative_to_cwd(path: &Path) -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        let mut relative = PathBuf::new();
        for _ in cwd.components().skip(1) {
            relative.push("..");
        }
        relative.join(path.strip_prefix("/").unwrap())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_relative_root_module_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let root = relative_to_cwd(&tmp.path().join("runs"));
        let fetcher = FakeFetcher {
            results: [
                (BASE_URL, r#"{"suiteA":[{"name":"t1","count":1000}]}"#),
                (HEAD_URL, r#"{"suiteA":[{"name":"t1","count":800}]}"#),
            ]
            .iter()
            .map(|(url, body)| (url.to_string(), body.to_string()))
            .collect(),
        };
        let runner = BuildRunner::new(Arc::new(fetcher), Duration::from_secs(10))
            .with_result_source(ResultSource::Module {
                entry_point: PathBuf::from("result.json"),
                loader: vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    "cp \"$0\" \"$1\"".to_string(),
                ],
            });
        let orchestrator = RunOrchestrator::new(WorkspaceManager::new(&root), runner);

        let summary = orchestrator.evaluate(run()).await.unwrap();
        assert_eq!(summary.record.state, RunState::Released);
        assert!(summary.report.unwrap().body.contains("`-200`"));
        assert!(is_empty_dir(&tmp.path().join("runs")));
    }

    #[cfg(unix)]
    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(["-c", "user.name=Bench", "-c", "user.email=bench@example.com"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .stdout(std::process::Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_relative_root_with_git_checkouts() {
        let tmp = tempfile::tempdir().unwrap();
        let origin = tmp.path().join("origin");
        std::fs::create_dir(&origin).unwrap();
        git(&origin, &["init", "--quiet"]);
        std::fs::write(origin.join("result.json"), r#"{"suiteA":[{"name":"t1","count":1000}]}"#)
            .unwrap();
        git(&origin, &["add", "."]);
        git(&origin, &["commit", "--quiet", "-m", "base"]);
        git(&origin, &["branch", "-M", "main"]);
        git(&origin, &["checkout", "--quiet", "-b", "feature"]);
        std::fs::write(origin.join("result.json"), r#"{"suiteA":[{"name":"t1","count":1300}]}"#)
            .unwrap();
        git(&origin, &["commit", "--quiet", "-am", "faster"]);

        let url = format!("file://{}", origin.display());
        let run = EvaluationRun::new(
            SourceRef::new(url.clone()).with_revision("main"),
            SourceRef::new(url).with_revision("feature"),
            7,
        );
        let root = relative_to_cwd(&tmp.path().join("runs"));
        let runner = BuildRunner::new(
            Arc::new(GitFetcher::new(Duration::from_secs(30))),
            Duration::from_secs(30),
        )
        .with_result_source(ResultSource::Artifact {
            path: PathBuf::from("result.json"),
        });
        let orchestrator = RunOrchestrator::new(WorkspaceManager::new(&root), runner);

        let summary = orchestrator.evaluate(run).await.unwrap();
        assert_eq!(summary.record.outcome, Some(RunOutcome::ReportedWithoutComment));
        assert!(summary.record.cleaned_up);
        assert!(summary.report.unwrap().body.contains("`+300`"));
        assert!(is_empty_dir(&tmp.path().join("runs")));
    }
}
