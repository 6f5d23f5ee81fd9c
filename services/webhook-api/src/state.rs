use benchwatch_adapters::RunOrchestrator;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Runs evaluations for qualifying pull request events.
    pub orchestrator: Arc<RunOrchestrator>,
    /// Tracks in-flight runs so shutdown can wait for them.
    pub tracker: TaskTracker,
    /// Renders the Prometheus exposition, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(orchestrator: RunOrchestrator, tracker: TaskTracker) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            tracker,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
