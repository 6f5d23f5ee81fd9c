// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchwatch webhook service entry point.

use anyhow::Context;
use benchwatch_adapters::config::LogFormat;
use benchwatch_adapters::{CommentPoster, GitHubClient, RunOrchestrator, Settings};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webhook_api::{app, AppState};

/// Configuration file read when `BENCHWATCH_CONFIG` is unset and it exists.
const DEFAULT_CONFIG_FILE: &str = "benchwatch.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config_path = std::env::var_os("BENCHWATCH_CONFIG")
        .map(PathBuf::from)
        .or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        });
    let settings = Settings::load(config_path.as_deref()).context("failed to load settings")?;
    init_tracing(&settings);

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let poster: Option<Arc<dyn CommentPoster>> = match settings.github.require_target() {
        Ok(()) => Some(Arc::new(GitHubClient::new(
            settings.github.api_url.clone(),
            settings.github.token.clone(),
        )?)),
        Err(e) => {
            warn!(error = %e, "Comment posting disabled");
            None
        }
    };

    let orchestrator = RunOrchestrator::from_settings(&settings, poster);
    info!(orchestrator = ?orchestrator, "Orchestrator ready");

    let tracker = TaskTracker::new();
    let state = Arc::new(AppState::new(orchestrator, tracker.clone()).with_metrics(metrics));

    let listener = TcpListener::bind(&settings.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.listen_addr))?;
    info!(addr = %settings.server.listen_addr, "Webhook service listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracker.close();
    info!(in_flight = tracker.len(), "Waiting for in-flight runs");
    tracker.wait().await;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.server.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.server.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
