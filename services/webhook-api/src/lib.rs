// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! GitHub webhook service for Benchwatch.
//!
//! # Routes
//!
//! - `POST /github-hook` - webhook deliveries; pull request events start runs
//! - `GET /health` - liveness
//! - `GET /metrics` - Prometheus exposition
//!
//! Runs are spawned on the [`AppState::tracker`]; the binary closes and waits
//! on it during shutdown so no workspace outlives the process.

pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the service router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::hooks::routes())
        .merge(routes::health::routes())
        .merge(routes::metrics::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
