use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use benchwatch_core::PullRequestEvent;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::middleware::{EventKind, GitHubDelivery, HookError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HookResponse {
    pub status: &'static str,
    pub event: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/github-hook", post(receive_hook))
}

/// Accept a delivery and return immediately. Qualifying pull request events
/// are evaluated on a tracked background task; the sender never sees the
/// run outcome.
async fn receive_hook(
    State(state): State<Arc<AppState>>,
    delivery: GitHubDelivery,
    body: Bytes,
) -> Result<(StatusCode, Json<HookResponse>), HookError> {
    let status = match &delivery.event {
        EventKind::PullRequest => {
            let event: PullRequestEvent = serde_json::from_slice(&body).map_err(|e| {
                HookError::bad_request("INVALID_PAYLOAD", format!("Invalid pull_request payload: {}", e))
            })?;
            info!(
                delivery_id = ?delivery.delivery_id,
                action = %event.action,
                pr = event.number,
                "Pull request event received"
            );
            let status = if event.is_qualifying() {
                "accepted"
            } else {
                "ignored"
            };
            spawn_run(&state, event);
            status
        }
        EventKind::Push => {
            parse_json(&body)?;
            info!(delivery_id = ?delivery.delivery_id, "Push event received, nothing to do");
            "ignored"
        }
        EventKind::Other(name) => {
            parse_json(&body)?;
            debug!(event = %name, "Unhandled event type");
            "ignored"
        }
    };

    Ok((
        StatusCode::OK,
        Json(HookResponse {
            status,
            event: delivery.event.to_string(),
        }),
    ))
}

fn parse_json(body: &[u8]) -> Result<Value, HookError> {
    serde_json::from_slice(body)
        .map_err(|e| HookError::bad_request("INVALID_JSON", format!("Body is not valid JSON: {}", e)))
}

fn spawn_run(state: &AppState, event: PullRequestEvent) {
    let orchestrator = Arc::clone(&state.orchestrator);
    state.tracker.spawn(async move {
        if let Err(e) = orchestrator.handle_event(&event).await {
            error!(pr = event.number, error = %e, "Evaluation run failed");
        }
    });
}
