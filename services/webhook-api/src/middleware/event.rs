// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! GitHub delivery headers.
//!
//! GitHub names the event type in `X-GitHub-Event` and identifies each
//! delivery with `X-GitHub-Delivery`. [`GitHubDelivery`] extracts both so
//! handlers can dispatch on the event before touching the body.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::fmt;

/// Header names used by GitHub webhook deliveries.
pub mod headers {
    /// Event type header.
    pub const X_GITHUB_EVENT: &str = "x-github-event";
    /// Delivery GUID header.
    pub const X_GITHUB_DELIVERY: &str = "x-github-delivery";
}

/// Event types the service distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `pull_request`
    PullRequest,
    /// `push`
    Push,
    /// Any other event, or none named.
    Other(String),
}

impl EventKind {
    /// Classify an `X-GitHub-Event` value.
    pub fn parse(value: &str) -> Self {
        match value {
            "pull_request" => EventKind::PullRequest,
            "push" => EventKind::Push,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::PullRequest => f.write_str("pull_request"),
            EventKind::Push => f.write_str("push"),
            EventKind::Other(name) if name.is_empty() => f.write_str("<none>"),
            EventKind::Other(name) => f.write_str(name),
        }
    }
}

/// Error response for rejected webhook requests.
#[derive(Debug)]
pub struct HookError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl HookError {
    /// A 400 response.
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for HookError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            },
            "meta": {
                "timestamp": Utc::now().to_rfc3339(),
            }
        }));
        (self.status, body).into_response()
    }
}

/// Delivery metadata of a webhook request.
#[derive(Debug, Clone)]
pub struct GitHubDelivery {
    /// Event type.
    pub event: EventKind,
    /// Delivery GUID, when sent.
    pub delivery_id: Option<String>,
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for GitHubDelivery
where
    S: Send + Sync,
{
    type Rejection = HookError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let event = match parts.headers.get(headers::X_GITHUB_EVENT) {
            Some(value) => value.to_str().map(EventKind::parse).map_err(|_| {
                HookError::bad_request(
                    "INVALID_EVENT_HEADER",
                    format!("Header '{}' is not valid text", headers::X_GITHUB_EVENT),
                )
            })?,
            None => EventKind::Other(String::new()),
        };

        let delivery_id = parts
            .headers
            .get(headers::X_GITHUB_DELIVERY)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok(GitHubDelivery { event, delivery_id })
    }
}
