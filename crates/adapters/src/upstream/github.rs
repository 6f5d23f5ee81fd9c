// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! GitHub comment posting.
//!
//! The orchestrator only sees [`CommentPoster`]. [`GitHubClient`] is the
//! production implementation: it is created once at startup, holds a pooled
//! `reqwest::Client`, and is shared by every run.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Default GitHub REST API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Errors raised while publishing a comment.
#[derive(Debug, Error)]
pub enum CommentPostError {
    /// The request never got a response.
    #[error("Comment request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Comment rejected with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// Any other failure (used by alternative posters).
    #[error("Comment posting failed: {0}")]
    Other(String),
}

/// Where a comment goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTarget {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number.
    pub number: u64,
}

impl fmt::Display for CommentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Publishes a rendered report on a pull request.
///
/// Implementations must be safe to call from concurrent runs.
#[async_trait]
pub trait CommentPoster: Send + Sync {
    /// Post `body` as a comment on `target`.
    async fn post_comment(&self, target: &CommentTarget, body: &str) -> Result<(), CommentPostError>;
}

#[derive(Serialize)]
struct CreateComment<'a> {
    body: &'a str,
}

/// GitHub REST client for issue comments.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GitHubClient {
    /// Create a client for `api_url`, authenticating with `token` when given.
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Result<Self, CommentPostError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("benchwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// URL of the comments collection for `target`.
    pub fn comments_url(&self, target: &CommentTarget) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, target.owner, target.repo, target.number
        )
    }
}

#[async_trait]
impl CommentPoster for GitHubClient {
    async fn post_comment(&self, target: &CommentTarget, body: &str) -> Result<(), CommentPostError> {
        let mut request = self
            .http
            .post(self.comments_url(target))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&CreateComment { body });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CommentPostError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(pull_request = %target, "Comment posted");
        Ok(())
    }
}
