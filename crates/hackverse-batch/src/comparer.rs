//! Pair comparison backends.
//!
//! # Design
//! - The orchestrator only sees [`PairComparer`]; it runs in-process through
//!   [`LocalComparer`] or against a deployed service through [`RemoteComparer`].
//! - Failures carry a caller-safe message and whether a retry could help.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hackverse_scan::{ComparisonRequest, ComparisonResult, ComparisonService};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::debug;

/// Why a single pair could not be scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonFailure {
    /// Caller-safe description.
    pub message: String,
    /// Whether repeating the comparison could succeed.
    pub retryable: bool,
}

impl ComparisonFailure {
    /// Failure worth retrying.
    #[must_use]
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// Failure that will not go away on retry.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Scores the similarity of two repositories.
#[async_trait]
pub trait PairComparer: Send + Sync {
    /// Similarity of `repo_a` and `repo_b` in `[0, 1]`.
    async fn compare(&self, repo_a: &str, repo_b: &str) -> Result<f64, ComparisonFailure>;
}

/// Runs comparisons in-process.
#[derive(Debug, Clone)]
pub struct LocalComparer {
    service: Arc<ComparisonService>,
}

impl LocalComparer {
    /// Wrap a comparison service.
    #[must_use]
    pub const fn new(service: Arc<ComparisonService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PairComparer for LocalComparer {
    async fn compare(&self, repo_a: &str, repo_b: &str) -> Result<f64, ComparisonFailure> {
        let request = ComparisonRequest::from_parts(Some(repo_a), Some(repo_b))
            .map_err(|err| ComparisonFailure::permanent(err.public_message()))?;
        self.service
            .compare(&request)
            .await
            .map(|result| result.score)
            .map_err(|err| ComparisonFailure {
                message: err.public_message(),
                retryable: err.is_retryable(),
            })
    }
}

/// Calls `POST /compare` on a running comparison service.
#[derive(Debug, Clone)]
pub struct RemoteComparer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RemoteComparer {
    /// Build a comparer for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns the client builder error when TLS initialisation fails.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Build a comparer around an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: format!("{}/compare", base_url.trim_end_matches('/')),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }
}

#[async_trait]
impl PairComparer for RemoteComparer {
    async fn compare(&self, repo_a: &str, repo_b: &str) -> Result<f64, ComparisonFailure> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "repoA": repo_a, "repoB": repo_b }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|err| {
            debug!(error = %err, "comparison request failed");
            if err.is_timeout() {
                ComparisonFailure::retryable("comparison service timed out")
            } else {
                ComparisonFailure::retryable("comparison service unreachable")
            }
        })?;

        let status = response.status();
        if status.is_success() {
            let result: ComparisonResult = response
                .json()
                .await
                .map_err(|_| ComparisonFailure::permanent("invalid comparison response"))?;
            if !result.score.is_finite() {
                return Err(ComparisonFailure::permanent("invalid comparison response"));
            }
            return Ok(result.score.clamp(0.0, 1.0));
        }

        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("comparison service returned {}", status.as_u16()));
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(ComparisonFailure::retryable(message))
        } else {
            Err(ComparisonFailure::permanent(message))
        }
    }
}
