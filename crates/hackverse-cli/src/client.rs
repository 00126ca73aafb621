//! Shared HTTP client, context, and error types for the CLI.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use url::Url;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Build the HTTP client shared by every command.
pub(crate) fn build_client(timeout: Duration, trace_id: &str) -> CliResult<Client> {
    let mut default_headers = HeaderMap::new();
    let request_id = HeaderValue::from_str(trace_id)
        .map_err(|_| CliError::failure(anyhow!("trace identifier contains invalid characters")))?;
    default_headers.insert(HEADER_REQUEST_ID, request_id);

    Client::builder()
        .timeout(timeout)
        .default_headers(default_headers)
        .build()
        .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))
}

/// Application context passed to command handlers.
#[derive(Debug, Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
    pub(crate) api_key: Option<String>,
}

impl AppContext {
    pub(crate) fn endpoint(&self, path: &str) -> CliResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| CliError::failure(anyhow!("invalid base URL: {err}")))
    }

    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

/// Map an unsuccessful response onto a CLI error, preferring the service's `message`.
pub(crate) async fn classify_response(response: reqwest::Response) -> CliError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();
    let message = serde_json::from_slice::<MessageBody>(&bytes)
        .map(|body| body.message)
        .ok();

    match (status, message) {
        (StatusCode::BAD_REQUEST, Some(message)) => CliError::validation(message),
        (StatusCode::BAD_REQUEST, None) => CliError::validation(format!("bad request: {body_text}")),
        (StatusCode::UNAUTHORIZED, _) => {
            CliError::validation("unauthorized (pass --api-key or set SIMILARITY_API_KEY)")
        }
        (_, Some(message)) => CliError::failure(anyhow!("{message} (status {status})")),
        (_, None) if !body_text.is_empty() => {
            CliError::failure(anyhow!("{body_text} (status {status})"))
        }
        (_, None) => CliError::failure(anyhow!("request failed with status {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    async fn classify(status: u16, body: &str) -> CliError {
        let server = MockServer::start_async().await;
        let body = body.to_string();
        server.mock(|when, then| {
            when.method(GET).path("/probe");
            then.status(status).body(body);
        });
        let response = Client::new()
            .get(format!("{}/probe", server.base_url()))
            .send()
            .await
            .expect("mock server reachable");
        classify_response(response).await
    }

    #[tokio::test]
    async fn bad_request_is_a_validation_error_with_service_message() {
        let err = classify(400, r#"{"message":"Invalid repository URL"}"#).await;
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "Invalid repository URL");
    }

    #[tokio::test]
    async fn server_errors_are_operational_failures() {
        let err = classify(
            500,
            r#"{"message":"failed to fetch repoA: repository not found or unreachable"}"#,
        )
        .await;
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("failed to fetch repoA"));
        assert!(err.display_message().contains("500"));
    }

    #[tokio::test]
    async fn unauthorized_points_at_the_api_key() {
        let err = classify(401, r#"{"message":"Unauthorized"}"#).await;
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("--api-key"));
    }

    #[test]
    fn endpoint_joins_paths() {
        let ctx = AppContext {
            client: Client::new(),
            base_url: "http://127.0.0.1:4000".parse().expect("valid url"),
            api_key: None,
        };
        assert_eq!(
            ctx.endpoint("/compare").map(|url| url.to_string()).ok(),
            Some("http://127.0.0.1:4000/compare".to_string())
        );
    }
}
