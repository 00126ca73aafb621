//! JSON error responses.
//!
//! Every 4xx/5xx body is `{"message": ...}` with a fixed, caller-safe text.

use std::borrow::Cow;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hackverse_scan::{CompareError, ValidationError};
use serde::Serialize;

use crate::http::constants::{MESSAGE_INVALID_JSON, MESSAGE_UNAUTHORIZED};

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

/// Status code plus caller-safe message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) message: Cow<'static, str>,
}

impl ApiError {
    const fn new(status: StatusCode, message: Cow<'static, str>) -> Self {
        Self { status, message }
    }

    pub(crate) const fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            Cow::Borrowed(MESSAGE_UNAUTHORIZED),
        )
    }

    pub(crate) const fn invalid_json() -> Self {
        Self::new(StatusCode::BAD_REQUEST, Cow::Borrowed(MESSAGE_INVALID_JSON))
    }

    pub(crate) fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into())
    }

    pub(crate) fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.public_message())
    }
}

impl From<CompareError> for ApiError {
    fn from(err: CompareError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.public_message())
        } else {
            Self::internal(err.public_message())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: &self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hackverse_scan::{CommandError, FetchError};
    use std::io;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let err = ApiError::from(ValidationError::MissingRepository { field: "repoB" });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Missing repoA/repoB");
    }

    #[test]
    fn pipeline_failures_map_to_internal_with_safe_text() {
        let err = ApiError::from(CompareError::Fetch {
            side: hackverse_scan::Side::A,
            source: FetchError::Spawn {
                source: CommandError::Spawn {
                    program: "/usr/bin/git".to_string(),
                    source: io::Error::other("permission denied"),
                },
            },
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.starts_with("failed to fetch repoA"));
        assert!(!err.message.contains("/usr/bin"));
    }

    #[test]
    fn unauthorized_has_fixed_body() {
        let response = ApiError::unauthorized().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
