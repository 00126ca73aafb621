//! Bearer-token middleware for `/compare`.
//!
//! Runs before the body is read, so rejected requests never allocate a
//! workspace. With no key configured every request passes.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::http::constants::BEARER_PREFIX;
use crate::http::errors::ApiError;
use crate::state::ApiState;

pub(crate) async fn require_bearer(
    State(state): State<ApiState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(req).await)
        }
        Some(_) => {
            debug!("bearer token mismatch");
            Err(ApiError::unauthorized())
        }
        None => {
            debug!("bearer token missing");
            Err(ApiError::unauthorized())
        }
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let (scheme, token) = header.split_at_checked(BEARER_PREFIX.len())?;
    scheme
        .eq_ignore_ascii_case(BEARER_PREFIX)
        .then_some(token.trim())
        .filter(|token| !token.is_empty())
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
