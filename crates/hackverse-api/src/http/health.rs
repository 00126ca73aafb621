//! Liveness and metrics endpoints; neither requires authentication.

use axum::{
    Json,
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::http::constants::{MESSAGE_METRICS_UNAVAILABLE, PROMETHEUS_CONTENT_TYPE};
use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) ok: bool,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

pub(crate) async fn metrics(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let body = state.metrics.render().map_err(|err| {
        error!(error = %err, "failed to render metrics");
        ApiError::internal(MESSAGE_METRICS_UNAVAILABLE)
    })?;
    Ok(([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response())
}
