//! `POST /compare`.
//!
//! The body is read as raw bytes so a missing or wrong `Content-Type` does
//! not reject an otherwise valid JSON document. An empty body is `{}`.

use axum::{Json, body::Bytes, extract::State};
use hackverse_scan::{ComparisonRequest, ComparisonResult};
use serde_json::{Map, Value};
use tracing::debug;

use crate::http::errors::ApiError;
use crate::state::ApiState;

pub(crate) async fn compare(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<ComparisonResult>, ApiError> {
    let document = decode_body(&body)?;
    let request = ComparisonRequest::from_json(&document).map_err(|err| {
        debug!(error = %err, "comparison request rejected");
        ApiError::from(err)
    })?;
    let result = state.service.compare(&request).await?;
    Ok(Json(result))
}

fn decode_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|err| {
        debug!(error = %err, "request body is not json");
        ApiError::invalid_json()
    })
}
