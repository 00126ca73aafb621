//! Header names and fixed response texts.

pub use hackverse_telemetry::layers::REQUEST_ID_HEADER;

/// Scheme prefix expected in the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";
/// Content type of the Prometheus text exposition.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
/// Body returned for failed authentication.
pub const MESSAGE_UNAUTHORIZED: &str = "Unauthorized";
/// Body returned when the request body is not JSON.
pub const MESSAGE_INVALID_JSON: &str = "Invalid JSON body";
/// Body returned when the metrics registry cannot be encoded.
pub const MESSAGE_METRICS_UNAVAILABLE: &str = "metrics unavailable";
