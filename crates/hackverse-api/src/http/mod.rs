//! HTTP surface modules (router, handlers, middleware).

/// Bearer-token middleware.
pub mod auth;
/// Comparison endpoint.
pub mod compare;
/// Header names and media types.
pub mod constants;
/// JSON error responses.
pub mod errors;
/// Health and metrics endpoints.
pub mod health;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
