//! Shared state handed to every handler.

use std::sync::Arc;

use hackverse_scan::ComparisonService;
use hackverse_telemetry::Metrics;

/// Dependencies shared by the HTTP handlers.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub(crate) service: Arc<ComparisonService>,
    pub(crate) api_key: Option<String>,
    pub(crate) metrics: Metrics,
}

impl ApiState {
    /// Bundle the comparison service, the optional bearer token, and metrics.
    ///
    /// A blank `api_key` is treated as absent, which leaves `/compare` open.
    #[must_use]
    pub fn new(service: Arc<ComparisonService>, api_key: Option<String>, metrics: Metrics) -> Self {
        Self {
            service,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            metrics,
        }
    }

    /// Whether `/compare` requires a bearer token.
    #[must_use]
    pub const fn auth_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}
