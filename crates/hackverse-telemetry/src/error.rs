//! Errors raised while installing logging or operating the metrics registry.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Telemetry failure with the collector or stage it concerns.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("tracing subscriber already installed")]
    SubscriberInstall {
        /// Error reported by `tracing-subscriber`.
        source: tracing_subscriber::util::TryInitError,
    },
    /// A collector could not be built or added to the registry.
    #[error("metrics collector setup failed")]
    Collector {
        /// `build` or `register`.
        operation: &'static str,
        /// Metric name.
        name: &'static str,
        /// Error reported by `prometheus`.
        source: prometheus::Error,
    },
    /// The registry could not be rendered as Prometheus text.
    #[error("metrics rendering failed")]
    Render {
        /// Error reported by `prometheus`.
        source: prometheus::Error,
    },
    /// The rendered exposition was not UTF-8.
    #[error("metrics exposition was not utf-8")]
    RenderEncoding {
        /// Conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    pub(crate) const fn collector(
        operation: &'static str,
        name: &'static str,
        source: prometheus::Error,
    ) -> Self {
        Self::Collector {
            operation,
            name,
            source,
        }
    }
}
