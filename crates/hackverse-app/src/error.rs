//! Startup and serving failures of the similarity service binary.
//!
//! Each variant names the startup stage (`config.from_env`,
//! `workspace.sweep_stale`, ...) and keeps the crate error as its source, so
//! `main` reports the whole chain once.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Failure that stops the service process.
#[derive(Debug, Error)]
pub enum AppError {
    /// The environment did not describe a valid service.
    #[error("service configuration rejected")]
    Config {
        /// Startup stage.
        operation: &'static str,
        /// Validation failure.
        source: hackverse_config::ConfigError,
    },
    /// Logging or the metrics registry could not be set up.
    #[error("telemetry setup failed")]
    Telemetry {
        /// Startup stage.
        operation: &'static str,
        /// Telemetry failure.
        source: hackverse_telemetry::TelemetryError,
    },
    /// The startup sweep could not read the workspace root.
    #[error("workspace sweep failed")]
    Workspace {
        /// Startup stage.
        operation: &'static str,
        /// Filesystem failure.
        source: hackverse_workspace::WorkspaceError,
    },
    /// The HTTP listener could not bind or stopped with an error.
    #[error("http server failed")]
    ApiServer {
        /// Startup stage.
        operation: &'static str,
        /// Server failure.
        source: hackverse_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: hackverse_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: hackverse_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn workspace(
        operation: &'static str,
        source: hackverse_workspace::WorkspaceError,
    ) -> Self {
        Self::Workspace { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: hackverse_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn errors_keep_operation_and_source() {
        let source = hackverse_config::ServiceConfig::from_lookup(|key| {
            (key == hackverse_config::loader::vars::PORT).then(|| "0".to_string())
        })
        .expect_err("port zero is invalid");
        let err = AppError::config("config.from_env", source);
        assert_eq!(err.to_string(), "service configuration rejected");
        assert!(err.source().is_some());
        assert!(matches!(
            err,
            AppError::Config {
                operation: "config.from_env",
                ..
            }
        ));
    }
}
