//! Logging initialisation.
//!
//! # Design
//! - One entry point installs either a JSON or a human-readable subscriber.
//! - `RUST_LOG` wins over the configured level when present.
//! - The build SHA comes from `HACKVERSE_BUILD_SHA` at compile time and can be
//!   overridden once at startup; every request span carries it.

use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Default logging target when `RUST_LOG` is not provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const COMPILED_BUILD_SHA: &str = match option_env!("HACKVERSE_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Subscriber settings for one process.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`, `hackverse_scan=debug`).
    pub level: &'a str,
    /// Output format.
    pub format: LogFormat,
    /// Build identifier attached to request spans.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: build_sha(),
        }
    }
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    Json,
    /// Human-readable lines for terminals.
    Pretty,
}

impl LogFormat {
    /// Pretty in debug builds, JSON in release builds.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Resolve an optional configured name, falling back to [`LogFormat::infer`].
    #[must_use]
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("pretty") => Self::Pretty,
            _ => Self::infer(),
        }
    }

    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self {
            Self::Json => fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_target(false)
                .boxed(),
            Self::Pretty => fmt::layer().compact().with_target(false).boxed(),
        }
    }
}

/// Install the global tracing subscriber and record the build SHA.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInstall`] when a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if BUILD_SHA.get().is_none() {
        let _ = BUILD_SHA.set(config.build_sha.to_string());
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level));

    tracing_subscriber::registry()
        .with(config.format.layer())
        .with(filter)
        .try_init()
        .map_err(|source| TelemetryError::SubscriberInstall { source })
}

/// Build identifier recorded at startup, or the compiled-in value.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or(COMPILED_BUILD_SHA, String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_names_are_case_insensitive() {
        assert_eq!(LogFormat::from_name(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::from_name(Some("pretty")), LogFormat::Pretty);
        assert_eq!(LogFormat::from_name(Some("xml")), LogFormat::infer());
        assert_eq!(LogFormat::from_name(None), LogFormat::infer());
    }

    #[test]
    fn second_install_is_rejected() {
        let config = LoggingConfig {
            level: "debug",
            format: LogFormat::Json,
            build_sha: "abc123",
        };
        let _ = init_logging(&config);
        assert!(matches!(
            init_logging(&config),
            Err(TelemetryError::SubscriberInstall { .. })
        ));
        assert_eq!(build_sha(), "abc123");
    }
}
