//! Typed settings consumed by the similarity service and its collaborators.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Behaviour when the duplication report cannot be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    /// Treat an unreadable report as "no evidence of duplication" (score `0.0`).
    #[default]
    Zero,
    /// Treat an unreadable report as a scan failure.
    Fail,
}

impl ParseFailurePolicy {
    /// Canonical lowercase name used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "zero",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for ParseFailurePolicy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ParseFailurePolicy {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(Self::Zero),
            "fail" => Ok(Self::Fail),
            _ => Err(()),
        }
    }
}

/// Temporary workspace placement and retention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkspaceSettings {
    /// Directory under which per-comparison workspaces are created.
    pub root: PathBuf,
    /// Leftover workspaces older than this are removed by the startup sweep.
    pub max_age: Duration,
}

/// Repository fetching behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchSettings {
    /// Git executable.
    pub git_bin: String,
    /// Upper bound for a single clone.
    pub timeout: Duration,
    /// Whether `file://` repositories are accepted.
    pub allow_local_repositories: bool,
}

/// Duplication detector behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSettings {
    /// Detector executable.
    pub jscpd_bin: String,
    /// Upper bound for a single scan.
    pub timeout: Duration,
    /// Minimum clone size in tokens.
    pub min_tokens: u32,
    /// Handling of unreadable reports.
    pub parse_failure: ParseFailurePolicy,
}

/// Review policy shared with batch callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReviewSettings {
    /// Similarity at or above which a pair is flagged.
    pub flag_threshold: f64,
}

/// Logging preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Explicit output format (`json` or `pretty`); inferred from the build when absent.
    pub format: Option<String>,
}

/// Complete, validated service configuration.
///
/// Built once at process start and passed explicitly into constructors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceConfig {
    /// Listen address.
    pub bind_addr: IpAddr,
    /// Listen port.
    pub port: u16,
    /// Bearer token required on `/compare`; `None` disables authentication.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Workspace placement.
    pub workspace: WorkspaceSettings,
    /// Clone behaviour.
    pub fetch: FetchSettings,
    /// Scanner behaviour.
    pub scan: ScanSettings,
    /// Review policy.
    pub review: ReviewSettings,
    /// Logging preferences.
    pub logging: LoggingSettings,
}

impl ServiceConfig {
    /// Socket address the HTTP listener binds to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Whether requests to `/compare` must present the configured bearer token.
    #[must_use]
    pub const fn auth_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}
