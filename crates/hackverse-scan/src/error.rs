//! # Design
//!
//! - Constant messages; exit codes, stderr, and paths travel as fields and are
//!   only ever logged.
//! - `public_message` produces the fixed text safe to hand to HTTP callers.

use std::io;
use std::time::Duration;

use hackverse_workspace::WorkspaceError;
use thiserror::Error;

use crate::model::Side;

/// Result type for repository fetching.
pub type FetchResult<T> = Result<T, FetchError>;
/// Result type for duplication scans.
pub type ScanResult<T> = Result<T, ScanError>;
/// Result type for end-to-end comparisons.
pub type CompareResult<T> = Result<T, CompareError>;

/// Failures while running an external program.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The executable could not be located.
    #[error("command not found")]
    NotFound {
        /// Program that was requested.
        program: String,
    },
    /// The process could not be started or awaited.
    #[error("command failed to run")]
    Spawn {
        /// Program that was requested.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The process exceeded its time budget and was killed.
    #[error("command timed out")]
    TimedOut {
        /// Program that was requested.
        program: String,
        /// Budget that elapsed.
        timeout: Duration,
    },
}

/// Request-level validation failures, reported to callers as HTTP 400.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A repository field was absent, not a string, or blank.
    #[error("missing repository url")]
    MissingRepository {
        /// Field that was missing (`repoA` or `repoB`).
        field: &'static str,
    },
    /// A repository URL was syntactically unacceptable.
    #[error("invalid repository url")]
    InvalidUrl {
        /// Field carrying the rejected URL.
        field: &'static str,
        /// Machine-readable rejection reason.
        reason: &'static str,
    },
}

impl ValidationError {
    /// Fixed message returned to HTTP callers.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::MissingRepository { .. } => "Missing repoA/repoB",
            Self::InvalidUrl { .. } => "Invalid repository URL",
        }
    }
}

/// Coarse classification of clone failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailureKind {
    /// URL rejected before any process was started.
    InvalidUrl,
    /// Repository missing, host unresolvable, or connection refused.
    Unreachable,
    /// Credentials were required or rejected.
    Authentication,
    /// The clone exceeded its time budget.
    Timeout,
    /// Any other git failure.
    Process,
}

impl FetchFailureKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::Unreachable => "unreachable",
            Self::Authentication => "authentication",
            Self::Timeout => "timeout",
            Self::Process => "process",
        }
    }
}

/// Failures while shallow-cloning a repository.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL failed validation.
    #[error("repository url rejected")]
    InvalidUrl {
        /// Machine-readable rejection reason.
        reason: &'static str,
    },
    /// The repository does not exist or the host could not be reached.
    #[error("repository unreachable")]
    Unreachable {
        /// Exit code reported by git.
        exit_code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },
    /// The remote demanded or rejected credentials.
    #[error("repository authentication failed")]
    Authentication {
        /// Exit code reported by git.
        exit_code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },
    /// The clone did not finish in time.
    #[error("repository clone timed out")]
    Timeout {
        /// Budget that elapsed.
        timeout: Duration,
    },
    /// Git exited unsuccessfully for an unclassified reason.
    #[error("repository clone failed")]
    Process {
        /// Exit code reported by git.
        exit_code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },
    /// Git could not be started.
    #[error("repository clone could not start")]
    Spawn {
        /// Underlying command failure.
        source: CommandError,
    },
}

impl FetchError {
    /// Classification of the failure.
    #[must_use]
    pub const fn kind(&self) -> FetchFailureKind {
        match self {
            Self::InvalidUrl { .. } => FetchFailureKind::InvalidUrl,
            Self::Unreachable { .. } => FetchFailureKind::Unreachable,
            Self::Authentication { .. } => FetchFailureKind::Authentication,
            Self::Timeout { .. } => FetchFailureKind::Timeout,
            Self::Process { .. } | Self::Spawn { .. } => FetchFailureKind::Process,
        }
    }

    /// Captured git stderr, when the process ran.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Unreachable { stderr, .. }
            | Self::Authentication { stderr, .. }
            | Self::Process { stderr, .. } => Some(stderr.as_str()),
            Self::InvalidUrl { .. } | Self::Timeout { .. } | Self::Spawn { .. } => None,
        }
    }

    const fn public_reason(&self) -> &'static str {
        match self.kind() {
            FetchFailureKind::InvalidUrl => "invalid repository URL",
            FetchFailureKind::Unreachable => "repository not found or unreachable",
            FetchFailureKind::Authentication => "repository requires authentication",
            FetchFailureKind::Timeout => "clone timed out",
            FetchFailureKind::Process => "git clone failed",
        }
    }
}

/// Failures while running or interpreting the duplication detector.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The detector executable is not installed.
    #[error("duplication scanner unavailable")]
    ToolUnavailable {
        /// Program that was requested.
        program: String,
    },
    /// The scan exceeded its time budget.
    #[error("duplication scan timed out")]
    Timeout {
        /// Budget that elapsed.
        timeout: Duration,
    },
    /// The detector could not be started.
    #[error("duplication scanner failed to start")]
    Spawn {
        /// Underlying command failure.
        source: CommandError,
    },
    /// The detector exited unsuccessfully.
    #[error("duplication scanner exited unsuccessfully")]
    ToolFailed {
        /// Exit code reported by the detector.
        exit_code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },
    /// The report was missing or did not contain a usable percentage.
    #[error("duplication report unparseable")]
    ReportUnparseable {
        /// Machine-readable reason.
        reason: &'static str,
    },
}

impl ScanError {
    const fn public_reason(&self) -> &'static str {
        match self {
            Self::ToolUnavailable { .. } => "duplication scanner unavailable",
            Self::Timeout { .. } => "duplication scan timed out",
            Self::Spawn { .. } => "duplication scanner failed to start",
            Self::ToolFailed { .. } => "duplication scan failed",
            Self::ReportUnparseable { .. } => "duplication report could not be parsed",
        }
    }
}

/// Failures of an end-to-end comparison.
#[derive(Debug, Error)]
pub enum CompareError {
    /// The request was rejected before any work started.
    #[error("comparison request invalid")]
    Validation(#[from] ValidationError),
    /// No workspace could be allocated.
    #[error("comparison workspace unavailable")]
    Workspace {
        /// Underlying workspace failure.
        source: WorkspaceError,
    },
    /// One of the repositories could not be fetched.
    #[error("comparison fetch failed")]
    Fetch {
        /// Repository that failed.
        side: Side,
        /// Underlying fetch failure.
        source: FetchError,
    },
    /// The duplication scan failed.
    #[error("comparison scan failed")]
    Scan {
        /// Underlying scan failure.
        source: ScanError,
    },
}

impl CompareError {
    /// Pipeline stage the failure belongs to.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Workspace { .. } => "workspace",
            Self::Fetch { .. } => "fetch",
            Self::Scan { .. } => "scan",
        }
    }

    /// Whether the caller sent a bad request.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether repeating the same comparison could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Workspace { .. } => true,
            Self::Fetch { source, .. } => matches!(
                source.kind(),
                FetchFailureKind::Unreachable | FetchFailureKind::Timeout
            ),
            Self::Scan { source } => matches!(source, ScanError::Timeout { .. }),
        }
    }

    /// Fixed, kind-based text that is safe to return to callers.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(err) => err.public_message().to_string(),
            Self::Workspace { .. } => "failed to prepare comparison workspace".to_string(),
            Self::Fetch { side, source } => {
                format!("failed to fetch {side}: {}", source.public_reason())
            }
            Self::Scan { source } => source.public_reason().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn fetch_errors_classify_and_keep_stderr_out_of_messages() {
        let err = FetchError::Unreachable {
            exit_code: Some(128),
            stderr: "fatal: repository 'https://example.invalid/x' not found".to_string(),
        };
        assert_eq!(err.kind(), FetchFailureKind::Unreachable);
        assert_eq!(err.to_string(), "repository unreachable");
        assert!(err.stderr().is_some_and(|stderr| stderr.contains("not found")));

        let spawn = FetchError::Spawn {
            source: CommandError::NotFound {
                program: "git".to_string(),
            },
        };
        assert_eq!(spawn.kind(), FetchFailureKind::Process);
        assert!(spawn.source().is_some());
    }

    #[test]
    fn compare_error_public_messages_are_fixed() {
        let fetch = CompareError::Fetch {
            side: Side::A,
            source: FetchError::Unreachable {
                exit_code: Some(128),
                stderr: "/srv/secret/path".to_string(),
            },
        };
        assert_eq!(
            fetch.public_message(),
            "failed to fetch repoA: repository not found or unreachable"
        );
        assert!(!fetch.public_message().contains("/srv"));
        assert_eq!(fetch.stage(), "fetch");
        assert!(fetch.is_retryable());

        let missing = CompareError::from(ValidationError::MissingRepository { field: "repoB" });
        assert_eq!(missing.public_message(), "Missing repoA/repoB");
        assert!(missing.is_client_error());
        assert!(!missing.is_retryable());

        let invalid = CompareError::from(ValidationError::InvalidUrl {
            field: "repoA",
            reason: "unsupported_scheme",
        });
        assert_eq!(invalid.public_message(), "Invalid repository URL");

        let scan = CompareError::Scan {
            source: ScanError::ToolUnavailable {
                program: "jscpd".to_string(),
            },
        };
        assert_eq!(scan.public_message(), "duplication scanner unavailable");
        assert!(!scan.is_retryable());
    }

    #[test]
    fn authentication_failures_are_not_retryable() {
        let err = CompareError::Fetch {
            side: Side::B,
            source: FetchError::Authentication {
                exit_code: Some(128),
                stderr: "could not read Username".to_string(),
            },
        };
        assert!(!err.is_retryable());
        assert_eq!(
            err.public_message(),
            "failed to fetch repoB: repository requires authentication"
        );
    }
}
