//! # Design
//!
//! - Constant messages with structured context, matching the other crates.
//! - Individual pair failures are data on the report, not errors here.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for report persistence.
pub type StoreResult<T> = Result<T, StoreError>;
/// Result type for batch runs.
pub type BatchResult<T> = Result<T, BatchError>;

/// Failures while reading or writing similarity reports.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("report store io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// File involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The stored document could not be encoded or decoded.
    #[error("report store json failure")]
    Json {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// File involved.
        path: PathBuf,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// The report belongs to a different event than the file already holds.
    #[error("report file belongs to another event")]
    EventMismatch {
        /// File involved.
        path: PathBuf,
        /// Event the file is bound to.
        stored: String,
        /// Event of the rejected report.
        incoming: String,
    },
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Failures that abort a batch run.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Two submissions share an identifier.
    #[error("duplicate submission id")]
    DuplicateSubmission {
        /// Repeated identifier.
        submission_id: String,
    },
    /// The requested submission is not part of the event.
    #[error("unknown submission id")]
    UnknownSubmission {
        /// Identifier that was not found.
        submission_id: String,
    },
    /// Reports could not be persisted.
    #[error("report persistence failed")]
    Store(#[from] StoreError),
}
