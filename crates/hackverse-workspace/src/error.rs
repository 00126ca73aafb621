//! # Design
//!
//! - Constant messages; the operation and path travel as fields.
//! - "Already gone" is not an error and never reaches this type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors produced while allocating or removing workspaces.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// IO failure while preparing the root or creating a workspace.
    #[error("workspace io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Every generated workspace name already existed.
    #[error("workspace names exhausted")]
    Exhausted {
        /// Root the names were generated under.
        root: PathBuf,
        /// Number of attempts made.
        attempts: usize,
    },
    /// Removing a workspace failed for a reason other than it being absent.
    #[error("workspace release failed")]
    Release {
        /// Workspace path that could not be removed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl WorkspaceError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn release(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Release {
            path: path.into(),
            source,
        }
    }
}
