//! Scoped ownership of a single workspace directory.

use std::io;
use std::path::{Path, PathBuf};

use hackverse_telemetry::Metrics;
use tracing::{debug, warn};

use crate::error::{WorkspaceError, WorkspaceResult};

/// Result of removing a workspace directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The directory tree was deleted.
    Removed,
    /// Nothing existed at the path.
    AlreadyGone,
}

/// An exclusively owned temporary directory.
///
/// Call [`Workspace::release`] on every exit path that can await. A workspace
/// dropped unreleased (panic or a cancelled future) is removed on the tokio
/// blocking pool when a runtime is current, and inline otherwise.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
    metrics: Option<Metrics>,
}

impl Workspace {
    pub(crate) const fn new(path: PathBuf, metrics: Option<Metrics>) -> Self {
        Self {
            path,
            released: false,
            metrics,
        }
    }

    /// Absolute path of the workspace directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of an entry inside the workspace.
    #[must_use]
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.path.join(relative)
    }

    /// Remove the workspace tree.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Release`] when the tree exists but cannot be removed.
    pub async fn release(mut self) -> WorkspaceResult<ReleaseOutcome> {
        self.released = true;
        let result = release_path(&self.path).await;
        self.record(&result);
        result
    }

    fn record(&self, result: &WorkspaceResult<ReleaseOutcome>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.workspace_released();
        if result.is_err() {
            metrics.inc_workspace_cleanup_failure();
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let path = std::mem::take(&mut self.path);
        let metrics = self.metrics.take();
        if let Some(metrics) = &metrics {
            metrics.workspace_released();
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                drop(handle.spawn_blocking(move || remove_on_drop(&path, metrics.as_ref())));
            }
            Err(_) => remove_on_drop(&path, metrics.as_ref()),
        }
    }
}

/// Blocking removal for workspaces that were never released.
///
/// Runs on the blocking pool when a runtime is available so async workers
/// are not stalled by large clones.
fn remove_on_drop(path: &Path, metrics: Option<&Metrics>) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "workspace removed on drop"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "failed to remove workspace on drop"
            );
            if let Some(metrics) = metrics {
                metrics.inc_workspace_cleanup_failure();
            }
        }
    }
}

/// Recursively remove `path`, treating a missing directory as success.
///
/// # Errors
///
/// Returns [`WorkspaceError::Release`] for any failure other than `NotFound`.
pub async fn release_path(path: &Path) -> WorkspaceResult<ReleaseOutcome> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "workspace removed");
            Ok(ReleaseOutcome::Removed)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(ReleaseOutcome::AlreadyGone),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to remove workspace");
            Err(WorkspaceError::release(path, err))
        }
    }
}
