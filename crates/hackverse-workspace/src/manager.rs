//! Allocation of exclusive workspace directories under a shared root.
//!
//! # Design
//! - Leaf directories are created with `create_dir`, never `create_dir_all`, so a
//!   name collision surfaces as `AlreadyExists` and a fresh name is drawn.
//! - On unix the leaf is private to the service user (`0o700`).
//! - Only directories carrying the manager prefix are ever swept.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use hackverse_telemetry::Metrics;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::guard::{ReleaseOutcome, Workspace, release_path};

/// Prefix shared by every workspace directory name.
pub const DEFAULT_PREFIX: &str = "hackverse-cmp-";

const MAX_ATTEMPTS: usize = 8;

/// Hands out uniquely named workspaces beneath `root`.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    prefix: String,
    metrics: Option<Metrics>,
}

/// Counts produced by [`WorkspaceManager::sweep_stale`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale workspaces deleted.
    pub removed: usize,
    /// Stale workspaces that could not be deleted.
    pub failed: usize,
}

impl WorkspaceManager {
    /// Create a manager rooted at `root` with the default prefix.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            metrics: None,
        }
    }

    /// Override the directory name prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Report allocations and cleanup failures to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Root directory workspaces are created under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh, empty workspace directory.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when the root or leaf cannot be created and
    /// [`WorkspaceError::Exhausted`] if every generated name was taken.
    pub async fn acquire(&self) -> WorkspaceResult<Workspace> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| WorkspaceError::io("create_root", &self.root, err))?;

        for _ in 0..MAX_ATTEMPTS {
            let path = self
                .root
                .join(format!("{}{}", self.prefix, Uuid::new_v4().simple()));
            match create_private_dir(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "workspace acquired");
                    if let Some(metrics) = &self.metrics {
                        metrics.workspace_acquired();
                    }
                    return Ok(Workspace::new(path, self.metrics.clone()));
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(WorkspaceError::io("create_workspace", path, err)),
            }
        }

        Err(WorkspaceError::Exhausted {
            root: self.root.clone(),
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Remove leftover workspaces older than `max_age`.
    ///
    /// A missing root yields an empty report.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when the root cannot be listed.
    pub async fn sweep_stale(&self, max_age: Duration) -> WorkspaceResult<SweepReport> {
        let mut report = SweepReport::default();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(err) => return Err(WorkspaceError::io("read_root", &self.root, err)),
        };

        let now = SystemTime::now();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| WorkspaceError::io("read_root", &self.root, err))?
        {
            if !entry.file_name().to_string_lossy().starts_with(&self.prefix) {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_dir() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }
            match release_path(&entry.path()).await {
                Ok(ReleaseOutcome::Removed) => report.removed += 1,
                Ok(ReleaseOutcome::AlreadyGone) => {}
                Err(_) => {
                    report.failed += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_workspace_cleanup_failure();
                    }
                }
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                root = %self.root.display(),
                removed = report.removed,
                failed = report.failed,
                "swept stale workspaces"
            );
        } else {
            debug!(root = %self.root.display(), "no stale workspaces found");
        }
        if report.failed > 0 {
            warn!(failed = report.failed, "some stale workspaces could not be removed");
        }
        Ok(report)
    }
}

#[cfg(unix)]
async fn create_private_dir(path: &Path) -> io::Result<()> {
    fs::DirBuilder::new().mode(0o700).create(path).await
}

#[cfg(not(unix))]
async fn create_private_dir(path: &Path) -> io::Result<()> {
    fs::create_dir(path).await
}
