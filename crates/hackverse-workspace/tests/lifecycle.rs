use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use hackverse_telemetry::Metrics;
use hackverse_workspace::{ReleaseOutcome, WorkspaceManager};
use tempfile::TempDir;

fn temp_dir() -> Result<TempDir, Box<dyn Error>> {
    Ok(tempfile::Builder::new()
        .prefix("hackverse-lifecycle-")
        .tempdir()?)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquisitions_never_collide() -> Result<(), Box<dyn Error>> {
    let root = temp_dir()?;
    let manager = Arc::new(WorkspaceManager::new(root.path()));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move { manager.acquire().await }));
    }

    let mut workspaces = Vec::new();
    for handle in handles {
        workspaces.push(handle.await??);
    }
    let paths: HashSet<_> = workspaces
        .iter()
        .map(|workspace| workspace.path().to_path_buf())
        .collect();
    assert_eq!(paths.len(), 32);

    for workspace in workspaces {
        assert_eq!(workspace.release().await?, ReleaseOutcome::Removed);
    }
    assert_eq!(std::fs::read_dir(root.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn cancelled_task_still_removes_workspace() -> Result<(), Box<dyn Error>> {
    let root = temp_dir()?;
    let metrics = Metrics::new()?;
    let manager = WorkspaceManager::new(root.path()).with_metrics(metrics.clone());

    let (tx, rx) = tokio::sync::oneshot::channel();
    let task = tokio::spawn(async move {
        let workspace = manager.acquire().await?;
        std::fs::write(workspace.join("partial"), b"clone in progress")?;
        let _ = tx.send(workspace.path().to_path_buf());
        std::future::pending::<()>().await;
        workspace.release().await?;
        Ok::<(), Box<dyn Error + Send + Sync>>(())
    });

    let path = rx.await?;
    assert!(path.exists());
    task.abort();
    let _ = task.await;

    for _ in 0..200 {
        if !path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!path.exists());
    assert_eq!(metrics.snapshot().workspaces_active, 0);
    Ok(())
}

#[tokio::test]
async fn already_removed_workspace_releases_cleanly() -> Result<(), Box<dyn Error>> {
    let root = temp_dir()?;
    let workspace = WorkspaceManager::new(root.path()).acquire().await?;
    std::fs::remove_dir_all(workspace.path())?;
    assert_eq!(workspace.release().await?, ReleaseOutcome::AlreadyGone);
    Ok(())
}
