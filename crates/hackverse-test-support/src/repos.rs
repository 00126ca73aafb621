//! Local git repositories served over `file://` URLs.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;
use url::Url;

use crate::fixtures::git_bin;

/// A committed repository inside a temporary directory.
///
/// The directory is deleted when the value is dropped.
#[derive(Debug)]
pub struct LocalRepo {
    dir: TempDir,
    url: String,
}

impl LocalRepo {
    /// Create and commit a repository containing `files` (path, contents).
    ///
    /// # Errors
    ///
    /// Returns an error when the files cannot be written or git fails.
    pub fn create(files: &[(&str, &str)]) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("hackverse-repo-")
            .tempdir()
            .context("failed to create repository directory")?;

        for (relative, contents) in files {
            let target = dir.path().join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create '{}'", parent.display()))?;
            }
            std::fs::write(&target, contents)
                .with_context(|| format!("failed to write '{}'", target.display()))?;
        }

        git(dir.path(), &["init", "--quiet", "--initial-branch=main"])?;
        git(dir.path(), &["add", "--all"])?;
        git(
            dir.path(),
            &[
                "-c",
                "user.name=HackVerse Tests",
                "-c",
                "user.email=tests@hackverse.invalid",
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--quiet",
                "--allow-empty",
                "-m",
                "fixture",
            ],
        )?;

        let url = Url::from_directory_path(dir.path())
            .map_err(|()| anyhow!("repository path is not absolute"))?
            .to_string();
        Ok(Self { dir, url })
    }

    /// `file://` URL of the repository.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Working tree path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the working tree.
    #[must_use]
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(relative)
    }
}

fn git(cwd: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new(git_bin())
        .args(args)
        .current_dir(cwd)
        .output()
        .with_context(|| format!("failed to run git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}
