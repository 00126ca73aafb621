//! Shallow, hook-free repository cloning.
//!
//! # Design
//! - URLs are validated before any process starts; a leading `-` can never reach
//!   git as an option and `ext::` transports are refused.
//! - Clones never run repository-provided code: hooks point at `/dev/null`, the
//!   template directory is empty, LFS smudge is skipped, and prompts are disabled.
//! - Failures are classified from the exit status and stderr; no retries here.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hackverse_config::FetchSettings;
use tracing::{debug, warn};
use url::Url;

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{CommandError, FetchError, FetchResult};

const REMOTE_SCHEMES: [&str; 4] = ["https", "http", "ssh", "git"];

const AUTH_MARKERS: [&str; 8] = [
    "authentication failed",
    "could not read username",
    "could not read password",
    "terminal prompts disabled",
    "permission denied (publickey",
    "invalid username or password",
    "returned error: 401",
    "returned error: 403",
];

const UNREACHABLE_MARKERS: [&str; 8] = [
    "repository not found",
    "does not appear to be a git repository",
    "does not exist",
    "could not resolve host",
    "could not resolve hostname",
    "failed to connect",
    "connection refused",
    "network is unreachable",
];

const NETWORK_TIMEOUT_MARKERS: [&str; 2] = ["connection timed out", "operation timed out"];

/// Check that `raw` is a repository URL the fetcher is willing to clone.
///
/// Accepts `https`, `http`, `ssh`, and `git` URLs with a host, scp-like
/// `user@host:path` locations, and `file` URLs when `allow_local` is set.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] carrying a machine-readable reason.
pub fn validate_repository_url(raw: &str, allow_local: bool) -> FetchResult<()> {
    let reject = |reason| Err(FetchError::InvalidUrl { reason });
    let value = raw.trim();
    if value.is_empty() {
        return reject("empty");
    }
    if value.starts_with('-') {
        return reject("leading_dash");
    }
    if value.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return reject("whitespace");
    }

    if value.contains("://") {
        let Ok(url) = Url::parse(value) else {
            return reject("malformed");
        };
        return match url.scheme() {
            scheme if REMOTE_SCHEMES.contains(&scheme) => {
                if url.host_str().is_some_and(|host| !host.is_empty()) {
                    Ok(())
                } else {
                    reject("missing_host")
                }
            }
            "file" if allow_local => Ok(()),
            "file" => reject("local_not_allowed"),
            _ => reject("unsupported_scheme"),
        };
    }

    if value.contains("::") {
        reject("transport_helper")
    } else if is_scp_like(value) {
        Ok(())
    } else {
        reject("unsupported_scheme")
    }
}

fn is_scp_like(value: &str) -> bool {
    let Some((authority, path)) = value.split_once(':') else {
        return false;
    };
    let host = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    !host.is_empty()
        && !path.is_empty()
        && authority.contains('@')
        && host
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'))
}

/// Clones repositories with `git` through a [`CommandRunner`].
#[derive(Clone)]
pub struct RepositoryFetcher {
    runner: Arc<dyn CommandRunner>,
    git_bin: String,
    timeout: Duration,
    allow_local: bool,
}

impl std::fmt::Debug for RepositoryFetcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RepositoryFetcher")
            .field("git_bin", &self.git_bin)
            .field("timeout", &self.timeout)
            .field("allow_local", &self.allow_local)
            .finish_non_exhaustive()
    }
}

impl RepositoryFetcher {
    /// Build a fetcher from configuration.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &FetchSettings) -> Self {
        Self {
            runner,
            git_bin: settings.git_bin.clone(),
            timeout: settings.timeout,
            allow_local: settings.allow_local_repositories,
        }
    }

    /// Validate `url` against this fetcher's policy.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] when the URL is not acceptable.
    pub fn validate(&self, url: &str) -> FetchResult<()> {
        validate_repository_url(url, self.allow_local)
    }

    /// Arguments passed to git for a clone of `url` into `destination`.
    #[must_use]
    pub fn clone_args(&self, url: &str, destination: &Path) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            "core.hooksPath=/dev/null".to_string(),
            "-c".to_string(),
            "protocol.ext.allow=never".to_string(),
        ];
        if !self.allow_local {
            args.push("-c".to_string());
            args.push("protocol.file.allow=never".to_string());
        }
        args.extend(
            [
                "clone",
                "--depth",
                "1",
                "--single-branch",
                "--no-tags",
                "--quiet",
                "--template=",
                "--",
            ]
            .map(str::to_string),
        );
        args.push(url.trim().to_string());
        args.push(destination.to_string_lossy().into_owned());
        args
    }

    /// Shallow-clone `url` into `destination`, which must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] classified by cause.
    pub async fn fetch(&self, url: &str, destination: &Path) -> FetchResult<()> {
        self.validate(url)?;

        let spec = CommandSpec::new(&self.git_bin, self.timeout)
            .args(self.clone_args(url, destination))
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_LFS_SKIP_SMUDGE", "1")
            .env("GIT_ASKPASS", "")
            .env("SSH_ASKPASS", "")
            .env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");

        let output = match self.runner.run(&spec).await {
            Ok(output) => output,
            Err(CommandError::TimedOut { timeout, .. }) => {
                warn!(url, timeout_secs = timeout.as_secs(), "clone timed out");
                return Err(FetchError::Timeout { timeout });
            }
            Err(source) => {
                warn!(url, error = %source, "clone could not start");
                return Err(FetchError::Spawn { source });
            }
        };

        if output.success() {
            debug!(url, destination = %destination.display(), "clone finished");
            return Ok(());
        }

        warn!(
            url,
            exit_code = ?output.status,
            stderr = output.stderr.as_str(),
            "clone failed"
        );
        let err = classify_clone_failure(output.status, output.stderr, self.timeout);
        debug!(url, kind = err.kind().as_str(), "clone failure classified");
        Err(err)
    }
}

/// Map an unsuccessful clone onto a [`FetchError`] from its stderr.
///
/// `timeout` is the clone budget reported when git itself gave up on a
/// stalled connection.
#[must_use]
pub fn classify_clone_failure(
    exit_code: Option<i32>,
    stderr: String,
    timeout: Duration,
) -> FetchError {
    let lowered = stderr.to_ascii_lowercase();
    if AUTH_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        FetchError::Authentication { exit_code, stderr }
    } else if NETWORK_TIMEOUT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        FetchError::Timeout { timeout }
    } else if UNREACHABLE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        || missing_repository(&lowered)
    {
        FetchError::Unreachable { exit_code, stderr }
    } else {
        FetchError::Process { exit_code, stderr }
    }
}

/// Git's `repository '<url>' not found`, as opposed to a missing branch or ref.
fn missing_repository(lowered: &str) -> bool {
    lowered
        .split_once("repository '")
        .is_some_and(|(_, rest)| rest.contains("' not found"))
}
