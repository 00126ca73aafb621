//! Test fixtures and environment helpers.

use std::process::{Command, Stdio};

/// Returns `true` if `program --version` runs successfully.
#[must_use]
pub fn tool_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Returns `true` if `git` is installed.
#[must_use]
pub fn git_available() -> bool {
    tool_available(&git_bin())
}

/// Returns `true` if the `jscpd` detector is installed.
#[must_use]
pub fn jscpd_available() -> bool {
    tool_available(&jscpd_bin())
}

/// Git executable, honouring `HACKVERSE_GIT_BIN`.
#[must_use]
pub fn git_bin() -> String {
    binary_from_env("HACKVERSE_GIT_BIN", "git")
}

/// Detector executable, honouring `HACKVERSE_JSCPD_BIN`.
#[must_use]
pub fn jscpd_bin() -> String {
    binary_from_env("HACKVERSE_JSCPD_BIN", "jscpd")
}

fn binary_from_env(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
