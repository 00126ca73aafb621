//! Documented defaults applied when an environment variable is absent.
//!
//! # Design
//! - Keep every default in one place so the README table and the loader agree.
//! - Durations are expressed in seconds to match the environment contract.

/// Listen port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 4000;
/// Listen address used when `HACKVERSE_BIND_ADDR` is unset.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
/// Git executable resolved through `PATH`.
pub const DEFAULT_GIT_BIN: &str = "git";
/// Duplication detector executable resolved through `PATH`.
pub const DEFAULT_JSCPD_BIN: &str = "jscpd";
/// Upper bound for a single shallow clone.
pub const DEFAULT_CLONE_TIMEOUT_SECS: u64 = 120;
/// Upper bound for a single duplication scan.
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 300;
/// Minimum clone size, in tokens, reported by the detector.
pub const DEFAULT_JSCPD_MIN_TOKENS: u32 = 50;
/// Similarity at or above which a pair is flagged for review.
pub const DEFAULT_FLAG_THRESHOLD: f64 = 0.85;
/// Age after which a leftover workspace is swept at startup.
pub const DEFAULT_WORKSPACE_MAX_AGE_SECS: u64 = 3_600;
/// Log filter applied when `RUST_LOG` is not provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";
