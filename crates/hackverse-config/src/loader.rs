//! Environment-backed construction of [`ServiceConfig`].
//!
//! # Design
//! - Read the process environment exactly once; `from_lookup` exists so tests never mutate it.
//! - Blank values behave like unset values.
//! - `SIMILARITY_API_KEY` is never echoed into errors or logs.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::defaults::{
    DEFAULT_BIND_ADDR, DEFAULT_CLONE_TIMEOUT_SECS, DEFAULT_FLAG_THRESHOLD, DEFAULT_GIT_BIN,
    DEFAULT_JSCPD_BIN, DEFAULT_JSCPD_MIN_TOKENS, DEFAULT_LOG_LEVEL, DEFAULT_PORT,
    DEFAULT_SCAN_TIMEOUT_SECS, DEFAULT_WORKSPACE_MAX_AGE_SECS,
};
use crate::error::ConfigResult;
use crate::model::{
    FetchSettings, LoggingSettings, ParseFailurePolicy, ReviewSettings, ScanSettings,
    ServiceConfig, WorkspaceSettings,
};
use crate::validate::{
    parse_bind_addr, parse_bool, parse_log_format, parse_policy, parse_port, parse_positive_u32,
    parse_secs, parse_threshold,
};

/// Environment variable names understood by the loader.
pub mod vars {
    /// Listen port.
    pub const PORT: &str = "PORT";
    /// Listen address.
    pub const BIND_ADDR: &str = "HACKVERSE_BIND_ADDR";
    /// Bearer token protecting `/compare`.
    pub const API_KEY: &str = "SIMILARITY_API_KEY";
    /// Workspace parent directory.
    pub const WORKSPACE_ROOT: &str = "HACKVERSE_WORKSPACE_ROOT";
    /// Startup sweep age.
    pub const WORKSPACE_MAX_AGE_SECS: &str = "HACKVERSE_WORKSPACE_MAX_AGE_SECS";
    /// Git executable.
    pub const GIT_BIN: &str = "HACKVERSE_GIT_BIN";
    /// Clone timeout.
    pub const CLONE_TIMEOUT_SECS: &str = "HACKVERSE_CLONE_TIMEOUT_SECS";
    /// Accept `file://` repositories.
    pub const ALLOW_FILE_URLS: &str = "HACKVERSE_ALLOW_FILE_URLS";
    /// Detector executable.
    pub const JSCPD_BIN: &str = "HACKVERSE_JSCPD_BIN";
    /// Scan timeout.
    pub const SCAN_TIMEOUT_SECS: &str = "HACKVERSE_SCAN_TIMEOUT_SECS";
    /// Detector minimum tokens.
    pub const JSCPD_MIN_TOKENS: &str = "HACKVERSE_JSCPD_MIN_TOKENS";
    /// Unreadable report handling.
    pub const PARSE_FAILURE_POLICY: &str = "HACKVERSE_PARSE_FAILURE_POLICY";
    /// Flag threshold.
    pub const FLAG_THRESHOLD: &str = "HACKVERSE_FLAG_THRESHOLD";
    /// Default log filter.
    pub const LOG_LEVEL: &str = "HACKVERSE_LOG_LEVEL";
    /// Log output format.
    pub const LOG_FORMAT: &str = "HACKVERSE_LOG_FORMAT";
}

impl ServiceConfig {
    /// Build the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError`] when any provided variable fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError`] when any provided variable fails validation.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = match get(vars::BIND_ADDR) {
            Some(value) => parse_bind_addr(vars::BIND_ADDR, &value)?,
            None => DEFAULT_BIND_ADDR
                .parse::<IpAddr>()
                .unwrap_or(IpAddr::from([0, 0, 0, 0])),
        };
        let port = get(vars::PORT)
            .map(|value| parse_port(vars::PORT, &value))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);
        let api_key = get(vars::API_KEY);

        let workspace = WorkspaceSettings {
            root: get(vars::WORKSPACE_ROOT).map_or_else(std::env::temp_dir, PathBuf::from),
            max_age: secs_or(
                get(vars::WORKSPACE_MAX_AGE_SECS),
                vars::WORKSPACE_MAX_AGE_SECS,
                DEFAULT_WORKSPACE_MAX_AGE_SECS,
            )?,
        };

        let fetch = FetchSettings {
            git_bin: get(vars::GIT_BIN).unwrap_or_else(|| DEFAULT_GIT_BIN.to_string()),
            timeout: secs_or(
                get(vars::CLONE_TIMEOUT_SECS),
                vars::CLONE_TIMEOUT_SECS,
                DEFAULT_CLONE_TIMEOUT_SECS,
            )?,
            allow_local_repositories: get(vars::ALLOW_FILE_URLS)
                .map(|value| parse_bool(vars::ALLOW_FILE_URLS, &value))
                .transpose()?
                .unwrap_or(false),
        };

        let scan = ScanSettings {
            jscpd_bin: get(vars::JSCPD_BIN).unwrap_or_else(|| DEFAULT_JSCPD_BIN.to_string()),
            timeout: secs_or(
                get(vars::SCAN_TIMEOUT_SECS),
                vars::SCAN_TIMEOUT_SECS,
                DEFAULT_SCAN_TIMEOUT_SECS,
            )?,
            min_tokens: get(vars::JSCPD_MIN_TOKENS)
                .map(|value| parse_positive_u32(vars::JSCPD_MIN_TOKENS, &value))
                .transpose()?
                .unwrap_or(DEFAULT_JSCPD_MIN_TOKENS),
            parse_failure: get(vars::PARSE_FAILURE_POLICY)
                .map(|value| parse_policy(vars::PARSE_FAILURE_POLICY, &value))
                .transpose()?
                .unwrap_or(ParseFailurePolicy::Zero),
        };

        let review = ReviewSettings {
            flag_threshold: get(vars::FLAG_THRESHOLD)
                .map(|value| parse_threshold(vars::FLAG_THRESHOLD, &value))
                .transpose()?
                .unwrap_or(DEFAULT_FLAG_THRESHOLD),
        };

        let logging = LoggingSettings {
            level: get(vars::LOG_LEVEL).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            format: get(vars::LOG_FORMAT)
                .map(|value| parse_log_format(vars::LOG_FORMAT, &value))
                .transpose()?,
        };

        Ok(Self {
            bind_addr,
            port,
            api_key,
            workspace,
            fetch,
            scan,
            review,
            logging,
        })
    }
}

fn secs_or(value: Option<String>, field: &'static str, default: u64) -> ConfigResult<Duration> {
    value.map_or_else(
        || Ok(Duration::from_secs(default)),
        |value| parse_secs(field, &value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = ServiceConfig::from_lookup(lookup(&[])).expect("defaults are valid");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert!(config.api_key.is_none());
        assert!(!config.auth_enabled());
        assert_eq!(config.fetch.git_bin, "git");
        assert_eq!(config.scan.jscpd_bin, "jscpd");
        assert_eq!(config.scan.min_tokens, 50);
        assert_eq!(config.scan.parse_failure, ParseFailurePolicy::Zero);
        assert!((config.review.flag_threshold - 0.85).abs() < f64::EPSILON);
        assert!(!config.fetch.allow_local_repositories);
        assert_eq!(config.workspace.root, std::env::temp_dir());
        assert!(config.logging.format.is_none());
    }

    #[test]
    fn blank_api_key_disables_authentication() {
        let config =
            ServiceConfig::from_lookup(lookup(&[(vars::API_KEY, "   ")])).expect("valid config");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (vars::PORT, "8081"),
            (vars::BIND_ADDR, "127.0.0.1"),
            (vars::API_KEY, "secret"),
            (vars::WORKSPACE_ROOT, "/var/tmp/hv"),
            (vars::CLONE_TIMEOUT_SECS, "30"),
            (vars::ALLOW_FILE_URLS, "true"),
            (vars::PARSE_FAILURE_POLICY, "fail"),
            (vars::FLAG_THRESHOLD, "0.5"),
            (vars::LOG_FORMAT, "json"),
        ]))
        .expect("valid config");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8081");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.workspace.root, PathBuf::from("/var/tmp/hv"));
        assert_eq!(config.fetch.timeout, Duration::from_secs(30));
        assert!(config.fetch.allow_local_repositories);
        assert_eq!(config.scan.parse_failure, ParseFailurePolicy::Fail);
        assert!((config.review.flag_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = ServiceConfig::from_lookup(lookup(&[(vars::FLAG_THRESHOLD, "2")]))
            .expect_err("threshold above one");
        assert_eq!(err.field(), vars::FLAG_THRESHOLD);
        assert_eq!(err.reason(), "out_of_range");

        let err = ServiceConfig::from_lookup(lookup(&[(vars::SCAN_TIMEOUT_SECS, "soon")]))
            .expect_err("non-numeric timeout");
        assert_eq!(err.field(), vars::SCAN_TIMEOUT_SECS);
    }
}
