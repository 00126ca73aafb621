//! Field parsers shared by the environment loader.
//!
//! Every parser receives the raw (already trimmed) value and the variable name
//! it came from so failures carry the field without formatting it into the message.

use std::net::IpAddr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ParseFailurePolicy;

/// Parse a TCP port in `1..=65535`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not an integer or is zero.
pub fn parse_port(field: &'static str, value: &str) -> ConfigResult<u16> {
    let port = value
        .parse::<u16>()
        .map_err(|_| ConfigError::invalid(field, "not_a_port", value))?;
    if port == 0 {
        return Err(ConfigError::invalid(field, "zero", value));
    }
    Ok(port)
}

/// Parse an IP address, tolerating a trailing CIDR suffix.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the host portion is not an IP address.
pub fn parse_bind_addr(field: &'static str, value: &str) -> ConfigResult<IpAddr> {
    let host = value.split('/').next().unwrap_or(value);
    host.parse::<IpAddr>()
        .map_err(|_| ConfigError::invalid(field, "not_an_ip_address", value))
}

/// Parse a strictly positive number of seconds.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a positive integer.
pub fn parse_secs(field: &'static str, value: &str) -> ConfigResult<Duration> {
    let secs = value
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(field, "not_an_integer", value))?;
    if secs == 0 {
        return Err(ConfigError::invalid(field, "zero", value));
    }
    Ok(Duration::from_secs(secs))
}

/// Parse a strictly positive `u32`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a positive integer.
pub fn parse_positive_u32(field: &'static str, value: &str) -> ConfigResult<u32> {
    let parsed = value
        .parse::<u32>()
        .map_err(|_| ConfigError::invalid(field, "not_an_integer", value))?;
    if parsed == 0 {
        return Err(ConfigError::invalid(field, "zero", value));
    }
    Ok(parsed)
}

/// Parse a boolean flag (`1/0`, `true/false`, `yes/no`, `on/off`).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for any other spelling.
pub fn parse_bool(field: &'static str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(field, "not_a_boolean", value)),
    }
}

/// Parse a similarity threshold in `[0, 1]`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a finite number in range.
pub fn parse_threshold(field: &'static str, value: &str) -> ConfigResult<f64> {
    let threshold = value
        .parse::<f64>()
        .map_err(|_| ConfigError::invalid(field, "not_a_number", value))?;
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::invalid(field, "out_of_range", value));
    }
    Ok(threshold)
}

/// Parse the report parse-failure policy.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for values other than `zero` or `fail`.
pub fn parse_policy(field: &'static str, value: &str) -> ConfigResult<ParseFailurePolicy> {
    value
        .parse::<ParseFailurePolicy>()
        .map_err(|()| ConfigError::invalid(field, "unknown_policy", value))
}

/// Parse the log output format.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for values other than `json` or `pretty`.
pub fn parse_log_format(field: &'static str, value: &str) -> ConfigResult<String> {
    let normalized = value.to_ascii_lowercase();
    match normalized.as_str() {
        "json" | "pretty" => Ok(normalized),
        _ => Err(ConfigError::invalid(field, "unknown_format", value)),
    }
}
