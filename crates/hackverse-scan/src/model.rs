//! Request and result types exchanged with comparison callers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Accepted variation between two runs over identical inputs.
pub const SCORE_TOLERANCE: f64 = 0.01;

/// Whether two scores agree within [`SCORE_TOLERANCE`].
#[must_use]
pub fn scores_match(left: f64, right: f64) -> bool {
    (left - right).abs() <= SCORE_TOLERANCE
}

/// Which side of a comparison a repository belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The first repository (`repoA`).
    A,
    /// The second repository (`repoB`).
    B,
}

impl Side {
    /// Wire field name for this side.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::A => "repoA",
            Self::B => "repoB",
        }
    }

    /// Directory, relative to the workspace, the repository is cloned into.
    #[must_use]
    pub const fn directory(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.field())
    }
}

/// Two repositories to compare.
///
/// Only constructed through [`ComparisonRequest::from_parts`] or
/// [`ComparisonRequest::from_json`], so both URLs are always present and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRequest {
    repo_a: String,
    repo_b: String,
}

impl ComparisonRequest {
    /// Build a request from optional raw values.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingRepository`] when either value is absent or blank.
    pub fn from_parts(repo_a: Option<&str>, repo_b: Option<&str>) -> Result<Self, ValidationError> {
        Ok(Self {
            repo_a: required(repo_a, Side::A)?,
            repo_b: required(repo_b, Side::B)?,
        })
    }

    /// Build a request from a decoded JSON body; non-string fields count as missing.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingRepository`] when either field is unusable.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        Self::from_parts(
            body.get(Side::A.field()).and_then(Value::as_str),
            body.get(Side::B.field()).and_then(Value::as_str),
        )
    }

    /// URL of the first repository.
    #[must_use]
    pub fn repo_a(&self) -> &str {
        &self.repo_a
    }

    /// URL of the second repository.
    #[must_use]
    pub fn repo_b(&self) -> &str {
        &self.repo_b
    }

    /// URL for the given side.
    #[must_use]
    pub fn repo(&self, side: Side) -> &str {
        match side {
            Side::A => &self.repo_a,
            Side::B => &self.repo_b,
        }
    }
}

fn required(value: Option<&str>, side: Side) -> Result<String, ValidationError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ValidationError::MissingRepository {
            field: side.field(),
        })
}

/// Outcome of a successful comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Normalised similarity in `[0, 1]`.
    pub score: f64,
    /// Tool metadata and the raw report, kept for audit.
    pub details: Value,
}
