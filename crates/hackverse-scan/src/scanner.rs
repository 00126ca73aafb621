//! Duplication detection over two checked-out repositories.
//!
//! # Design
//! - The detector runs with the workspace as its working directory and relative
//!   paths, so reports never mention server locations.
//! - The score is `statistics.total.percentage / 100`, clamped to `[0, 1]`.
//! - Report problems and non-zero exits degrade to `0.0` or fail, depending on
//!   [`ParseFailurePolicy`]; a detector that cannot run at all always fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hackverse_config::{ParseFailurePolicy, ScanSettings};
use serde_json::{Value, json};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{CommandError, ScanError, ScanResult};

/// Tool name recorded in result details.
pub const TOOL_NAME: &str = "jscpd";
/// Report directory, relative to the workspace.
pub const REPORT_DIR: &str = "report";
/// File the JSON reporter writes inside [`REPORT_DIR`].
pub const REPORT_FILE: &str = "jscpd-report.json";

const IGNORE_PATTERNS: &str = "**/.git/**,**/node_modules/**";

/// Raw detector report, kept verbatim for audit.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReport(pub Value);

impl RawReport {
    /// Decode a report from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns the decoder error when `text` is not JSON.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text).map(Self)
    }

    /// Raw `statistics.total.percentage` value, if present.
    #[must_use]
    pub fn percentage(&self) -> Option<&Value> {
        self.0.pointer("/statistics/total/percentage")
    }
}

/// Extract the normalised score, explaining why when that is impossible.
///
/// # Errors
///
/// Returns a machine-readable reason when the percentage is absent, not numeric,
/// or not finite.
pub fn try_parse_score(report: &RawReport) -> Result<f64, &'static str> {
    let percentage = match report.percentage() {
        None | Some(Value::Null) => return Err("missing_percentage"),
        Some(Value::Number(number)) => number.as_f64().ok_or("not_numeric")?,
        Some(Value::String(text)) => text.trim().parse::<f64>().map_err(|_| "not_numeric")?,
        Some(_) => return Err("not_numeric"),
    };
    if !percentage.is_finite() {
        return Err("not_finite");
    }
    Ok((percentage / 100.0).clamp(0.0, 1.0))
}

/// Extract the normalised score, treating any report problem as `0.0`.
#[must_use]
pub fn parse_score(report: &RawReport) -> f64 {
    try_parse_score(report).unwrap_or(0.0)
}

/// Score plus the structured details returned to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// Normalised similarity in `[0, 1]`.
    pub score: f64,
    /// Tool metadata, the raw report, and any degradation reason.
    pub details: Value,
}

impl ScanOutcome {
    /// Whether the score was substituted because the report was unusable.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.details.get("status").and_then(Value::as_str) == Some("degraded")
    }
}

/// Runs the duplication detector through a [`CommandRunner`].
#[derive(Clone)]
pub struct DuplicationScanner {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
    min_tokens: u32,
    policy: ParseFailurePolicy,
}

impl std::fmt::Debug for DuplicationScanner {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DuplicationScanner")
            .field("program", &self.program)
            .field("timeout", &self.timeout)
            .field("min_tokens", &self.min_tokens)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DuplicationScanner {
    /// Build a scanner from configuration.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &ScanSettings) -> Self {
        Self {
            runner,
            program: settings.jscpd_bin.clone(),
            timeout: settings.timeout,
            min_tokens: settings.min_tokens,
            policy: settings.parse_failure,
        }
    }

    /// Arguments passed to the detector for directories `dir_a` and `dir_b`.
    #[must_use]
    pub fn scan_args(&self, dir_a: &str, dir_b: &str) -> Vec<String> {
        vec![
            "--silent".to_string(),
            "--reporters".to_string(),
            "json".to_string(),
            "--output".to_string(),
            REPORT_DIR.to_string(),
            "--min-tokens".to_string(),
            self.min_tokens.to_string(),
            "--ignore".to_string(),
            IGNORE_PATTERNS.to_string(),
            dir_a.to_string(),
            dir_b.to_string(),
        ]
    }

    /// Scan `dir_a` and `dir_b` (relative to `workspace_root`) for shared code.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ToolUnavailable`], [`ScanError::Timeout`], or
    /// [`ScanError::Spawn`] when the detector cannot run, and
    /// [`ScanError::ToolFailed`] / [`ScanError::ReportUnparseable`] under the
    /// `fail` policy.
    pub async fn scan(
        &self,
        workspace_root: &Path,
        dir_a: &str,
        dir_b: &str,
    ) -> ScanResult<ScanOutcome> {
        let started = Instant::now();
        let spec = CommandSpec::new(&self.program, self.timeout)
            .args(self.scan_args(dir_a, dir_b))
            .current_dir(workspace_root);

        let output = self.runner.run(&spec).await.map_err(|err| match err {
            CommandError::NotFound { program } => ScanError::ToolUnavailable { program },
            CommandError::TimedOut { timeout, .. } => ScanError::Timeout { timeout },
            source @ CommandError::Spawn { .. } => ScanError::Spawn { source },
        })?;

        let sources = json!({
            "a": count_source_files(workspace_root.join(dir_a)).await,
            "b": count_source_files(workspace_root.join(dir_b)).await,
        });

        if !output.success() {
            warn!(
                exit_code = ?output.status,
                stderr = %output.stderr,
                "duplication scanner exited unsuccessfully"
            );
            if self.policy == ParseFailurePolicy::Fail {
                return Err(ScanError::ToolFailed {
                    exit_code: output.status,
                    stderr: output.stderr,
                });
            }
            return Ok(degraded("tool_exit", None, sources, started.elapsed()));
        }

        let report_path = workspace_root.join(REPORT_DIR).join(REPORT_FILE);
        let report = match read_report(&report_path).await {
            Ok(report) => report,
            Err(reason) => return self.report_problem(reason, None, sources, started),
        };

        match try_parse_score(&report) {
            Ok(score) => {
                let elapsed = started.elapsed();
                debug!(score, elapsed_ms = millis(elapsed), "duplication scan finished");
                Ok(ScanOutcome {
                    score,
                    details: json!({
                        "tool": TOOL_NAME,
                        "status": "parsed",
                        "percentage": report.percentage().cloned().unwrap_or(Value::Null),
                        "report": report.0,
                        "error": Value::Null,
                        "sources": sources,
                        "durationMs": millis(elapsed),
                    }),
                })
            }
            Err(reason) => self.report_problem(reason, Some(report), sources, started),
        }
    }

    fn report_problem(
        &self,
        reason: &'static str,
        report: Option<RawReport>,
        sources: Value,
        started: Instant,
    ) -> ScanResult<ScanOutcome> {
        warn!(reason, "duplication report unusable");
        match self.policy {
            ParseFailurePolicy::Fail => Err(ScanError::ReportUnparseable { reason }),
            ParseFailurePolicy::Zero => Ok(degraded(reason, report, sources, started.elapsed())),
        }
    }
}

fn degraded(
    reason: &'static str,
    report: Option<RawReport>,
    sources: Value,
    elapsed: Duration,
) -> ScanOutcome {
    let percentage = report
        .as_ref()
        .and_then(RawReport::percentage)
        .cloned()
        .unwrap_or(Value::Null);
    ScanOutcome {
        score: 0.0,
        details: json!({
            "tool": TOOL_NAME,
            "status": "degraded",
            "percentage": percentage,
            "report": report.map_or(Value::Null, |report| report.0),
            "error": reason,
            "sources": sources,
            "durationMs": millis(elapsed),
        }),
    }
}

async fn read_report(path: &Path) -> Result<RawReport, &'static str> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err("missing_report"),
        Err(_) => return Err("unreadable_report"),
    };
    RawReport::from_json_str(&text).map_err(|_| "malformed_report")
}

async fn count_source_files(root: PathBuf) -> u64 {
    tokio::task::spawn_blocking(move || {
        let mut count = 0_u64;
        let walker = WalkDir::new(&root).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            name != ".git" && name != "node_modules"
        });
        for entry in walker.flatten() {
            if entry.file_type().is_file() {
                count += 1;
            }
        }
        count
    })
    .await
    .unwrap_or_default()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
