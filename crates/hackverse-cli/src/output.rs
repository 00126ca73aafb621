//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use hackverse_batch::{BatchSummary, FlaggedPair};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// Outcome of a single `compare` invocation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompareOutcome {
    pub(crate) repo_a: String,
    pub(crate) repo_b: String,
    pub(crate) score: f64,
    pub(crate) flagged: bool,
}

pub(crate) fn render_health(ok: bool, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "ok": ok }))?,
        OutputFormat::Table => println!("service: {}", if ok { "ok" } else { "unhealthy" }),
    }
    Ok(())
}

pub(crate) fn render_comparison(outcome: &CompareOutcome, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(outcome)?,
        OutputFormat::Table => {
            println!("repo a: {}", outcome.repo_a);
            println!("repo b: {}", outcome.repo_b);
            println!("similarity: {}", format_score(outcome.score));
            if outcome.flagged {
                println!("flagged for review");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_batch_summary(summary: &BatchSummary, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(summary)?,
        OutputFormat::Table => {
            println!("event: {}", summary.event_id);
            println!("submissions: {}", summary.submissions);
            println!(
                "pairs: {} attempted, {} succeeded, {} failed",
                summary.pairs_attempted, summary.pairs_succeeded, summary.pairs_failed
            );
            print_flagged_table(&summary.flagged);
        }
    }
    Ok(())
}

pub(crate) fn render_flagged(pairs: &[FlaggedPair], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&pairs)?,
        OutputFormat::Table => print_flagged_table(pairs),
    }
    Ok(())
}

fn print_flagged_table(pairs: &[FlaggedPair]) {
    if pairs.is_empty() {
        println!("no pairs flagged");
        return;
    }
    println!("{:<24} {:<24} {:>8}", "SUBMISSION A", "SUBMISSION B", "SCORE");
    for pair in pairs {
        println!(
            "{:<24} {:<24} {:>8}",
            pair.submission_a,
            pair.submission_b,
            format_score(pair.similarity)
        );
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn format_score(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}
