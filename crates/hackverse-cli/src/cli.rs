//! Argument parsing and command dispatch.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use hackverse_batch::DEFAULT_FLAG_THRESHOLD;
use hackverse_config::validate::parse_threshold;
use hackverse_telemetry::{LogFormat, LoggingConfig, build_sha, init_logging};
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult, build_client};
use crate::commands::compare::handle_compare;
use crate::commands::event::{handle_flags, handle_scan_event};
use crate::commands::health::handle_health;

const DEFAULT_API_URL: &str = "http://127.0.0.1:4000";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: DEFAULT_LOG_LEVEL,
        format: LogFormat::Pretty,
        build_sha: build_sha(),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging unavailable: {err}");
    }

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let trace_id = Uuid::new_v4().simple().to_string();
    let ctx = AppContext {
        client: build_client(Duration::from_secs(cli.timeout), &trace_id)?,
        base_url: cli.api_url,
        api_key: parse_api_key(cli.api_key),
    };

    match cli.command {
        Command::Health => handle_health(&ctx, cli.output).await,
        Command::Compare(args) => handle_compare(&ctx, &args, cli.output).await,
        Command::ScanEvent(args) => handle_scan_event(&ctx, &args, cli.output).await,
        Command::Flags(args) => handle_flags(&args, cli.output).await,
    }
}

#[derive(Parser)]
#[command(
    name = "hackverse",
    about = "Pairwise repository similarity checks for hackathon judging"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "HACKVERSE_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(long, global = true, env = "SIMILARITY_API_KEY", hide_env_values = true)]
    pub(crate) api_key: Option<String>,
    #[arg(
        long,
        global = true,
        env = "HACKVERSE_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Check that the service is up.
    Health,
    /// Compare two repositories.
    Compare(CompareArgs),
    /// Compare every pair of submissions in an event manifest.
    ScanEvent(ScanEventArgs),
    /// List flagged pairs from stored reports.
    Flags(FlagsArgs),
}

#[derive(Args)]
pub(crate) struct CompareArgs {
    /// First repository URL.
    pub(crate) repo_a: String,
    /// Second repository URL.
    pub(crate) repo_b: String,
    /// Similarity at or above which the pair is flagged.
    #[arg(long, value_parser = parse_threshold_arg, default_value_t = DEFAULT_FLAG_THRESHOLD)]
    pub(crate) threshold: f64,
}

#[derive(Args)]
pub(crate) struct ScanEventArgs {
    /// Event manifest (`{"eventId": ..., "submissions": [...]}`).
    #[arg(long)]
    pub(crate) manifest: PathBuf,
    /// JSON file holding similarity reports; created when absent.
    #[arg(long)]
    pub(crate) reports: PathBuf,
    /// Maximum comparisons in flight.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub(crate) concurrency: u16,
    /// Extra attempts for retryable failures.
    #[arg(long, default_value_t = 2)]
    pub(crate) retries: u32,
    /// Similarity at or above which a pair is flagged.
    #[arg(long, value_parser = parse_threshold_arg, default_value_t = DEFAULT_FLAG_THRESHOLD)]
    pub(crate) threshold: f64,
    /// Rescan only this submission against the rest of the event.
    #[arg(long)]
    pub(crate) submission: Option<String>,
}

#[derive(Args)]
pub(crate) struct FlagsArgs {
    /// JSON file holding similarity reports.
    #[arg(long)]
    pub(crate) reports: PathBuf,
    /// Similarity at or above which a pair is flagged.
    #[arg(long, value_parser = parse_threshold_arg, default_value_t = DEFAULT_FLAG_THRESHOLD)]
    pub(crate) threshold: f64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

fn parse_threshold_arg(input: &str) -> Result<f64, String> {
    parse_threshold("--threshold", input.trim())
        .map_err(|_| format!("threshold must be a number between 0 and 1, got '{input}'"))
}

fn parse_api_key(input: Option<String>) -> Option<String> {
    input
        .map(|raw| raw.trim().to_string())
        .filter(|key| !key.is_empty())
}
