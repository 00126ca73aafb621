//! Event-wide scans driven from a manifest file, and review of their reports.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use hackverse_batch::{
    BatchError, BatchOrchestrator, BatchPolicy, BatchSummary, EventManifest, FlagPolicy,
    JsonFileReportStore, RemoteComparer, ReportStore, StoreError, flagged_pairs,
};
use tracing::info;

use crate::cli::{FlagsArgs, OutputFormat, ScanEventArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{render_batch_summary, render_flagged};

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub(crate) async fn handle_scan_event(
    ctx: &AppContext,
    args: &ScanEventArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let summary = run_scan(ctx, args, RETRY_BACKOFF).await?;
    render_batch_summary(&summary, format)
}

pub(crate) async fn handle_flags(args: &FlagsArgs, format: OutputFormat) -> CliResult<()> {
    if !tokio::fs::try_exists(&args.reports).await.unwrap_or(false) {
        return Err(CliError::validation(format!(
            "reports file {} does not exist",
            args.reports.display()
        )));
    }
    let store = JsonFileReportStore::new(&args.reports);
    let reports = store
        .list()
        .await
        .map_err(|err| CliError::failure(anyhow::Error::new(err).context("failed to read reports")))?;
    let pairs = flagged_pairs(&reports, &FlagPolicy::new(args.threshold));
    render_flagged(&pairs, format)
}

async fn run_scan(
    ctx: &AppContext,
    args: &ScanEventArgs,
    retry_backoff: Duration,
) -> CliResult<BatchSummary> {
    let manifest = read_manifest(&args.manifest).await?;
    let comparer = RemoteComparer::with_client(
        ctx.client.clone(),
        ctx.base_url.as_str(),
        ctx.api_key.clone(),
    );
    let policy = BatchPolicy {
        max_concurrency: usize::from(args.concurrency),
        retries: args.retries,
        retry_backoff,
        flag: FlagPolicy::new(args.threshold),
    };
    let orchestrator = BatchOrchestrator::new(
        Arc::new(comparer),
        Arc::new(JsonFileReportStore::new(&args.reports)),
        policy,
    );

    info!(
        event_id = %manifest.event_id,
        submissions = manifest.submissions.len(),
        reports = %args.reports.display(),
        "starting event scan"
    );
    let outcome = match &args.submission {
        Some(target) => {
            orchestrator
                .scan_submission(&manifest.event_id, target, &manifest.submissions)
                .await
        }
        None => {
            orchestrator
                .run_event(&manifest.event_id, &manifest.submissions)
                .await
        }
    };
    outcome.map_err(map_batch_error)
}

async fn read_manifest(path: &std::path::Path) -> CliResult<EventManifest> {
    let payload = tokio::fs::read_to_string(path).await.map_err(|err| {
        CliError::validation(format!("failed to read {}: {err}", path.display()))
    })?;
    serde_json::from_str(&payload).map_err(|err| {
        CliError::validation(format!(
            "{} is not a valid event manifest: {err}",
            path.display()
        ))
    })
}

fn map_batch_error(err: BatchError) -> CliError {
    match err {
        BatchError::DuplicateSubmission { submission_id } => CliError::validation(format!(
            "submission id '{submission_id}' appears more than once in the manifest"
        )),
        BatchError::UnknownSubmission { submission_id } => CliError::validation(format!(
            "submission '{submission_id}' is not part of the manifest"
        )),
        BatchError::Store(StoreError::EventMismatch {
            path,
            stored,
            incoming,
        }) => CliError::validation(format!(
            "reports file {} holds event '{stored}', not '{incoming}'",
            path.display()
        )),
        other @ BatchError::Store(_) => CliError::failure(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hackverse_batch::ReportStatus;
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::json;
    use std::error::Error;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const ALPHA: &str = "https://git.example/alpha.git";
    const BETA: &str = "https://git.example/beta.git";
    const GAMMA: &str = "https://git.example/gamma.git";

    fn context_for(server: &MockServer) -> Result<AppContext, Box<dyn Error>> {
        Ok(AppContext {
            client: Client::new(),
            base_url: server.base_url().parse()?,
            api_key: Some("judge-key".to_string()),
        })
    }

    fn write_manifest(dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
        let path = dir.join("event.json");
        std::fs::write(
            &path,
            serde_json::to_vec(&json!({
                "eventId": "spring-jam",
                "submissions": [
                    { "id": "alpha", "repoUrl": ALPHA },
                    { "id": "beta", "repoUrl": BETA, "title": "Beta" },
                    { "id": "gamma", "repoUrl": GAMMA },
                ]
            }))?,
        )?;
        Ok(path)
    }

    fn scan_args(manifest: PathBuf, reports: PathBuf) -> ScanEventArgs {
        ScanEventArgs {
            manifest,
            reports,
            concurrency: 2,
            retries: 0,
            threshold: 0.85,
            submission: None,
        }
    }

    fn mock_pair(server: &MockServer, repo_a: &str, repo_b: &str, score: f64) {
        let body = json!({ "repoA": repo_a, "repoB": repo_b });
        server.mock(|when, then| {
            when.method(POST)
                .path("/compare")
                .header("authorization", "Bearer judge-key")
                .json_body(body);
            then.status(200)
                .json_body(json!({ "score": score, "details": { "tool": "jscpd" } }));
        });
    }

    #[tokio::test]
    async fn scan_event_persists_reports_and_flags_pairs() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start_async().await;
        mock_pair(&server, ALPHA, BETA, 0.93);
        mock_pair(&server, ALPHA, GAMMA, 0.10);
        mock_pair(&server, BETA, GAMMA, 0.20);
        let dir = TempDir::new()?;
        let reports = dir.path().join("out").join("reports.json");
        let args = scan_args(write_manifest(dir.path())?, reports.clone());

        let summary = run_scan(&context_for(&server)?, &args, Duration::from_millis(1))
            .await
            .map_err(|err| err.display_message())?;
        assert_eq!(summary.event_id, "spring-jam");
        assert_eq!(summary.pairs_attempted, 3);
        assert_eq!(summary.pairs_succeeded, 3);
        assert_eq!(summary.flagged.len(), 1);
        assert_eq!(summary.flagged[0].submission_a, "alpha");
        assert_eq!(summary.flagged[0].submission_b, "beta");

        let stored = JsonFileReportStore::new(&reports).list().await?;
        assert_eq!(stored.len(), 3);
        assert!(
            stored
                .iter()
                .all(|report| report.status == ReportStatus::Completed)
        );

        handle_flags(
            &FlagsArgs {
                reports,
                threshold: 0.15,
            },
            OutputFormat::Json,
        )
        .await
        .map_err(|err| err.display_message())?;
        Ok(())
    }

    #[tokio::test]
    async fn rejected_pairs_mark_reports_failed() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start_async().await;
        mock_pair(&server, ALPHA, BETA, 0.5);
        mock_pair(&server, ALPHA, GAMMA, 0.5);
        server.mock(|when, then| {
            when.method(POST)
                .path("/compare")
                .json_body(json!({ "repoA": BETA, "repoB": GAMMA }));
            then.status(400)
                .json_body(json!({ "message": "Invalid repository URL" }));
        });
        let dir = TempDir::new()?;
        let reports = dir.path().join("reports.json");
        let args = scan_args(write_manifest(dir.path())?, reports.clone());

        let summary = run_scan(&context_for(&server)?, &args, Duration::from_millis(1))
            .await
            .map_err(|err| err.display_message())?;
        assert_eq!(summary.pairs_succeeded, 2);
        assert_eq!(summary.pairs_failed, 1);

        let store = JsonFileReportStore::new(&reports);
        let alpha = store.load("alpha").await?.ok_or("alpha report missing")?;
        let gamma = store.load("gamma").await?.ok_or("gamma report missing")?;
        assert_eq!(alpha.status, ReportStatus::Completed);
        assert_eq!(gamma.status, ReportStatus::Failed);
        assert_eq!(gamma.failures[0].message, "Invalid repository URL");
        Ok(())
    }

    #[tokio::test]
    async fn reports_file_of_another_event_is_a_validation_error() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start_async().await;
        let dir = TempDir::new()?;
        let reports = dir.path().join("reports.json");
        JsonFileReportStore::new(&reports)
            .save(&hackverse_batch::SimilarityReport::pending(
                "alpha",
                Some("autumn-jam"),
            ))
            .await?;

        let err = run_scan(
            &context_for(&server)?,
            &scan_args(write_manifest(dir.path())?, reports.clone()),
            Duration::from_millis(1),
        )
        .await
        .expect_err("mixed events should fail");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("autumn-jam"));

        let stored = JsonFileReportStore::new(&reports).list().await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].event_id.as_deref(), Some("autumn-jam"));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_ids_are_a_validation_error() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start_async().await;
        let dir = TempDir::new()?;
        let manifest = dir.path().join("event.json");
        std::fs::write(
            &manifest,
            serde_json::to_vec(&json!({
                "eventId": "jam",
                "submissions": [
                    { "id": "same", "repoUrl": ALPHA },
                    { "id": "same", "repoUrl": BETA },
                ]
            }))?,
        )?;
        let args = scan_args(manifest, dir.path().join("reports.json"));

        let err = run_scan(&context_for(&server)?, &args, Duration::from_millis(1))
            .await
            .expect_err("duplicate ids should fail");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("same"));
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_manifest_is_a_validation_error() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start_async().await;
        let dir = TempDir::new()?;
        let manifest = dir.path().join("event.json");
        std::fs::write(&manifest, "{ not json")?;

        let err = run_scan(
            &context_for(&server)?,
            &scan_args(manifest, dir.path().join("reports.json")),
            Duration::from_millis(1),
        )
        .await
        .expect_err("bad manifest should fail");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("not a valid event manifest"));

        let missing = run_scan(
            &context_for(&server)?,
            &scan_args(dir.path().join("absent.json"), dir.path().join("reports.json")),
            Duration::from_millis(1),
        )
        .await
        .expect_err("missing manifest should fail");
        assert_eq!(missing.exit_code(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn flags_requires_existing_reports() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let err = handle_flags(
            &FlagsArgs {
                reports: dir.path().join("missing.json"),
                threshold: 0.85,
            },
            OutputFormat::Table,
        )
        .await
        .expect_err("missing reports should fail");
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn single_submission_rescan_targets_one_row() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start_async().await;
        mock_pair(&server, GAMMA, ALPHA, 0.9);
        mock_pair(&server, GAMMA, BETA, 0.3);
        let dir = TempDir::new()?;
        let reports = dir.path().join("reports.json");
        let mut args = scan_args(write_manifest(dir.path())?, reports.clone());
        args.submission = Some("gamma".to_string());

        let summary = run_scan(&context_for(&server)?, &args, Duration::from_millis(1))
            .await
            .map_err(|err| err.display_message())?;
        assert_eq!(summary.pairs_attempted, 2);
        assert_eq!(summary.flagged.len(), 1);

        let alpha = JsonFileReportStore::new(&reports)
            .load("alpha")
            .await?
            .ok_or("mirrored report missing")?;
        assert_eq!(alpha.similarities[0].other_submission_id, "gamma");

        args.submission = Some("nobody".to_string());
        let err = run_scan(&context_for(&server)?, &args, Duration::from_millis(1))
            .await
            .expect_err("unknown target");
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }
}
