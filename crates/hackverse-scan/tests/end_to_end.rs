//! Comparisons against real `git` and `jscpd`; skipped when either is missing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hackverse_config::{FetchSettings, ParseFailurePolicy, ScanSettings};
use hackverse_scan::{
    ComparisonRequest, ComparisonService, DuplicationScanner, RepositoryFetcher,
    SystemCommandRunner, scores_match,
};
use hackverse_telemetry::Metrics;
use hackverse_test_support::fixtures::{git_available, git_bin, jscpd_available, jscpd_bin};
use hackverse_test_support::repos::LocalRepo;
use hackverse_workspace::WorkspaceManager;

const SHARED_MODULE: &str = r"
export function scoreSubmission(submission, rubric) {
  let total = 0;
  for (const criterion of rubric.criteria) {
    const weight = criterion.weight ?? 1;
    const value = submission.scores[criterion.id] ?? 0;
    total += weight * Math.min(Math.max(value, 0), criterion.max);
  }
  return Math.round((total / rubric.maxTotal) * 10000) / 100;
}

export function rankSubmissions(submissions, rubric) {
  return submissions
    .map((submission) => ({ submission, score: scoreSubmission(submission, rubric) }))
    .sort((left, right) => right.score - left.score)
    .map((entry, index) => ({ ...entry, rank: index + 1 }));
}
";

fn service(root: &std::path::Path) -> Result<ComparisonService> {
    let metrics = Metrics::new()?;
    let runner: Arc<dyn hackverse_scan::CommandRunner> = Arc::new(SystemCommandRunner);
    let fetch = FetchSettings {
        git_bin: git_bin(),
        timeout: Duration::from_secs(60),
        allow_local_repositories: true,
    };
    let scan = ScanSettings {
        jscpd_bin: jscpd_bin(),
        timeout: Duration::from_secs(180),
        min_tokens: 20,
        parse_failure: ParseFailurePolicy::Fail,
    };
    Ok(ComparisonService::from_parts(
        WorkspaceManager::new(root).with_metrics(metrics.clone()),
        RepositoryFetcher::new(Arc::clone(&runner), &fetch),
        DuplicationScanner::new(runner, &scan),
        metrics,
    ))
}

#[tokio::test]
async fn identical_repositories_score_high_and_clean_up() -> Result<()> {
    if !(git_available() && jscpd_available()) {
        eprintln!("skipping identical_repositories_score_high_and_clean_up: git or jscpd missing");
        return Ok(());
    }
    let root = tempfile::Builder::new().prefix("hackverse-e2e-").tempdir()?;
    let repo = LocalRepo::create(&[("src/scoring.js", SHARED_MODULE)])?;
    let service = service(root.path())?;

    let request = ComparisonRequest::from_parts(Some(repo.url()), Some(repo.url()))?;
    let first = service.compare(&request).await?;
    let second = service.compare(&request).await?;

    assert!((0.0..=1.0).contains(&first.score));
    assert!(first.score > 0.5, "self-comparison scored {}", first.score);
    assert!(scores_match(first.score, second.score));
    assert_eq!(first.details["tool"], "jscpd");
    assert!(!first.details.to_string().contains(&root.path().display().to_string()));
    assert_eq!(std::fs::read_dir(root.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn missing_local_repository_is_a_fetch_failure() -> Result<()> {
    if !git_available() {
        eprintln!("skipping missing_local_repository_is_a_fetch_failure: git missing");
        return Ok(());
    }
    let root = tempfile::Builder::new().prefix("hackverse-e2e-").tempdir()?;
    let repo = LocalRepo::create(&[("index.js", "module.exports = 1;\n")])?;
    let service = service(root.path())?;

    let request =
        ComparisonRequest::from_parts(Some(repo.url()), Some("file:///definitely/not/here"))?;
    let err = service
        .compare(&request)
        .await
        .expect_err("missing repository fails");
    assert_eq!(err.stage(), "fetch");
    assert_eq!(std::fs::read_dir(root.path())?.count(), 0);
    Ok(())
}
