//! Event-wide fan-out of pairwise comparisons.
//!
//! # Design
//! - Comparisons run on spawned tasks bounded by a semaphore; results are
//!   folded into reports on the calling task only, so reports need no locks.
//! - Both reports of a pair are persisted as soon as the pair resolves.
//! - A pair whose task dies without reporting is recorded as a failure.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::comparer::{ComparisonFailure, PairComparer};
use crate::error::{BatchError, BatchResult};
use crate::model::{
    FlaggedPair, ReportStatus, SimilarityEntry, SimilarityReport, Submission, flagged_pairs,
};
use crate::policy::BatchPolicy;
use crate::store::ReportStore;

const MISSING_REPOSITORY: &str = "submission has no repository URL";
const INCOMPLETE_COMPARISON: &str = "comparison did not complete";

/// Outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Event the run belonged to.
    pub event_id: String,
    /// Number of submissions considered.
    pub submissions: usize,
    /// Pairs handed to the comparer.
    pub pairs_attempted: usize,
    /// Pairs that produced a score.
    pub pairs_succeeded: usize,
    /// Pairs that failed after retries.
    pub pairs_failed: usize,
    /// Pairs at or above the flag threshold, highest first.
    pub flagged: Vec<FlaggedPair>,
}

#[derive(Debug, Clone)]
struct PairJob {
    left_id: String,
    left_url: String,
    right_id: String,
    right_url: String,
}

impl PairJob {
    fn key(&self) -> (String, String) {
        (self.left_id.clone(), self.right_id.clone())
    }
}

type PairOutcome = (PairJob, Result<f64, ComparisonFailure>);

/// Outcome of a targeted scan as seen from the other submission's report.
enum PeerUpdate<'a> {
    Scored(SimilarityEntry),
    Failed { other_id: &'a str, message: String },
}

/// Runs pairwise comparisons for an event and maintains its reports.
#[derive(Clone)]
pub struct BatchOrchestrator {
    comparer: Arc<dyn PairComparer>,
    store: Arc<dyn ReportStore>,
    policy: BatchPolicy,
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BatchOrchestrator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl BatchOrchestrator {
    /// Orchestrator over the given comparer and store.
    #[must_use]
    pub fn new(
        comparer: Arc<dyn PairComparer>,
        store: Arc<dyn ReportStore>,
        policy: BatchPolicy,
    ) -> Self {
        Self {
            comparer,
            store,
            policy,
        }
    }

    /// Policy applied to every run.
    #[must_use]
    pub const fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    /// Compare every pair of `submissions` and replace all of their reports.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::DuplicateSubmission`] before any work starts when
    /// ids repeat, and [`BatchError::Store`] when a report cannot be persisted.
    /// Individual comparison failures are recorded on the reports instead.
    pub async fn run_event(
        &self,
        event_id: &str,
        submissions: &[Submission],
    ) -> BatchResult<BatchSummary> {
        ensure_unique(submissions)?;
        let span = info_span!("batch_run", event_id, submissions = submissions.len());
        self.run_event_inner(event_id, submissions)
            .instrument(span)
            .await
    }

    async fn run_event_inner(
        &self,
        event_id: &str,
        submissions: &[Submission],
    ) -> BatchResult<BatchSummary> {
        let mut reports: BTreeMap<String, SimilarityReport> = BTreeMap::new();
        for submission in submissions {
            let mut report = SimilarityReport::pending(&submission.id, Some(event_id));
            if submission.repository().is_none() {
                report.record_failure(None, MISSING_REPOSITORY);
                report.finish(true);
            }
            self.store.save(&report).await?;
            reports.insert(submission.id.clone(), report);
        }

        let comparable: Vec<(&str, &str)> = submissions
            .iter()
            .filter_map(|submission| {
                submission
                    .repository()
                    .map(|url| (submission.id.as_str(), url))
            })
            .collect();
        let mut jobs = Vec::new();
        for (index, (left_id, left_url)) in comparable.iter().enumerate() {
            for (right_id, right_url) in &comparable[index + 1..] {
                jobs.push(PairJob {
                    left_id: (*left_id).to_string(),
                    left_url: (*left_url).to_string(),
                    right_id: (*right_id).to_string(),
                    right_url: (*right_url).to_string(),
                });
            }
        }
        info!(pairs = jobs.len(), "batch run started");

        let pairs_attempted = jobs.len();
        let mut outstanding: BTreeSet<(String, String)> = jobs.iter().map(PairJob::key).collect();
        let mut pairs_succeeded = 0;
        let mut pairs_failed = 0;
        let mut tasks = self.spawn_pairs(jobs);

        while let Some(joined) = tasks.join_next().await {
            let (job, outcome) = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, "comparison task ended without a result");
                    continue;
                }
            };
            outstanding.remove(&job.key());
            match outcome {
                Ok(similarity) => {
                    pairs_succeeded += 1;
                    let flagged = self.policy.flag.is_flagged(similarity);
                    if let Some(report) = reports.get_mut(&job.left_id) {
                        report.upsert_similarity(entry(&job.right_id, similarity, flagged));
                    }
                    if let Some(report) = reports.get_mut(&job.right_id) {
                        report.upsert_similarity(entry(&job.left_id, similarity, flagged));
                    }
                }
                Err(failure) => {
                    pairs_failed += 1;
                    warn!(
                        left = %job.left_id,
                        right = %job.right_id,
                        message = %failure.message,
                        "pair comparison failed"
                    );
                    if let Some(report) = reports.get_mut(&job.left_id) {
                        report.record_failure(Some(&job.right_id), failure.message.clone());
                    }
                    if let Some(report) = reports.get_mut(&job.right_id) {
                        report.record_failure(Some(&job.left_id), failure.message);
                    }
                }
            }
            self.save_pair(&reports, &job.left_id, &job.right_id).await?;
        }

        for (left_id, right_id) in outstanding {
            pairs_failed += 1;
            if let Some(report) = reports.get_mut(&left_id) {
                report.record_failure(Some(&right_id), INCOMPLETE_COMPARISON);
            }
            if let Some(report) = reports.get_mut(&right_id) {
                report.record_failure(Some(&left_id), INCOMPLETE_COMPARISON);
            }
        }

        for report in reports.values_mut() {
            if report.status == ReportStatus::Pending {
                report.finish(!report.failures.is_empty());
            }
            self.store.save(report).await?;
        }

        let finished: Vec<SimilarityReport> = reports.into_values().collect();
        let summary = BatchSummary {
            event_id: event_id.to_string(),
            submissions: submissions.len(),
            pairs_attempted,
            pairs_succeeded,
            pairs_failed,
            flagged: flagged_pairs(&finished, &self.policy.flag),
        };
        info!(
            pairs_succeeded,
            pairs_failed,
            flagged = summary.flagged.len(),
            "batch run finished"
        );
        Ok(summary)
    }

    /// Compare `target_id` against every other submission.
    ///
    /// The target's report is replaced; every other report gains or refreshes
    /// the mirrored entry for each successful pair.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::UnknownSubmission`] when `target_id` is not among
    /// `submissions`, [`BatchError::DuplicateSubmission`] when ids repeat, and
    /// [`BatchError::Store`] when a report cannot be persisted.
    pub async fn scan_submission(
        &self,
        event_id: &str,
        target_id: &str,
        submissions: &[Submission],
    ) -> BatchResult<BatchSummary> {
        ensure_unique(submissions)?;
        let target = submissions
            .iter()
            .find(|submission| submission.id == target_id)
            .ok_or_else(|| BatchError::UnknownSubmission {
                submission_id: target_id.to_string(),
            })?;
        let span = info_span!("submission_scan", event_id, target_id);
        self.scan_submission_inner(event_id, target, submissions)
            .instrument(span)
            .await
    }

    async fn scan_submission_inner(
        &self,
        event_id: &str,
        target: &Submission,
        submissions: &[Submission],
    ) -> BatchResult<BatchSummary> {
        let mut report = SimilarityReport::pending(&target.id, Some(event_id));
        let Some(target_url) = target.repository() else {
            report.record_failure(None, MISSING_REPOSITORY);
            report.finish(true);
            self.store.save(&report).await?;
            return Ok(BatchSummary {
                event_id: event_id.to_string(),
                submissions: submissions.len(),
                pairs_attempted: 0,
                pairs_succeeded: 0,
                pairs_failed: 0,
                flagged: Vec::new(),
            });
        };
        self.store.save(&report).await?;

        let jobs: Vec<PairJob> = submissions
            .iter()
            .filter(|other| other.id != target.id)
            .filter_map(|other| {
                other.repository().map(|url| PairJob {
                    left_id: target.id.clone(),
                    left_url: target_url.to_string(),
                    right_id: other.id.clone(),
                    right_url: url.to_string(),
                })
            })
            .collect();

        let pairs_attempted = jobs.len();
        let mut outstanding: BTreeSet<(String, String)> = jobs.iter().map(PairJob::key).collect();
        let mut pairs_succeeded = 0;
        let mut pairs_failed = 0;
        let mut tasks = self.spawn_pairs(jobs);

        while let Some(joined) = tasks.join_next().await {
            let (job, outcome) = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, "comparison task ended without a result");
                    continue;
                }
            };
            outstanding.remove(&job.key());
            match outcome {
                Ok(similarity) => {
                    pairs_succeeded += 1;
                    let flagged = self.policy.flag.is_flagged(similarity);
                    report.upsert_similarity(entry(&job.right_id, similarity, flagged));
                    self.store.save(&report).await?;
                    self.mirror(
                        event_id,
                        &job.right_id,
                        PeerUpdate::Scored(entry(&job.left_id, similarity, flagged)),
                    )
                    .await?;
                }
                Err(failure) => {
                    pairs_failed += 1;
                    warn!(other = %job.right_id, message = %failure.message, "pair comparison failed");
                    report.record_failure(Some(&job.right_id), failure.message.clone());
                    self.store.save(&report).await?;
                    self.mirror(
                        event_id,
                        &job.right_id,
                        PeerUpdate::Failed {
                            other_id: &job.left_id,
                            message: failure.message,
                        },
                    )
                    .await?;
                }
            }
        }

        for (_, right_id) in outstanding {
            pairs_failed += 1;
            report.record_failure(Some(&right_id), INCOMPLETE_COMPARISON);
            self.mirror(
                event_id,
                &right_id,
                PeerUpdate::Failed {
                    other_id: &target.id,
                    message: INCOMPLETE_COMPARISON.to_string(),
                },
            )
            .await?;
        }
        report.finish(!report.failures.is_empty());
        self.store.save(&report).await?;

        let flagged = flagged_pairs(std::slice::from_ref(&report), &self.policy.flag);
        Ok(BatchSummary {
            event_id: event_id.to_string(),
            submissions: submissions.len(),
            pairs_attempted,
            pairs_succeeded,
            pairs_failed,
            flagged,
        })
    }

    /// Apply a single-target outcome to the peer's report.
    ///
    /// A peer report that did not exist yet stays pending: it only holds the
    /// one pair, not a full scan of that submission.
    async fn mirror(
        &self,
        event_id: &str,
        submission_id: &str,
        update: PeerUpdate<'_>,
    ) -> BatchResult<()> {
        let (mut other, settled) = match self.store.load(submission_id).await? {
            Some(existing) => {
                let settled = existing.status != ReportStatus::Pending;
                (existing, settled)
            }
            None => (SimilarityReport::pending(submission_id, Some(event_id)), false),
        };
        match update {
            PeerUpdate::Scored(mirrored) => other.upsert_similarity(mirrored),
            PeerUpdate::Failed { other_id, message } => {
                other.record_failure(Some(other_id), message);
            }
        }
        if settled {
            other.finish(!other.failures.is_empty());
        } else {
            other.sort_similarities();
        }
        self.store.save(&other).await?;
        Ok(())
    }

    async fn save_pair(
        &self,
        reports: &BTreeMap<String, SimilarityReport>,
        left_id: &str,
        right_id: &str,
    ) -> BatchResult<()> {
        for id in [left_id, right_id] {
            if let Some(report) = reports.get(id) {
                self.store.save(report).await?;
            }
        }
        Ok(())
    }

    fn spawn_pairs(&self, jobs: Vec<PairJob>) -> JoinSet<PairOutcome> {
        let permits = Arc::new(Semaphore::new(self.policy.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for job in jobs {
            let permits = Arc::clone(&permits);
            let comparer = Arc::clone(&self.comparer);
            let policy = self.policy;
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (job, Err(ComparisonFailure::permanent(INCOMPLETE_COMPARISON)));
                };
                let outcome =
                    compare_with_retry(comparer.as_ref(), &policy, &job.left_url, &job.right_url)
                        .await;
                (job, outcome)
            });
        }
        tasks
    }
}

async fn compare_with_retry(
    comparer: &dyn PairComparer,
    policy: &BatchPolicy,
    repo_a: &str,
    repo_b: &str,
) -> Result<f64, ComparisonFailure> {
    let mut attempt = 0;
    loop {
        match comparer.compare(repo_a, repo_b).await {
            Ok(score) if score.is_finite() => return Ok(score.clamp(0.0, 1.0)),
            Ok(score) => {
                return Err(ComparisonFailure::permanent(format!(
                    "comparison returned a non-finite score ({score})"
                )));
            }
            Err(failure) if failure.retryable && attempt < policy.retries => {
                attempt += 1;
                let delay = policy.backoff_for(attempt);
                debug!(attempt, ?delay, message = %failure.message, "retrying comparison");
                tokio::time::sleep(delay).await;
            }
            Err(failure) => return Err(failure),
        }
    }
}

fn entry(other: &str, similarity: f64, flagged: bool) -> SimilarityEntry {
    SimilarityEntry {
        other_submission_id: other.to_string(),
        similarity,
        flagged,
    }
}

fn ensure_unique(submissions: &[Submission]) -> BatchResult<()> {
    let mut seen = HashSet::new();
    for submission in submissions {
        if !seen.insert(submission.id.as_str()) {
            return Err(BatchError::DuplicateSubmission {
                submission_id: submission.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FlagPolicy;
    use crate::store::MemoryReportStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scores from a table keyed by the unordered URL pair.
    #[derive(Default)]
    struct TableComparer {
        scores: HashMap<(String, String), Result<f64, ComparisonFailure>>,
        calls: Mutex<Vec<(String, String)>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl TableComparer {
        fn with(mut self, a: &str, b: &str, outcome: Result<f64, ComparisonFailure>) -> Self {
            self.scores.insert(ordered(a, b), outcome);
            self
        }

        fn calls(&self) -> usize {
            self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
        }
    }

    fn ordered(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    #[async_trait]
    impl PairComparer for TableComparer {
        async fn compare(&self, repo_a: &str, repo_b: &str) -> Result<f64, ComparisonFailure> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((repo_a.to_string(), repo_b.to_string()));
            }
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.scores
                .get(&ordered(repo_a, repo_b))
                .cloned()
                .unwrap_or(Ok(0.0))
        }
    }

    /// Fails with a retryable error a fixed number of times, then succeeds.
    struct FlakyComparer {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PairComparer for FlakyComparer {
        async fn compare(&self, _: &str, _: &str) -> Result<f64, ComparisonFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(ComparisonFailure::retryable("comparison service unreachable"));
            }
            Ok(0.3)
        }
    }

    fn fast_policy() -> BatchPolicy {
        BatchPolicy {
            retry_backoff: Duration::from_millis(1),
            ..BatchPolicy::default()
        }
    }

    fn submissions() -> Vec<Submission> {
        vec![
            Submission::new("a", "https://git.example/a.git"),
            Submission::new("b", "https://git.example/b.git"),
            Submission::new("c", "https://git.example/c.git"),
        ]
    }

    fn orchestrator(
        comparer: Arc<dyn PairComparer>,
        store: Arc<MemoryReportStore>,
        policy: BatchPolicy,
    ) -> BatchOrchestrator {
        BatchOrchestrator::new(comparer, store, policy)
    }

    #[tokio::test]
    async fn run_event_flags_only_pairs_over_threshold() -> BatchResult<()> {
        let comparer = Arc::new(
            TableComparer::default()
                .with("https://git.example/a.git", "https://git.example/b.git", Ok(0.92))
                .with("https://git.example/a.git", "https://git.example/c.git", Ok(0.10))
                .with("https://git.example/b.git", "https://git.example/c.git", Ok(0.40)),
        );
        let store = Arc::new(MemoryReportStore::new());
        let summary = orchestrator(comparer.clone(), store.clone(), fast_policy())
            .run_event("hack-1", &submissions())
            .await?;

        assert_eq!(summary.pairs_attempted, 3);
        assert_eq!(summary.pairs_succeeded, 3);
        assert_eq!(summary.pairs_failed, 0);
        assert_eq!(comparer.calls(), 3);
        assert_eq!(summary.flagged.len(), 1);
        assert_eq!(summary.flagged[0].submission_a, "a");
        assert_eq!(summary.flagged[0].submission_b, "b");

        let a = store.load("a").await?.ok_or(BatchError::UnknownSubmission {
            submission_id: "a".to_string(),
        })?;
        assert_eq!(a.status, ReportStatus::Completed);
        assert_eq!(a.event_id.as_deref(), Some("hack-1"));
        let order: Vec<_> = a
            .similarities
            .iter()
            .map(|entry| (entry.other_submission_id.as_str(), entry.flagged))
            .collect();
        assert_eq!(order, [("b", true), ("c", false)]);
        Ok(())
    }

    #[tokio::test]
    async fn in_flight_comparisons_respect_concurrency_bound() -> BatchResult<()> {
        let comparer = Arc::new(TableComparer {
            delay: Duration::from_millis(20),
            ..TableComparer::default()
        });
        let subs: Vec<Submission> = (0..6)
            .map(|index| Submission::new(format!("s{index}"), format!("https://git.example/{index}.git")))
            .collect();
        let policy = BatchPolicy {
            max_concurrency: 2,
            ..fast_policy()
        };
        let summary = orchestrator(comparer.clone(), Arc::new(MemoryReportStore::new()), policy)
            .run_event("hack-2", &subs)
            .await?;

        assert_eq!(summary.pairs_attempted, 15);
        assert_eq!(comparer.calls(), 15);
        assert!(comparer.peak.load(Ordering::SeqCst) <= 2);
        Ok(())
    }

    #[tokio::test]
    async fn retryable_failures_are_retried() -> BatchResult<()> {
        let comparer = Arc::new(FlakyComparer {
            failures_left: AtomicUsize::new(2),
            calls: AtomicUsize::new(0),
        });
        let subs = &submissions()[..2];
        let summary = orchestrator(comparer.clone(), Arc::new(MemoryReportStore::new()), fast_policy())
            .run_event("hack-3", subs)
            .await?;

        assert_eq!(summary.pairs_succeeded, 1);
        assert_eq!(comparer.calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_retries_fail_both_reports() -> BatchResult<()> {
        let comparer = Arc::new(FlakyComparer {
            failures_left: AtomicUsize::new(10),
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryReportStore::new());
        let policy = BatchPolicy {
            retries: 1,
            ..fast_policy()
        };
        let summary = orchestrator(comparer.clone(), store.clone(), policy)
            .run_event("hack-4", &submissions()[..2])
            .await?;

        assert_eq!(summary.pairs_failed, 1);
        assert_eq!(comparer.calls.load(Ordering::SeqCst), 2);
        for id in ["a", "b"] {
            let report = store.load(id).await?;
            assert_eq!(report.map(|report| report.status), Some(ReportStatus::Failed));
        }
        Ok(())
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() -> BatchResult<()> {
        let comparer = Arc::new(TableComparer::default().with(
            "https://git.example/a.git",
            "https://git.example/b.git",
            Err(ComparisonFailure::permanent("failed to fetch repoA: repository not found or unreachable")),
        ));
        let store = Arc::new(MemoryReportStore::new());
        let summary = orchestrator(comparer.clone(), store.clone(), fast_policy())
            .run_event("hack-5", &submissions())
            .await?;

        assert_eq!(comparer.calls(), 3);
        assert_eq!(summary.pairs_failed, 1);
        let c = store.load("c").await?;
        assert_eq!(c.map(|report| report.status), Some(ReportStatus::Completed));
        let a = store.load("a").await?.map(|report| report.failures);
        assert_eq!(a.map(|failures| failures.len()), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn submissions_without_repository_fail_without_comparisons() -> BatchResult<()> {
        let comparer = Arc::new(TableComparer::default());
        let store = Arc::new(MemoryReportStore::new());
        let mut subs = submissions();
        subs[2].repo_url = None;
        let summary = orchestrator(comparer.clone(), store.clone(), fast_policy())
            .run_event("hack-6", &subs)
            .await?;

        assert_eq!(summary.pairs_attempted, 1);
        let c = store.load("c").await?;
        assert_eq!(c.as_ref().map(|report| report.status), Some(ReportStatus::Failed));
        assert_eq!(
            c.and_then(|report| report.failures.first().map(|failure| failure.message.clone())),
            Some(MISSING_REPOSITORY.to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected_before_any_work() {
        let comparer = Arc::new(TableComparer::default());
        let store = Arc::new(MemoryReportStore::new());
        let mut subs = submissions();
        subs[1].id = "a".to_string();
        let err = orchestrator(comparer.clone(), store.clone(), fast_policy())
            .run_event("hack-7", &subs)
            .await
            .expect_err("duplicate ids");

        assert!(matches!(err, BatchError::DuplicateSubmission { ref submission_id } if submission_id == "a"));
        assert_eq!(comparer.calls(), 0);
        assert!(store.list().await.map(|reports| reports.is_empty()).unwrap_or(false));
    }

    #[tokio::test]
    async fn rerun_replaces_previous_reports() -> BatchResult<()> {
        let store = Arc::new(MemoryReportStore::new());
        let first = Arc::new(TableComparer::default().with(
            "https://git.example/a.git",
            "https://git.example/b.git",
            Ok(0.9),
        ));
        orchestrator(first, store.clone(), fast_policy())
            .run_event("hack-8", &submissions()[..2])
            .await?;

        let second = Arc::new(TableComparer::default().with(
            "https://git.example/a.git",
            "https://git.example/b.git",
            Ok(0.2),
        ));
        let summary = orchestrator(second, store.clone(), fast_policy())
            .run_event("hack-8", &submissions()[..2])
            .await?;

        assert!(summary.flagged.is_empty());
        let a = store.load("a").await?.map(|report| report.similarities);
        assert_eq!(a.map(|entries| entries.len()), Some(1));
        let flagged = flagged_pairs(&store.list().await?, &FlagPolicy::default());
        assert!(flagged.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn scan_submission_updates_target_and_mirrors() -> BatchResult<()> {
        let comparer = Arc::new(
            TableComparer::default()
                .with("https://git.example/a.git", "https://git.example/b.git", Ok(0.3))
                .with("https://git.example/a.git", "https://git.example/c.git", Ok(0.3))
                .with("https://git.example/b.git", "https://git.example/c.git", Ok(0.3)),
        );
        let store = Arc::new(MemoryReportStore::new());
        let runner = orchestrator(comparer, store.clone(), fast_policy());
        runner.run_event("hack-9", &submissions()).await?;

        let rescan = Arc::new(TableComparer::default().with(
            "https://git.example/c.git",
            "https://git.example/a.git",
            Ok(0.97),
        ));
        let summary = orchestrator(rescan.clone(), store.clone(), fast_policy())
            .scan_submission("hack-9", "c", &submissions())
            .await?;

        assert_eq!(rescan.calls(), 2);
        assert_eq!(summary.pairs_attempted, 2);
        assert_eq!(summary.flagged.len(), 1);

        let a = store.load("a").await?.map(|report| report.similarities);
        let mirrored = a
            .as_ref()
            .and_then(|entries| entries.iter().find(|entry| entry.other_submission_id == "c"))
            .map(|entry| (entry.similarity, entry.flagged));
        assert_eq!(mirrored, Some((0.97, true)));
        assert_eq!(a.map(|entries| entries.len()), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn scan_submission_failure_clears_peer_score() -> BatchResult<()> {
        let comparer = Arc::new(
            TableComparer::default()
                .with("https://git.example/a.git", "https://git.example/b.git", Ok(0.97))
                .with("https://git.example/a.git", "https://git.example/c.git", Ok(0.2))
                .with("https://git.example/b.git", "https://git.example/c.git", Ok(0.2)),
        );
        let store = Arc::new(MemoryReportStore::new());
        orchestrator(comparer, store.clone(), fast_policy())
            .run_event("hack-11", &submissions())
            .await?;

        let rescan = Arc::new(
            TableComparer::default()
                .with(
                    "https://git.example/a.git",
                    "https://git.example/b.git",
                    Err(ComparisonFailure::permanent("repository unavailable")),
                )
                .with("https://git.example/a.git", "https://git.example/c.git", Ok(0.2)),
        );
        let summary = orchestrator(rescan, store.clone(), fast_policy())
            .scan_submission("hack-11", "a", &submissions())
            .await?;
        assert_eq!(summary.pairs_failed, 1);
        assert!(summary.flagged.is_empty());

        let b = store.load("b").await?.ok_or(BatchError::UnknownSubmission {
            submission_id: "b".to_string(),
        })?;
        assert_eq!(b.status, ReportStatus::Failed);
        assert!(b.similarities.iter().all(|entry| entry.other_submission_id != "a"));
        let failed_against: Vec<_> = b
            .failures
            .iter()
            .filter_map(|failure| failure.other_submission_id.as_deref())
            .collect();
        assert_eq!(failed_against, ["a"]);

        let reports = store.list().await?;
        assert!(flagged_pairs(&reports, &fast_policy().flag).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn scan_submission_leaves_unscanned_peers_pending() -> BatchResult<()> {
        let comparer = Arc::new(TableComparer::default().with(
            "https://git.example/a.git",
            "https://git.example/b.git",
            Ok(0.5),
        ));
        let store = Arc::new(MemoryReportStore::new());
        orchestrator(comparer, store.clone(), fast_policy())
            .scan_submission("hack-12", "a", &submissions())
            .await?;

        let a = store.load("a").await?.map(|report| report.status);
        assert_eq!(a, Some(ReportStatus::Completed));
        for peer in ["b", "c"] {
            let report = store.load(peer).await?.ok_or(BatchError::UnknownSubmission {
                submission_id: peer.to_string(),
            })?;
            assert_eq!(report.status, ReportStatus::Pending);
            assert_eq!(report.similarities.len(), 1);
        }
        Ok(())
    }

    #[tokio::test]
    async fn scan_submission_rejects_unknown_target() {
        let runner = orchestrator(
            Arc::new(TableComparer::default()),
            Arc::new(MemoryReportStore::new()),
            fast_policy(),
        );
        let err = runner
            .scan_submission("hack-10", "zzz", &submissions())
            .await
            .expect_err("unknown target");
        assert!(matches!(err, BatchError::UnknownSubmission { .. }));
    }
}
