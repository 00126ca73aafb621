//! End-to-end comparison of two repositories.
//!
//! Each call moves through `received → fetching → scanning → responded | failed`.
//! Validation happens before a workspace exists; once one does, it is released
//! on every path before the result or error is returned.

use std::sync::Arc;
use std::time::Instant;

use hackverse_config::ServiceConfig;
use hackverse_telemetry::Metrics;
use hackverse_workspace::{Workspace, WorkspaceManager};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::command::CommandRunner;
use crate::error::{CompareError, CompareResult, ValidationError};
use crate::fetch::RepositoryFetcher;
use crate::model::{ComparisonRequest, ComparisonResult, Side};
use crate::scanner::DuplicationScanner;

/// Compares repository pairs inside isolated workspaces.
#[derive(Debug, Clone)]
pub struct ComparisonService {
    workspaces: WorkspaceManager,
    fetcher: RepositoryFetcher,
    scanner: DuplicationScanner,
    metrics: Metrics,
}

impl ComparisonService {
    /// Wire the service from configuration and a command runner.
    #[must_use]
    pub fn new(config: &ServiceConfig, runner: Arc<dyn CommandRunner>, metrics: Metrics) -> Self {
        let workspaces =
            WorkspaceManager::new(&config.workspace.root).with_metrics(metrics.clone());
        Self::from_parts(
            workspaces,
            RepositoryFetcher::new(Arc::clone(&runner), &config.fetch),
            DuplicationScanner::new(runner, &config.scan),
            metrics,
        )
    }

    /// Assemble the service from already-built collaborators.
    #[must_use]
    pub const fn from_parts(
        workspaces: WorkspaceManager,
        fetcher: RepositoryFetcher,
        scanner: DuplicationScanner,
        metrics: Metrics,
    ) -> Self {
        Self {
            workspaces,
            fetcher,
            scanner,
            metrics,
        }
    }

    /// Workspace manager used for allocations.
    #[must_use]
    pub const fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Check both URLs against the fetch policy.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidUrl`] naming the offending field.
    pub fn validate(&self, request: &ComparisonRequest) -> Result<(), ValidationError> {
        for side in [Side::A, Side::B] {
            self.fetcher
                .validate(request.repo(side))
                .map_err(|err| ValidationError::InvalidUrl {
                    field: side.field(),
                    reason: match err {
                        crate::error::FetchError::InvalidUrl { reason } => reason,
                        _ => "rejected",
                    },
                })?;
        }
        Ok(())
    }

    /// Clone both repositories and score their shared code.
    ///
    /// # Errors
    ///
    /// Returns [`CompareError`] describing the first stage that failed.
    pub async fn compare(&self, request: &ComparisonRequest) -> CompareResult<ComparisonResult> {
        let span = info_span!(
            "comparison",
            repo_a = %request.repo_a(),
            repo_b = %request.repo_b(),
        );
        self.compare_inner(request).instrument(span).await
    }

    async fn compare_inner(&self, request: &ComparisonRequest) -> CompareResult<ComparisonResult> {
        let started = Instant::now();
        info!(stage = "received", "comparison received");

        if let Err(err) = self.validate(request) {
            let err = CompareError::from(err);
            self.record_failure(&err);
            return Err(err);
        }

        let workspace = match self.workspaces.acquire().await {
            Ok(workspace) => workspace,
            Err(source) => {
                let err = CompareError::Workspace { source };
                warn!(stage = "failed", error = %err, "workspace allocation failed");
                self.record_failure(&err);
                return Err(err);
            }
        };

        let outcome = self.run_in(&workspace, request).await;
        let path = workspace.path().to_path_buf();
        if let Err(err) = workspace.release().await {
            warn!(path = %path.display(), error = %err, "workspace release failed");
        }

        match outcome {
            Ok(result) => {
                let elapsed = started.elapsed();
                self.metrics.inc_comparison("success");
                self.metrics.observe_comparison_latency(elapsed);
                info!(
                    stage = "responded",
                    score = result.score,
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "comparison finished"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(
                    stage = "failed",
                    failed_stage = err.stage(),
                    error = %err,
                    "comparison failed"
                );
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        request: &ComparisonRequest,
    ) -> CompareResult<ComparisonResult> {
        info!(stage = "fetching", workspace = %workspace.path().display(), "fetching repositories");
        let fetch = |side: Side| {
            let destination = workspace.join(side.directory());
            async move {
                self.fetcher
                    .fetch(request.repo(side), &destination)
                    .await
                    .map_err(|source| CompareError::Fetch { side, source })
            }
        };
        tokio::try_join!(fetch(Side::A), fetch(Side::B))?;

        info!(stage = "scanning", "scanning for duplication");
        let outcome = self
            .scanner
            .scan(workspace.path(), Side::A.directory(), Side::B.directory())
            .await
            .map_err(|source| CompareError::Scan { source })?;
        if outcome.is_degraded() {
            debug!(details = %outcome.details["error"], "scan degraded to zero");
        }

        Ok(ComparisonResult {
            score: outcome.score,
            details: outcome.details,
        })
    }

    fn record_failure(&self, err: &CompareError) {
        self.metrics.inc_comparison("failure");
        self.metrics.inc_stage_failure(err.stage());
    }
}
