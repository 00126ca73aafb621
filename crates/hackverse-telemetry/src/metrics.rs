//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters and gauges the comparison pipeline reports.

use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Metrics").finish_non_exhaustive()
    }
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    comparisons_total: IntCounterVec,
    comparison_stage_failures_total: IntCounterVec,
    workspaces_active: IntGauge,
    workspace_cleanup_failures_total: IntCounter,
    comparison_latency_ms: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Comparisons that produced a score.
    pub comparisons_succeeded: u64,
    /// Comparisons that ended in an error.
    pub comparisons_failed: u64,
    /// Workspaces currently allocated.
    pub workspaces_active: i64,
    /// Workspace removals that failed for a reason other than "already gone".
    pub workspace_cleanup_failures_total: u64,
    /// Wall-clock duration of the most recent comparison (ms).
    pub comparison_latency_ms: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )
        .map_err(|source| collector("http_requests_total", source))?;
        let comparisons_total = IntCounterVec::new(
            Opts::new("comparisons_total", "Repository comparisons by outcome"),
            &["outcome"],
        )
        .map_err(|source| collector("comparisons_total", source))?;
        let comparison_stage_failures_total = IntCounterVec::new(
            Opts::new(
                "comparison_stage_failures_total",
                "Comparison failures by pipeline stage",
            ),
            &["stage"],
        )
        .map_err(|source| collector("comparison_stage_failures_total", source))?;
        let workspaces_active = IntGauge::with_opts(Opts::new(
            "workspaces_active",
            "Comparison workspaces currently allocated",
        ))
        .map_err(|source| collector("workspaces_active", source))?;
        let workspace_cleanup_failures_total = IntCounter::with_opts(Opts::new(
            "workspace_cleanup_failures_total",
            "Workspace removals that failed",
        ))
        .map_err(|source| collector("workspace_cleanup_failures_total", source))?;
        let comparison_latency_ms = IntGauge::with_opts(Opts::new(
            "comparison_latency_ms",
            "Duration of the most recent comparison (ms)",
        ))
        .map_err(|source| collector("comparison_latency_ms", source))?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "comparisons_total", &comparisons_total)?;
        register(
            &registry,
            "comparison_stage_failures_total",
            &comparison_stage_failures_total,
        )?;
        register(&registry, "workspaces_active", &workspaces_active)?;
        register(
            &registry,
            "workspace_cleanup_failures_total",
            &workspace_cleanup_failures_total,
        )?;
        register(&registry, "comparison_latency_ms", &comparison_latency_ms)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                comparisons_total,
                comparison_stage_failures_total,
                workspaces_active,
                workspace_cleanup_failures_total,
                comparison_latency_ms,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count a finished comparison by outcome (`success` or `failure`).
    pub fn inc_comparison(&self, outcome: &str) {
        self.inner
            .comparisons_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count a comparison failure attributed to a pipeline stage.
    pub fn inc_stage_failure(&self, stage: &str) {
        self.inner
            .comparison_stage_failures_total
            .with_label_values(&[stage])
            .inc();
    }

    /// Record a newly allocated workspace.
    pub fn workspace_acquired(&self) {
        self.inner.workspaces_active.inc();
    }

    /// Record a workspace leaving scope.
    pub fn workspace_released(&self) {
        self.inner.workspaces_active.dec();
    }

    /// Increment the workspace cleanup failure counter.
    pub fn inc_workspace_cleanup_failure(&self) {
        self.inner.workspace_cleanup_failures_total.inc();
    }

    /// Record the duration of a completed comparison.
    pub fn observe_comparison_latency(&self, duration: Duration) {
        self.inner
            .comparison_latency_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderEncoding { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let outcome = |label: &str| {
            self.inner
                .comparisons_total
                .with_label_values(&[label])
                .get()
        };
        MetricsSnapshot {
            comparisons_succeeded: outcome("success"),
            comparisons_failed: outcome("failure"),
            workspaces_active: self.inner.workspaces_active.get(),
            workspace_cleanup_failures_total: self.inner.workspace_cleanup_failures_total.get(),
            comparison_latency_ms: self.inner.comparison_latency_ms.get(),
        }
    }

    fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

const fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::collector("build", name, source)
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::collector("register", name, source))
}
