#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Event-wide similarity runs.
//!
//! The [`BatchOrchestrator`] compares every pair of submissions through a
//! [`PairComparer`] with bounded concurrency and keeps one
//! [`SimilarityReport`] per submission in a [`ReportStore`].

pub mod comparer;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod policy;
pub mod store;

pub use comparer::{ComparisonFailure, LocalComparer, PairComparer, RemoteComparer};
pub use error::{BatchError, BatchResult, StoreError, StoreResult};
pub use model::{
    EventManifest, FlaggedPair, PairFailure, ReportStatus, SimilarityEntry, SimilarityReport,
    Submission, flagged_pairs,
};
pub use orchestrator::{BatchOrchestrator, BatchSummary};
pub use policy::{BatchPolicy, DEFAULT_FLAG_THRESHOLD, FlagPolicy};
pub use store::{JsonFileReportStore, MemoryReportStore, ReportStore};
