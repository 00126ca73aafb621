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

//! Pairwise repository similarity.
//!
//! Layout: `command.rs` (subprocess capability), `fetch.rs` (shallow clones),
//! `scanner.rs` (duplication detector and report parsing), `compare.rs`
//! (the end-to-end comparison), `model.rs` (request/result types).

pub mod command;
pub mod compare;
pub mod error;
pub mod fetch;
pub mod model;
pub mod scanner;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use compare::ComparisonService;
pub use error::{
    CommandError, CompareError, CompareResult, FetchError, FetchFailureKind, FetchResult,
    ScanError, ScanResult, ValidationError,
};
pub use fetch::{RepositoryFetcher, validate_repository_url};
pub use model::{ComparisonRequest, ComparisonResult, SCORE_TOLERANCE, Side, scores_match};
pub use scanner::{DuplicationScanner, RawReport, ScanOutcome, parse_score, try_parse_score};
