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

//! Per-comparison temporary workspaces.
//!
//! A [`WorkspaceManager`] hands out exclusively owned directories under a
//! configured root. Each [`Workspace`] is removed when released explicitly or,
//! failing that, when it is dropped.

pub mod error;
pub mod guard;
pub mod manager;

pub use error::{WorkspaceError, WorkspaceResult};
pub use guard::{ReleaseOutcome, Workspace, release_path};
pub use manager::{DEFAULT_PREFIX, SweepReport, WorkspaceManager};
