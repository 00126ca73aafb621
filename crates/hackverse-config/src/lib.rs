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

//! Immutable configuration for the HackVerse similarity service.
//!
//! Layout: `model.rs` (typed settings), `loader.rs` (environment lookup),
//! `validate.rs` (field parsers), `defaults.rs` (documented defaults).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    FetchSettings, LoggingSettings, ParseFailurePolicy, ReviewSettings, ScanSettings,
    ServiceConfig, WorkspaceSettings,
};
