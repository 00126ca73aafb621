//! Errors raised while hosting the HTTP server.
//!
//! Request-level failures never surface here; they are rendered as JSON
//! responses by the handlers.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result alias for server lifecycle operations.
pub type ApiServerResult<T> = Result<T, ApiServerError>;

/// Failures while binding or running the listener.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// The listen address could not be bound.
    #[error("failed to bind http listener")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The server loop terminated with an error.
    #[error("http server terminated unexpectedly")]
    Serve {
        /// Underlying IO error.
        source: io::Error,
    },
}
