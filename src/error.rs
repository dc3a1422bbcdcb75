//! Error types for the bot engine.
//!
//! The taxonomy mirrors how failures are recovered:
//! - [`ConnectionError`] is retried by the reconnect supervisor, never fatal.
//! - [`ProtocolError`] ends the current connection, which is then re-established.
//! - [`HandlerError`] is caught at the dispatch loop and reported at most once
//!   per distinct failure signature.

use std::io;

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors raised while framing or moving lines over an open connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Outbound line exceeded the maximum allowed length.
    #[error("line too long: {actual} bytes (limit {limit})")]
    LineTooLong {
        /// Length of the offending line.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },
}

/// Failure to establish a connection to the server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    /// Host name resolution failed outright.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Resolution succeeded but yielded no candidate addresses.
    #[error("no addresses found for {host}:{port}")]
    NoAddresses { host: String, port: u16 },

    /// Every resolved address refused the connection.
    #[error("unable to connect to {host}:{port}: {last}")]
    Refused {
        host: String,
        port: u16,
        /// Error from the last candidate that was tried.
        last: io::Error,
    },

    /// TLS configuration or handshake failure.
    #[error("tls error for {host}: {reason}")]
    Tls { host: String, reason: String },

    /// TLS was requested but the crate was built without the `tls` feature.
    #[error("tls support is not compiled in")]
    TlsUnavailable,
}

/// Failure raised by a command predicate or handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandlerError {
    /// The handler could not complete its work.
    #[error("{0}")]
    Failed(String),

    /// The handler panicked; the payload message is preserved.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}
