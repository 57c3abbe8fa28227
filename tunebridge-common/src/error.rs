//! Common error types for tunebridge

use thiserror::Error;

/// Common result type for tunebridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the tunebridge crates
///
/// Only `MalformedRecord` and `Authorization` are run-fatal. Every other
/// variant describes a single-record failure that the import session
/// records and moves past.
#[derive(Error, Debug)]
pub enum Error {
    /// Snapshot row failed to parse; aborts loading that file
    #[error("Malformed snapshot record at row {row}, column '{column}': {message}")]
    MalformedRecord {
        /// 1-based data row number (header row not counted)
        row: usize,
        /// Column name that failed
        column: String,
        /// What was wrong with the value
        message: String,
    },

    /// Credentials invalid or expired; no further calls can succeed
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Retry budget exhausted on a rate-limited call
    #[error("Rate limit retry budget exhausted: {0}")]
    RateLimitExceeded(String),

    /// Retry budget exhausted on a transiently failing call
    #[error("Transient call failure persisted: {0}")]
    TransientCallFailed(String),

    /// Destination refused the mutation (entity not eligible, etc.)
    #[error("Mutation rejected by destination: {0}")]
    MutationRejected(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must abort the whole import run
    ///
    /// Per-record failures are isolated; only authorization and
    /// snapshot-load failures stop processing.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Error::Authorization(_) | Error::MalformedRecord { .. } | Error::Config(_)
        )
    }
}
