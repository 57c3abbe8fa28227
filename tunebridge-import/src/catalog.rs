//! Destination catalog seam
//!
//! The import engine talks to the destination service exclusively through
//! `DestinationCatalog`, an opaque authenticated client handed in by the
//! session collaborator. Tests run the whole pipeline against fake
//! implementations; production uses the reqwest-backed client.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tunebridge_common::{MatchCandidate, RecordKind};

/// Classified failure of one outbound destination call
///
/// This is the per-call classification the Rate-Limited Invoker keys its
/// retry policy on; terminal failures map into `tunebridge_common::Error`.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// Destination signalled a rate limit; retry after the given delay
    /// when the service specified one
    #[error("Rate limited by destination")]
    RateLimited { retry_after: Option<Duration> },

    /// Transient failure (timeout, connection reset, 5xx); retryable
    #[error("Transient call failure: {0}")]
    Transient(String),

    /// Credentials rejected; not retryable, run-fatal
    #[error("Authorization rejected: {0}")]
    Unauthorized(String),

    /// Destination refused the request (malformed, entity not eligible);
    /// not retryable
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Result type for single destination calls
pub type CallResult<T> = std::result::Result<T, CallError>;

/// Operations the import engine needs from the destination catalog
///
/// Every method maps to exactly one outbound API call. Implementations
/// must not retry internally; retry policy lives in the invoker.
#[async_trait]
pub trait DestinationCatalog: Send + Sync {
    /// Search the catalog, returning hits in the destination's own
    /// relevance order, at most `limit` of them
    async fn search(
        &self,
        kind: RecordKind,
        query: &str,
        limit: usize,
    ) -> CallResult<Vec<MatchCandidate>>;

    /// Whether the entity is already in the user's favorites/library
    async fn is_favorite(&self, kind: RecordKind, destination_id: &str) -> CallResult<bool>;

    /// Add the entity to the user's favorites/library
    async fn add_favorite(&self, kind: RecordKind, destination_id: &str) -> CallResult<()>;

    /// Look up a user playlist by exact name
    async fn find_playlist(&self, name: &str) -> CallResult<Option<String>>;

    /// Create a user playlist, returning its destination id
    async fn create_playlist(&self, name: &str) -> CallResult<String>;

    /// Whether the playlist already contains the track
    async fn playlist_contains(&self, playlist_id: &str, track_id: &str) -> CallResult<bool>;

    /// Append the track to the playlist
    async fn add_to_playlist(&self, playlist_id: &str, track_id: &str) -> CallResult<()>;
}
