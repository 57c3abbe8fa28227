//! Candidate search adapter
//!
//! Builds a destination search query from a snapshot record and fetches
//! ranked candidates through the rate-limited invoker. Query text is
//! cleaned before searching: parenthesized/bracketed qualifiers
//! ("(Live)", "[2011 Remaster]") and featuring-credit noise routinely
//! poison catalog search relevance, and multi-artist credit strings are
//! reduced to the primary artist.

use crate::catalog::DestinationCatalog;
use crate::invoker::RateLimitedInvoker;
use std::sync::Arc;
use tunebridge_common::{MatchCandidate, RecordKind, Result, SnapshotRecord};

/// Default cap on candidates considered per record
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

const NOISE_WORDS: [&str; 6] = ["feat.", "ft.", "featuring", "with", "vs.", "vs"];

pub struct SearchAdapter<C: DestinationCatalog> {
    catalog: Arc<C>,
    invoker: Arc<RateLimitedInvoker>,
    limit: usize,
}

impl<C: DestinationCatalog> SearchAdapter<C> {
    pub fn new(catalog: Arc<C>, invoker: Arc<RateLimitedInvoker>, limit: usize) -> Self {
        Self {
            catalog,
            invoker,
            limit,
        }
    }

    /// Search the destination catalog for candidates matching the record
    ///
    /// One outbound call. Zero hits is an empty Vec, not an error;
    /// call failures surface as classified errors for the session to
    /// record against this record.
    pub async fn search(&self, record: &SnapshotRecord) -> Result<Vec<MatchCandidate>> {
        let query = build_query(record);
        // Playlist rows are matched as tracks; only the playlist entity
        // itself is created by name instead of matched
        let kind = match record.kind {
            RecordKind::Playlist => RecordKind::Track,
            other => other,
        };

        tracing::debug!(
            kind = %kind,
            query = %query,
            source_id = %record.source_id,
            "Searching destination catalog"
        );

        let mut candidates = self
            .invoker
            .invoke("search", || self.catalog.search(kind, &query, self.limit))
            .await?;
        candidates.truncate(self.limit);

        tracing::debug!(
            source_id = %record.source_id,
            candidates = candidates.len(),
            "Search complete"
        );

        Ok(candidates)
    }
}

/// Build the free-text search query for a record
///
/// Title + primary artist, plus album name for track and playlist rows.
/// The destination service does its own relevance ranking; we only clean
/// the terms.
pub fn build_query(record: &SnapshotRecord) -> String {
    let title = clean_search_text(&record.title);
    let artist = extract_primary_artist(&clean_search_text(&record.primary_artist));

    let mut parts: Vec<String> = Vec::with_capacity(3);
    if !title.is_empty() {
        parts.push(title);
    }
    if !artist.is_empty() {
        parts.push(artist);
    }
    if matches!(record.kind, RecordKind::Track | RecordKind::Playlist) {
        if let Some(album) = &record.album {
            let album = clean_search_text(album);
            if !album.is_empty() {
                parts.push(album);
            }
        }
    }

    parts.join(" ")
}

/// Strip parenthesized/bracketed qualifiers and featuring noise
pub fn clean_search_text(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut paren_depth = 0usize;
    let mut bracket_depth = 0usize;

    for ch in text.chars() {
        match ch {
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.saturating_sub(1),
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            _ if paren_depth == 0 && bracket_depth == 0 => stripped.push(ch),
            _ => {}
        }
    }

    stripped
        .split_whitespace()
        .filter(|word| {
            let lowered = word.to_lowercase();
            lowered != "&" && !NOISE_WORDS.contains(&lowered.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the first-credited artist from a possibly multi-artist string
pub fn extract_primary_artist(artist: &str) -> String {
    let mut primary = artist;
    for separator in [",", ";", "&", " and ", " x ", " X "] {
        if let Some(index) = primary.find(separator) {
            primary = &primary[..index];
        }
    }
    primary.trim().to_string()
}
