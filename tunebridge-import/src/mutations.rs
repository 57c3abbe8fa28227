//! Mutation applier
//!
//! Converts a resolved match into an idempotent destination-state change.
//! Existence is always checked before mutating, which is what makes
//! re-running an import on the same snapshot a no-op for already-migrated
//! items. Ambiguous and NotFound results never touch destination state.

use crate::catalog::DestinationCatalog;
use crate::invoker::RateLimitedInvoker;
use std::collections::HashMap;
use std::sync::Arc;
use tunebridge_common::{
    ImportOutcome, MatchCandidate, MatchResult, RecordKind, Result, SnapshotRecord,
};

/// Source playlist name -> destination playlist id, built lazily over one
/// run so each playlist is looked up or created at most once
pub type PlaylistCache = HashMap<String, String>;

pub struct MutationApplier<C: DestinationCatalog> {
    catalog: Arc<C>,
    invoker: Arc<RateLimitedInvoker>,
}

impl<C: DestinationCatalog> MutationApplier<C> {
    pub fn new(catalog: Arc<C>, invoker: Arc<RateLimitedInvoker>) -> Self {
        Self { catalog, invoker }
    }

    /// Apply a resolved match, producing exactly one outcome
    ///
    /// Run-fatal errors (authorization) propagate; every other call
    /// failure is folded into a Failed outcome so the session can move
    /// on to the next record.
    pub async fn apply(
        &self,
        record: SnapshotRecord,
        resolution: MatchResult,
        playlists: &mut PlaylistCache,
    ) -> Result<ImportOutcome> {
        let candidate = match resolution {
            MatchResult::NotFound => {
                tracing::info!(
                    source_id = %record.source_id,
                    label = %record.label(),
                    "No acceptable match, skipping"
                );
                return Ok(ImportOutcome::skipped(
                    record,
                    "not-found: no candidate cleared the acceptance threshold".to_string(),
                ));
            }
            MatchResult::Ambiguous { candidates } => {
                let ids: Vec<&str> = candidates
                    .iter()
                    .map(|c| c.destination_id.as_str())
                    .collect();
                tracing::info!(
                    source_id = %record.source_id,
                    label = %record.label(),
                    contenders = ?ids,
                    "Ambiguous match, skipping for review"
                );
                return Ok(ImportOutcome::skipped(
                    record,
                    format!("ambiguous: near-tied candidates [{}]", ids.join(", ")),
                ));
            }
            MatchResult::Matched { candidate, score } => {
                tracing::debug!(
                    source_id = %record.source_id,
                    destination_id = %candidate.destination_id,
                    score,
                    "Applying matched record"
                );
                candidate
            }
        };

        let attempt = match record.kind {
            RecordKind::Track | RecordKind::Album | RecordKind::Artist => {
                self.apply_favorite(&record, &candidate).await
            }
            RecordKind::Playlist => {
                self.apply_playlist_insert(&record, &candidate, playlists)
                    .await
            }
        };

        match attempt {
            Ok(outcome) => Ok(outcome),
            Err(error) if error.is_run_fatal() => Err(error),
            Err(error) => {
                tracing::warn!(
                    source_id = %record.source_id,
                    label = %record.label(),
                    %error,
                    "Mutation failed"
                );
                Ok(ImportOutcome::failed(record, error.to_string()))
            }
        }
    }

    /// Favorite a matched track/album/artist unless already present
    async fn apply_favorite(
        &self,
        record: &SnapshotRecord,
        candidate: &MatchCandidate,
    ) -> Result<ImportOutcome> {
        let kind = record.kind;
        let id = candidate.destination_id.as_str();

        let present = self
            .invoker
            .invoke("is_favorite", || self.catalog.is_favorite(kind, id))
            .await?;
        if present {
            return Ok(ImportOutcome::already_present(
                record.clone(),
                id.to_string(),
            ));
        }

        self.invoker
            .invoke("add_favorite", || self.catalog.add_favorite(kind, id))
            .await?;
        tracing::info!(
            kind = %kind,
            destination_id = %id,
            label = %record.label(),
            "Favorited"
        );
        Ok(ImportOutcome::imported(record.clone(), id.to_string()))
    }

    /// Insert a matched track into its destination playlist, creating the
    /// playlist on first encounter
    async fn apply_playlist_insert(
        &self,
        record: &SnapshotRecord,
        candidate: &MatchCandidate,
        playlists: &mut PlaylistCache,
    ) -> Result<ImportOutcome> {
        let Some(playlist_name) = record.source_playlist.as_deref() else {
            return Ok(ImportOutcome::skipped(
                record.clone(),
                "playlist row missing source_playlist".to_string(),
            ));
        };

        let playlist_id = match playlists.get(playlist_name) {
            Some(id) => id.clone(),
            None => {
                let id = self.resolve_playlist(playlist_name).await?;
                playlists.insert(playlist_name.to_string(), id.clone());
                id
            }
        };

        let track_id = candidate.destination_id.as_str();
        let present = self
            .invoker
            .invoke("playlist_contains", || {
                self.catalog.playlist_contains(&playlist_id, track_id)
            })
            .await?;
        if present {
            return Ok(ImportOutcome::already_present(
                record.clone(),
                track_id.to_string(),
            ));
        }

        self.invoker
            .invoke("add_to_playlist", || {
                self.catalog.add_to_playlist(&playlist_id, track_id)
            })
            .await?;
        tracing::info!(
            playlist = %playlist_name,
            destination_id = %track_id,
            label = %record.label(),
            "Inserted into playlist"
        );
        Ok(ImportOutcome::imported(record.clone(), track_id.to_string()))
    }

    /// Find the destination playlist by name, creating it if absent
    async fn resolve_playlist(&self, name: &str) -> Result<String> {
        let existing = self
            .invoker
            .invoke("find_playlist", || self.catalog.find_playlist(name))
            .await?;
        if let Some(id) = existing {
            tracing::debug!(playlist = %name, destination_id = %id, "Using existing playlist");
            return Ok(id);
        }

        let id = self
            .invoker
            .invoke("create_playlist", || self.catalog.create_playlist(name))
            .await?;
        tracing::info!(playlist = %name, destination_id = %id, "Created playlist");
        Ok(id)
    }
}
