//! Import session
//!
//! Drives the full pipeline over an ordered snapshot: search -> resolve
//! -> apply, one record at a time, in snapshot order. Per-record failures
//! are isolated; only authorization failures abort the run. The session
//! exclusively owns the playlist-mapping cache and the outcome sequence
//! for the lifetime of one run.

use crate::catalog::DestinationCatalog;
use crate::invoker::RateLimitedInvoker;
use crate::matcher::MatchEngine;
use crate::mutations::{MutationApplier, PlaylistCache};
use crate::outcome_log::OutcomeSink;
use crate::search::{SearchAdapter, DEFAULT_SEARCH_LIMIT};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tunebridge_common::config::Config;
use tunebridge_common::{Error, ImportOutcome, Result, RunSummary, SnapshotRecord};

/// Everything a completed (or cleanly aborted) run yields for review
#[derive(Debug)]
pub struct RunReport {
    /// Aggregate counts per status
    pub summary: RunSummary,
    /// One outcome per record attempted, in snapshot order
    pub outcomes: Vec<ImportOutcome>,
}

pub struct ImportSession<C: DestinationCatalog> {
    adapter: SearchAdapter<C>,
    matcher: MatchEngine,
    applier: MutationApplier<C>,
    playlists: PlaylistCache,
    sink: Box<dyn OutcomeSink>,
    cancel: CancellationToken,
}

impl<C: DestinationCatalog> ImportSession<C> {
    pub fn new(catalog: Arc<C>, config: &Config, sink: Box<dyn OutcomeSink>) -> Self {
        let invoker = Arc::new(RateLimitedInvoker::new(config.invoker.clone()));
        let adapter = SearchAdapter::new(catalog.clone(), invoker.clone(), DEFAULT_SEARCH_LIMIT);
        let matcher = MatchEngine::new(config.matcher.clone());
        let applier = MutationApplier::new(catalog, invoker);

        Self {
            adapter,
            matcher,
            applier,
            playlists: PlaylistCache::new(),
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Token for cooperative cancellation; the session checks it between
    /// records only, never mid-mutation, so the outcome log can never
    /// contain a half-applied record
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the pipeline over the full snapshot
    ///
    /// Returns `Err` only for run-aborting failures (authorization, a
    /// sink that cannot be written); outcomes recorded before the abort
    /// have already been flushed to the sink.
    pub async fn run(&mut self, records: &[SnapshotRecord]) -> Result<RunReport> {
        let mut summary = RunSummary::default();
        let mut outcomes = Vec::with_capacity(records.len());

        tracing::info!(records = records.len(), "Starting import run");

        for (index, record) in records.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    processed = index,
                    remaining = records.len() - index,
                    "Import cancelled between records"
                );
                break;
            }

            let outcome = match self.process_record(record).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::error!(
                        source_id = %record.source_id,
                        %error,
                        "Run-fatal error, aborting import"
                    );
                    return Err(error);
                }
            };

            summary.record(outcome.status);
            self.sink.emit(&outcome)?;
            outcomes.push(outcome);
        }

        tracing::info!(%summary, "Import run complete");
        Ok(RunReport { summary, outcomes })
    }

    /// Process one record; `Err` only for run-fatal failures
    async fn process_record(&mut self, record: &SnapshotRecord) -> Result<ImportOutcome> {
        let candidates = match self.adapter.search(record).await {
            Ok(candidates) => candidates,
            Err(error @ Error::Authorization(_)) => return Err(error),
            Err(error) => {
                tracing::warn!(
                    source_id = %record.source_id,
                    %error,
                    "Search failed for record"
                );
                return Ok(ImportOutcome::failed(record.clone(), error.to_string()));
            }
        };

        let resolution = self.matcher.resolve(record, &candidates);
        self.applier
            .apply(record.clone(), resolution, &mut self.playlists)
            .await
    }
}
