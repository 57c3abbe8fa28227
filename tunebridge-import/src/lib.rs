//! tunebridge-import - Matching & Import Engine
//!
//! Resolves catalog-agnostic snapshot records against the destination
//! catalog and replays them as idempotent mutations (favorites, playlist
//! inserts), tracking a per-record outcome for the whole run.
//!
//! Pipeline: snapshot record -> candidate search (rate-limited) ->
//! matching engine -> mutation applier (rate-limited) -> outcome log.

pub mod catalog;
pub mod client;
pub mod invoker;
pub mod matcher;
pub mod mutations;
pub mod outcome_log;
pub mod search;
pub mod session;

pub use catalog::{CallError, CallResult, DestinationCatalog};
pub use client::HttpCatalogClient;
pub use invoker::RateLimitedInvoker;
pub use matcher::MatchEngine;
pub use mutations::{MutationApplier, PlaylistCache};
pub use outcome_log::{FileOutcomeSink, OutcomeSink};
pub use search::SearchAdapter;
pub use session::{ImportSession, RunReport};
