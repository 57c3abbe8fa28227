//! # Tunebridge Common Library
//!
//! Shared code for the tunebridge crates:
//! - Error taxonomy (run-fatal vs per-record failures)
//! - Configuration loading (ENV -> TOML -> defaults)
//! - Normalized snapshot records and outcome types
//! - Snapshot CSV (de)serialization

pub mod config;
pub mod error;
pub mod records;
pub mod snapshot;

pub use error::{Error, Result};
pub use records::{
    ImportOutcome, ImportStatus, MatchCandidate, MatchResult, RecordKind, RunSummary,
    SnapshotRecord,
};
