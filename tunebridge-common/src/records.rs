//! Catalog-agnostic library records and import outcome types
//!
//! `SnapshotRecord` is the normalized representation of one library item
//! exported from the source catalog. Everything downstream (candidate
//! search, matching, mutation) operates on these records; nothing in the
//! engine ever sees a source-catalog API object.

use serde::{Deserialize, Serialize};

/// Library entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Track,
    Album,
    Artist,
    /// One track belonging to a named source playlist (one row per
    /// track-in-playlist; the playlist entity itself is never a record)
    Playlist,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Track => "track",
            RecordKind::Album => "album",
            RecordKind::Artist => "artist",
            RecordKind::Playlist => "playlist",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "track" => Ok(RecordKind::Track),
            "album" => Ok(RecordKind::Album),
            "artist" => Ok(RecordKind::Artist),
            "playlist" => Ok(RecordKind::Playlist),
            other => Err(format!("unknown record kind '{}'", other)),
        }
    }
}

/// One normalized library item from the source catalog
///
/// Immutable once exported. Uniquely identified within a snapshot by
/// `(kind, source_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Entity kind
    pub kind: RecordKind,
    /// Track/album title or artist name
    pub title: String,
    /// Primary (first-credited) artist name; empty only for artist records
    /// where `title` already carries the name
    pub primary_artist: String,
    /// Album name (track and playlist rows only)
    pub album: Option<String>,
    /// Duration in seconds, when the source catalog reported one
    pub duration_secs: Option<u32>,
    /// International Standard Recording Code (track rows only)
    pub isrc: Option<String>,
    /// Source playlist name (playlist rows only)
    pub source_playlist: Option<String>,
    /// Opaque source-catalog identifier
    pub source_id: String,
}

impl SnapshotRecord {
    /// Short human-readable label for logs and outcome reasons
    pub fn label(&self) -> String {
        if self.primary_artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.primary_artist)
        }
    }
}

/// A destination-catalog search hit considered for matching
///
/// Produced transiently per search call; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Opaque destination-catalog identifier
    pub destination_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: Option<u32>,
    pub isrc: Option<String>,
}

/// Outcome of resolving a snapshot record against search candidates
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// One candidate cleared the acceptance threshold with sufficient
    /// margin over the runner-up (or matched by exact ISRC)
    Matched {
        candidate: MatchCandidate,
        /// Score in [0.0, 1.0]
        score: f64,
    },
    /// Top score cleared the threshold but the runner-up was too close to
    /// pick safely; candidates listed for user review
    Ambiguous { candidates: Vec<MatchCandidate> },
    /// No candidate cleared the acceptance threshold
    NotFound,
}

/// Per-record import status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportStatus {
    /// Destination state was changed for this record
    Imported,
    /// Destination already held this entity; nothing changed
    AlreadyPresent,
    /// Record was not importable (no match / ambiguous match)
    Skipped,
    /// A destination call failed after classification
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Imported => "imported",
            ImportStatus::AlreadyPresent => "already-present",
            ImportStatus::Skipped => "skipped",
            ImportStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record result of one import attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub record: SnapshotRecord,
    pub status: ImportStatus,
    /// Required when status is Failed or Skipped
    pub reason: Option<String>,
    /// Present when status is Imported or AlreadyPresent
    pub destination_id: Option<String>,
}

impl ImportOutcome {
    pub fn imported(record: SnapshotRecord, destination_id: String) -> Self {
        Self {
            record,
            status: ImportStatus::Imported,
            reason: None,
            destination_id: Some(destination_id),
        }
    }

    pub fn already_present(record: SnapshotRecord, destination_id: String) -> Self {
        Self {
            record,
            status: ImportStatus::AlreadyPresent,
            reason: None,
            destination_id: Some(destination_id),
        }
    }

    pub fn skipped(record: SnapshotRecord, reason: String) -> Self {
        Self {
            record,
            status: ImportStatus::Skipped,
            reason: Some(reason),
            destination_id: None,
        }
    }

    pub fn failed(record: SnapshotRecord, reason: String) -> Self {
        Self {
            record,
            status: ImportStatus::Failed,
            reason: Some(reason),
            destination_id: None,
        }
    }
}

/// Aggregate counts for one import run, for user review
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub imported: usize,
    pub already_present: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, status: ImportStatus) {
        match status {
            ImportStatus::Imported => self.imported += 1,
            ImportStatus::AlreadyPresent => self.already_present += 1,
            ImportStatus::Skipped => self.skipped += 1,
            ImportStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.imported + self.already_present + self.skipped + self.failed
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "imported={} already-present={} skipped={} failed={}",
            self.imported, self.already_present, self.skipped, self.failed
        )
    }
}
