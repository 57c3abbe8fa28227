//! Matching engine
//!
//! Scores destination candidates against a snapshot record and selects
//! the best one, or declares the record ambiguous/unmatched. Pure and
//! deterministic: the same record and candidate list always produce the
//! same result.
//!
//! Scoring tiers, highest priority first:
//! 1. Exact ISRC equality (tracks) — automatic match at maximum score,
//!    bypassing the threshold/margin policy entirely.
//! 2. Normalized exact equality of title and artist — high fixed score,
//!    nudged by duration closeness when both durations are known.
//! 3. Fuzzy similarity — token-sorted Jaro-Winkler on title and artist
//!    plus a duration-closeness term.
//!
//! Acceptance is graded rather than winner-takes-all: catalogs are full
//! of remasters, live versions, and duplicate uploads differing only
//! slightly in metadata, so a top candidate must both clear the accept
//! threshold and beat the runner-up by a minimum margin.

use std::cmp::Ordering;
use tunebridge_common::config::MatcherConfig;
use tunebridge_common::{MatchCandidate, MatchResult, RecordKind, SnapshotRecord};

/// Seconds beyond the tolerance over which the duration term decays to
/// zero
const DURATION_DECAY_WINDOW: f64 = 30.0;

pub struct MatchEngine {
    config: MatcherConfig,
}

impl MatchEngine {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Resolve a record against its search candidates
    pub fn resolve(&self, record: &SnapshotRecord, candidates: &[MatchCandidate]) -> MatchResult {
        if candidates.is_empty() {
            return MatchResult::NotFound;
        }

        // Tier 1: exact ISRC equality wins outright, regardless of the
        // candidate's ranking position
        if matches!(record.kind, RecordKind::Track | RecordKind::Playlist) {
            if let Some(isrc) = record.isrc.as_deref() {
                if let Some(hit) = candidates.iter().find(|c| {
                    c.isrc
                        .as_deref()
                        .is_some_and(|ci| ci.eq_ignore_ascii_case(isrc))
                }) {
                    tracing::debug!(
                        source_id = %record.source_id,
                        destination_id = %hit.destination_id,
                        "Exact ISRC match"
                    );
                    return MatchResult::Matched {
                        candidate: hit.clone(),
                        score: 1.0,
                    };
                }
            }
        }

        let mut scored: Vec<(f64, usize)> = candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| (self.score(record, candidate), index))
            .collect();
        // Stable sort: ties keep the destination's relevance order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let (top_score, top_index) = scored[0];
        if top_score < self.config.accept_threshold {
            return MatchResult::NotFound;
        }

        if let Some(&(second_score, _)) = scored.get(1) {
            if top_score - second_score < self.config.margin_threshold {
                // Near-tie among the leaders: refuse to pick silently
                let contenders: Vec<MatchCandidate> = scored
                    .iter()
                    .take_while(|(score, _)| top_score - score < self.config.margin_threshold)
                    .map(|&(_, index)| candidates[index].clone())
                    .collect();
                tracing::debug!(
                    source_id = %record.source_id,
                    top_score,
                    second_score,
                    contenders = contenders.len(),
                    "Ambiguous match"
                );
                return MatchResult::Ambiguous {
                    candidates: contenders,
                };
            }
        }

        MatchResult::Matched {
            candidate: candidates[top_index].clone(),
            score: top_score,
        }
    }

    /// Score one candidate in [0.0, 1.0]
    fn score(&self, record: &SnapshotRecord, candidate: &MatchCandidate) -> f64 {
        let score = match record.kind {
            RecordKind::Track | RecordKind::Playlist => self.score_track(record, candidate),
            RecordKind::Album => self.score_album(record, candidate),
            RecordKind::Artist => self.score_artist(record, candidate),
        };
        score.clamp(0.0, 1.0)
    }

    fn score_track(&self, record: &SnapshotRecord, candidate: &MatchCandidate) -> f64 {
        let duration = self.duration_term(record.duration_secs, candidate.duration_secs);

        // Tier 2: normalized exact equality of title and artist
        if normalize(&record.title) == normalize(&candidate.title)
            && normalize(&record.primary_artist) == normalize(&candidate.artist)
        {
            return 0.92 + 0.08 * duration;
        }

        // Tier 3: fuzzy similarity with duration closeness
        let title_sim = similarity(&record.title, &candidate.title);
        let artist_sim = similarity(&record.primary_artist, &candidate.artist);
        0.45 * title_sim + 0.35 * artist_sim + 0.20 * duration
    }

    fn score_album(&self, record: &SnapshotRecord, candidate: &MatchCandidate) -> f64 {
        if normalize(&record.title) == normalize(&candidate.title)
            && normalize(&record.primary_artist) == normalize(&candidate.artist)
        {
            return 0.95;
        }

        let title_sim = similarity(&record.title, &candidate.title);
        let artist_sim = similarity(&record.primary_artist, &candidate.artist);
        0.55 * title_sim + 0.45 * artist_sim
    }

    fn score_artist(&self, record: &SnapshotRecord, candidate: &MatchCandidate) -> f64 {
        if normalize(&record.title) == normalize(&candidate.title) {
            return 0.95;
        }
        similarity(&record.title, &candidate.title)
    }

    /// Duration closeness in [0.0, 1.0]; 0.5 when either side is unknown
    ///
    /// Within the configured tolerance (default 3 s) counts as the same
    /// recording; beyond it the term decays linearly to zero, so a live
    /// version running a minute long cannot ride an otherwise-similar
    /// title to acceptance.
    fn duration_term(&self, record_secs: Option<u32>, candidate_secs: Option<u32>) -> f64 {
        match (record_secs, candidate_secs) {
            (Some(a), Some(b)) => {
                let diff = a.abs_diff(b) as f64;
                let tolerance = self.config.duration_tolerance_secs as f64;
                if diff <= tolerance {
                    1.0
                } else {
                    (1.0 - (diff - tolerance) / DURATION_DECAY_WINDOW).max(0.0)
                }
            }
            _ => 0.5,
        }
    }
}

/// Case-fold, strip punctuation, collapse whitespace
fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            for lowered in ch.to_lowercase() {
                normalized.push(lowered);
            }
        } else {
            normalized.push(' ');
        }
    }
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Token-sorted Jaro-Winkler similarity on normalized text
///
/// Sorting tokens first makes "Mac Fleetwood" and "Fleetwood Mac" agree,
/// the word-order-insensitivity the token-set style of fuzzy matching is
/// for.
fn similarity(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(&token_sorted(a), &token_sorted(b))
}

fn token_sorted(text: &str) -> String {
    let normalized = normalize(text);
    let mut tokens: Vec<&str> = normalized.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
