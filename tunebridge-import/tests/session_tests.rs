//! Import session integration tests
//!
//! Runs the whole pipeline (search -> match -> mutate -> outcome log)
//! against a programmable in-memory catalog: scripted search results,
//! injectable rate-limit and transient failures, and inspectable
//! destination state.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tunebridge_common::config::Config;
use tunebridge_common::{
    Error, ImportOutcome, ImportStatus, MatchCandidate, RecordKind, Result, SnapshotRecord,
};
use tunebridge_import::catalog::{CallError, CallResult, DestinationCatalog};
use tunebridge_import::outcome_log::OutcomeSink;
use tunebridge_import::session::ImportSession;

/// Scripted destination catalog with inspectable state
#[derive(Default)]
struct FakeCatalog {
    /// (kind, lowercase needle contained in the query, candidates)
    search_results: Mutex<Vec<(RecordKind, String, Vec<MatchCandidate>)>>,
    favorites: Mutex<HashSet<(RecordKind, String)>>,
    /// playlist name -> playlist id
    playlists: Mutex<HashMap<String, String>>,
    /// playlist id -> track ids
    playlist_items: Mutex<HashMap<String, HashSet<String>>>,
    next_playlist_id: AtomicU32,
    call_counts: Mutex<HashMap<&'static str, u32>>,
    /// Method -> number of leading calls to reject with retry-after
    rate_limit_first: Mutex<HashMap<&'static str, u32>>,
    /// Destination ids whose add_favorite always fails transiently
    transient_ids: Mutex<HashSet<String>>,
    /// Destination ids whose add_favorite rejects authorization
    unauthorized_ids: Mutex<HashSet<String>>,
}

impl FakeCatalog {
    fn stub_search(&self, kind: RecordKind, needle: &str, candidates: Vec<MatchCandidate>) {
        self.search_results
            .lock()
            .unwrap()
            .push((kind, needle.to_lowercase(), candidates));
    }

    fn count(&self, method: &'static str) -> u32 {
        *self.call_counts.lock().unwrap().get(method).unwrap_or(&0)
    }

    fn record_call(&self, method: &'static str) -> CallResult<()> {
        *self.call_counts.lock().unwrap().entry(method).or_insert(0) += 1;

        let mut limits = self.rate_limit_first.lock().unwrap();
        if let Some(remaining) = limits.get_mut(method) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CallError::RateLimited {
                    retry_after: Some(Duration::from_millis(1)),
                });
            }
        }
        Ok(())
    }

    fn favorite(&self, kind: RecordKind, id: &str) {
        self.favorites
            .lock()
            .unwrap()
            .insert((kind, id.to_string()));
    }
}

#[async_trait]
impl DestinationCatalog for FakeCatalog {
    async fn search(
        &self,
        kind: RecordKind,
        query: &str,
        _limit: usize,
    ) -> CallResult<Vec<MatchCandidate>> {
        self.record_call("search")?;
        let query = query.to_lowercase();
        let results = self.search_results.lock().unwrap();
        Ok(results
            .iter()
            .find(|(k, needle, _)| *k == kind && query.contains(needle))
            .map(|(_, _, candidates)| candidates.clone())
            .unwrap_or_default())
    }

    async fn is_favorite(&self, kind: RecordKind, destination_id: &str) -> CallResult<bool> {
        self.record_call("is_favorite")?;
        Ok(self
            .favorites
            .lock()
            .unwrap()
            .contains(&(kind, destination_id.to_string())))
    }

    async fn add_favorite(&self, kind: RecordKind, destination_id: &str) -> CallResult<()> {
        self.record_call("add_favorite")?;
        if self.transient_ids.lock().unwrap().contains(destination_id) {
            return Err(CallError::Transient("connection reset".into()));
        }
        if self
            .unauthorized_ids
            .lock()
            .unwrap()
            .contains(destination_id)
        {
            return Err(CallError::Unauthorized("token expired".into()));
        }
        self.favorites
            .lock()
            .unwrap()
            .insert((kind, destination_id.to_string()));
        Ok(())
    }

    async fn find_playlist(&self, name: &str) -> CallResult<Option<String>> {
        self.record_call("find_playlist")?;
        Ok(self.playlists.lock().unwrap().get(name).cloned())
    }

    async fn create_playlist(&self, name: &str) -> CallResult<String> {
        self.record_call("create_playlist")?;
        let id = format!("pl:{}", self.next_playlist_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.playlists
            .lock()
            .unwrap()
            .insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn playlist_contains(&self, playlist_id: &str, track_id: &str) -> CallResult<bool> {
        self.record_call("playlist_contains")?;
        Ok(self
            .playlist_items
            .lock()
            .unwrap()
            .get(playlist_id)
            .is_some_and(|items| items.contains(track_id)))
    }

    async fn add_to_playlist(&self, playlist_id: &str, track_id: &str) -> CallResult<()> {
        self.record_call("add_to_playlist")?;
        self.playlist_items
            .lock()
            .unwrap()
            .entry(playlist_id.to_string())
            .or_default()
            .insert(track_id.to_string());
        Ok(())
    }
}

/// Sink sharing its buffer with the test, so emitted outcomes survive an
/// aborted run
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<ImportOutcome>>>);

impl OutcomeSink for SharedSink {
    fn emit(&mut self, outcome: &ImportOutcome) -> Result<()> {
        self.0.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.invoker.base_backoff_ms = 1;
    config.invoker.requests_per_second = 10_000;
    config
}

fn session(catalog: &Arc<FakeCatalog>) -> (ImportSession<FakeCatalog>, SharedSink) {
    let sink = SharedSink::default();
    let session = ImportSession::new(catalog.clone(), &fast_config(), Box::new(sink.clone()));
    (session, sink)
}

fn track(n: u32, title: &str, isrc: Option<&str>) -> SnapshotRecord {
    SnapshotRecord {
        kind: RecordKind::Track,
        title: title.into(),
        primary_artist: "Fleetwood Mac".into(),
        album: Some("Rumours".into()),
        duration_secs: Some(200 + n),
        isrc: isrc.map(Into::into),
        source_playlist: None,
        source_id: format!("sp:track:{}", n),
    }
}

fn playlist_row(n: u32, title: &str, playlist: &str) -> SnapshotRecord {
    SnapshotRecord {
        kind: RecordKind::Playlist,
        title: title.into(),
        primary_artist: "Fleetwood Mac".into(),
        album: None,
        duration_secs: Some(200 + n),
        isrc: None,
        source_playlist: Some(playlist.into()),
        source_id: format!("sp:pl-track:{}", n),
    }
}

fn exact_candidate(id: &str, record: &SnapshotRecord) -> MatchCandidate {
    MatchCandidate {
        destination_id: id.into(),
        title: record.title.clone(),
        artist: record.primary_artist.clone(),
        album: record.album.clone(),
        duration_secs: record.duration_secs,
        isrc: None,
    }
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let catalog = Arc::new(FakeCatalog::default());
    let records = vec![track(1, "Dreams", None), track(2, "Landslide", None)];
    for record in &records {
        catalog.stub_search(
            RecordKind::Track,
            &record.title,
            vec![exact_candidate(&format!("t:{}", record.source_id), record)],
        );
    }

    let (mut first, _) = session(&catalog);
    let report = first.run(&records).await.unwrap();
    assert_eq!(report.summary.imported, 2);
    assert_eq!(report.summary.already_present, 0);

    // Same snapshot, fresh session, same destination state: nothing to do
    let (mut second, _) = session(&catalog);
    let report = second.run(&records).await.unwrap();
    assert_eq!(report.summary.imported, 0);
    assert_eq!(report.summary.already_present, 2);
    assert_eq!(report.summary.failed, 0);
}

#[tokio::test]
async fn one_failing_record_does_not_halt_the_run() {
    let catalog = Arc::new(FakeCatalog::default());
    let records = vec![
        track(1, "Dreams", None),
        track(2, "Landslide", None),
        track(3, "The Chain", None),
    ];
    for record in &records {
        catalog.stub_search(
            RecordKind::Track,
            &record.title,
            vec![exact_candidate(&format!("t:{}", record.source_id), record)],
        );
    }
    catalog
        .transient_ids
        .lock()
        .unwrap()
        .insert("t:sp:track:2".to_string());

    let (mut session, _) = session(&catalog);
    let report = session.run(&records).await.unwrap();

    // Every input record has exactly one outcome despite the failure
    assert_eq!(report.outcomes.len(), records.len());
    assert_eq!(report.outcomes[0].status, ImportStatus::Imported);
    assert_eq!(report.outcomes[1].status, ImportStatus::Failed);
    assert!(report.outcomes[1].reason.as_deref().unwrap().contains("Transient"));
    assert_eq!(report.outcomes[2].status, ImportStatus::Imported);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.imported, 2);
}

#[tokio::test]
async fn isrc_match_wins_over_ranking_position() {
    let catalog = Arc::new(FakeCatalog::default());
    let record = track(1, "Dreams", Some("GBACB7700057"));

    // Three near-identical candidates; only the last carries the ISRC
    let mut decoy_a = exact_candidate("t:decoy-a", &record);
    decoy_a.isrc = Some("USXXX9900001".into());
    let decoy_b = exact_candidate("t:decoy-b", &record);
    let mut real = exact_candidate("t:real", &record);
    real.isrc = Some("GBACB7700057".into());
    catalog.stub_search(RecordKind::Track, "dreams", vec![decoy_a, decoy_b, real]);

    let (mut session, _) = session(&catalog);
    let report = session.run(std::slice::from_ref(&record)).await.unwrap();

    assert_eq!(report.summary.imported, 1);
    assert_eq!(
        report.outcomes[0].destination_id.as_deref(),
        Some("t:real")
    );
    assert!(catalog
        .favorites
        .lock()
        .unwrap()
        .contains(&(RecordKind::Track, "t:real".to_string())));
}

#[tokio::test]
async fn retry_after_rate_limit_then_success() {
    let catalog = Arc::new(FakeCatalog::default());
    let record = track(1, "Dreams", None);
    catalog.stub_search(
        RecordKind::Track,
        "dreams",
        vec![exact_candidate("t:1", &record)],
    );
    // First 3 add_favorite calls answer with a retry-after signal
    catalog
        .rate_limit_first
        .lock()
        .unwrap()
        .insert("add_favorite", 3);

    let (mut session, _) = session(&catalog);
    let report = session.run(std::slice::from_ref(&record)).await.unwrap();

    assert_eq!(report.summary.imported, 1);
    assert_eq!(report.summary.failed, 0);
    // Exactly 3 retries: 4 calls total
    assert_eq!(catalog.count("add_favorite"), 4);
}

#[tokio::test]
async fn rate_limit_exhaustion_fails_only_that_record() {
    let catalog = Arc::new(FakeCatalog::default());
    let records = vec![track(1, "Dreams", None), track(2, "Landslide", None)];
    for record in &records {
        catalog.stub_search(
            RecordKind::Track,
            &record.title,
            vec![exact_candidate(&format!("t:{}", record.source_id), record)],
        );
    }
    // More rejections than the attempt budget (5): first record's
    // add_favorite never succeeds, second record is unaffected
    catalog
        .rate_limit_first
        .lock()
        .unwrap()
        .insert("add_favorite", 5);

    let (mut session, _) = session(&catalog);
    let report = session.run(&records).await.unwrap();

    assert_eq!(report.outcomes[0].status, ImportStatus::Failed);
    assert!(report.outcomes[0]
        .reason
        .as_deref()
        .unwrap()
        .contains("rate-limited"));
    assert_eq!(report.outcomes[1].status, ImportStatus::Imported);
}

#[tokio::test]
async fn playlist_created_once_and_fully_populated() {
    let catalog = Arc::new(FakeCatalog::default());
    let titles = [
        "Song One", "Song Two", "Song Three", "Song Four", "Song Five", "Song Six", "Song Seven",
        "Song Eight",
    ];
    let records: Vec<SnapshotRecord> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| playlist_row(i as u32 + 1, title, "Road Trip"))
        .collect();
    for record in &records {
        // Playlist rows search the track index
        catalog.stub_search(
            RecordKind::Track,
            &record.title,
            vec![exact_candidate(&format!("t:{}", record.source_id), record)],
        );
    }
    // 5 of the 8 tracks are already favorited; favorite state must not
    // affect playlist insertion
    for record in records.iter().take(5) {
        catalog.favorite(RecordKind::Track, &format!("t:{}", record.source_id));
    }

    let (mut first, _) = session(&catalog);
    let report = first.run(&records).await.unwrap();

    assert_eq!(report.summary.imported, 8);
    assert_eq!(report.summary.already_present, 0);
    assert_eq!(catalog.count("create_playlist"), 1);

    let playlists = catalog.playlists.lock().unwrap();
    let playlist_id = playlists.get("Road Trip").unwrap().clone();
    drop(playlists);
    assert_eq!(
        catalog
            .playlist_items
            .lock()
            .unwrap()
            .get(&playlist_id)
            .unwrap()
            .len(),
        8
    );

    // Re-running inserts nothing and creates no second playlist
    let (mut second, _) = session(&catalog);
    let report = second.run(&records).await.unwrap();
    assert_eq!(report.summary.imported, 0);
    assert_eq!(report.summary.already_present, 8);
    assert_eq!(catalog.count("create_playlist"), 1);
}

#[tokio::test]
async fn unmatched_records_skip_without_mutating() {
    let catalog = Arc::new(FakeCatalog::default());
    let missing = track(1, "Dreams", None);
    let ambiguous = track(2, "Landslide", None);
    // No stub for "Dreams": zero candidates. Two byte-identical uploads
    // for "Landslide": near-tie the margin check must refuse.
    catalog.stub_search(
        RecordKind::Track,
        "landslide",
        vec![
            exact_candidate("t:dup-1", &ambiguous),
            exact_candidate("t:dup-2", &ambiguous),
        ],
    );

    let (mut session, _) = session(&catalog);
    let report = session
        .run(&[missing, ambiguous])
        .await
        .unwrap();

    assert_eq!(report.summary.skipped, 2);
    assert!(report.outcomes[0]
        .reason
        .as_deref()
        .unwrap()
        .starts_with("not-found"));
    let ambiguous_reason = report.outcomes[1].reason.as_deref().unwrap();
    assert!(ambiguous_reason.starts_with("ambiguous"));
    assert!(ambiguous_reason.contains("t:dup-1"));
    assert!(ambiguous_reason.contains("t:dup-2"));
    // Nothing was mutated
    assert!(catalog.favorites.lock().unwrap().is_empty());
    assert_eq!(catalog.count("add_favorite"), 0);
}

#[tokio::test]
async fn authorization_failure_aborts_but_preserves_prior_outcomes() {
    let catalog = Arc::new(FakeCatalog::default());
    let records = vec![
        track(1, "Dreams", None),
        track(2, "Landslide", None),
        track(3, "The Chain", None),
    ];
    for record in &records {
        catalog.stub_search(
            RecordKind::Track,
            &record.title,
            vec![exact_candidate(&format!("t:{}", record.source_id), record)],
        );
    }
    catalog
        .unauthorized_ids
        .lock()
        .unwrap()
        .insert("t:sp:track:2".to_string());

    let (mut session, sink) = session(&catalog);
    let error = session.run(&records).await.unwrap_err();

    assert!(matches!(error, Error::Authorization(_)));
    // The first record's outcome reached the sink before the abort; the
    // third record was never attempted
    let emitted = sink.0.lock().unwrap();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].status, ImportStatus::Imported);
}

#[tokio::test]
async fn cancellation_stops_between_records() {
    let catalog = Arc::new(FakeCatalog::default());
    let records = vec![track(1, "Dreams", None), track(2, "Landslide", None)];
    for record in &records {
        catalog.stub_search(
            RecordKind::Track,
            &record.title,
            vec![exact_candidate(&format!("t:{}", record.source_id), record)],
        );
    }

    let (mut session, _) = session(&catalog);
    // Cancel before the run starts: no record may be processed
    session.cancellation_token().cancel();
    let report = session.run(&records).await.unwrap();

    assert_eq!(report.outcomes.len(), 0);
    assert_eq!(catalog.count("search"), 0);
}
