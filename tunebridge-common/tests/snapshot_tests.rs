//! Snapshot file round-trip tests against real files on disk

use tempfile::TempDir;
use tunebridge_common::snapshot::{read_snapshot_file, write_snapshot_file};
use tunebridge_common::{Error, RecordKind, SnapshotRecord};

fn track(n: u32) -> SnapshotRecord {
    SnapshotRecord {
        kind: RecordKind::Track,
        title: format!("Track {}", n),
        primary_artist: "Camel".into(),
        album: Some("Mirage".into()),
        duration_secs: Some(200 + n),
        isrc: if n % 2 == 0 {
            Some(format!("GBTEST0{:06}", n))
        } else {
            None
        },
        source_playlist: None,
        source_id: format!("sp:track:{}", n),
    }
}

#[test]
fn file_round_trip_preserves_every_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tracks.csv");

    let records: Vec<SnapshotRecord> = (1..=25).map(track).collect();
    write_snapshot_file(&records, &path).unwrap();

    let restored = read_snapshot_file(&path).unwrap();
    assert_eq!(restored, records);
}

#[test]
fn unreadable_snapshot_surfaces_io_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist.csv");

    let err = read_snapshot_file(&missing).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn malformed_row_aborts_the_whole_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tracks.csv");

    // Row 2 has a bad duration; rows 1 and 3 are fine. Loading must fail
    // rather than return the two good rows.
    let csv = "kind,title,primary_artist,album,duration_secs,isrc,source_playlist,source_id\n\
               track,Lady Fantasy,Camel,Mirage,232,,,sp:1\n\
               track,Freefall,Camel,Mirage,oops,,,sp:2\n\
               track,Supertwister,Camel,Mirage,185,,,sp:3\n";
    std::fs::write(&path, csv).unwrap();

    let err = read_snapshot_file(&path).unwrap_err();
    match err {
        Error::MalformedRecord { row, ref column, .. } => {
            assert_eq!(row, 2);
            assert_eq!(column, "duration_secs");
        }
        other => panic!("expected MalformedRecord, got {:?}", other),
    }
    assert!(err.is_run_fatal());
}
