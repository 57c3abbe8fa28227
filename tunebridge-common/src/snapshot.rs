//! Snapshot file (de)serialization
//!
//! One CSV file per entity kind, UTF-8, header row with the literal
//! `SnapshotRecord` field names, fixed column order, empty string for
//! absent optional fields. Loading fails on the first malformed row with
//! the row number and offending column; rows are never silently dropped.
//!
//! Round-trip law: `read_snapshot(write_snapshot(records)) == records`
//! for any valid record sequence (optional fields, when present, are
//! non-empty strings).

use crate::error::{Error, Result};
use crate::records::{RecordKind, SnapshotRecord};
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Snapshot column names, in serialization order
pub const COLUMNS: [&str; 8] = [
    "kind",
    "title",
    "primary_artist",
    "album",
    "duration_secs",
    "isrc",
    "source_playlist",
    "source_id",
];

/// Serialize records to CSV bytes, one row per record
pub fn write_snapshot<W: Write>(records: &[SnapshotRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(COLUMNS)
        .map_err(|e| Error::Config(format!("Failed to write snapshot header: {}", e)))?;

    for record in records {
        let duration = record
            .duration_secs
            .map(|d| d.to_string())
            .unwrap_or_default();
        csv_writer
            .write_record([
                record.kind.as_str(),
                &record.title,
                &record.primary_artist,
                record.album.as_deref().unwrap_or(""),
                &duration,
                record.isrc.as_deref().unwrap_or(""),
                record.source_playlist.as_deref().unwrap_or(""),
                &record.source_id,
            ])
            .map_err(|e| Error::Config(format!("Failed to write snapshot row: {}", e)))?;
    }

    csv_writer
        .flush()
        .map_err(|e| Error::Config(format!("Failed to flush snapshot: {}", e)))?;
    Ok(())
}

/// Deserialize records from CSV bytes
///
/// Fails with `Error::MalformedRecord` naming the 1-based data row and
/// the missing/invalid column.
pub fn read_snapshot<R: Read>(reader: R) -> Result<Vec<SnapshotRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    // Validate the header names the expected columns in order
    let headers = csv_reader
        .headers()
        .map_err(|e| Error::Config(format!("Failed to read snapshot header: {}", e)))?
        .clone();
    for (index, expected) in COLUMNS.iter().enumerate() {
        match headers.get(index) {
            Some(actual) if actual == *expected => {}
            Some(actual) => {
                return Err(Error::MalformedRecord {
                    row: 0,
                    column: (*expected).to_string(),
                    message: format!("header column {} is '{}', expected '{}'", index, actual, expected),
                });
            }
            None => {
                return Err(Error::MalformedRecord {
                    row: 0,
                    column: (*expected).to_string(),
                    message: "header column missing".to_string(),
                });
            }
        }
    }

    let mut records = Vec::new();
    for (index, row) in csv_reader.records().enumerate() {
        let row_number = index + 1;
        let row = row.map_err(|e| Error::MalformedRecord {
            row: row_number,
            column: "(row)".to_string(),
            message: format!("unparseable CSV row: {}", e),
        })?;

        records.push(parse_row(row_number, &row)?);
    }

    Ok(records)
}

/// Serialize records to a snapshot file on disk
pub fn write_snapshot_file<P: AsRef<Path>>(records: &[SnapshotRecord], path: P) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_snapshot(records, file)
}

/// Load a snapshot file from disk
pub fn read_snapshot_file<P: AsRef<Path>>(path: P) -> Result<Vec<SnapshotRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let records = read_snapshot(file)?;
    tracing::info!(
        path = %path.display(),
        records = records.len(),
        "Loaded snapshot"
    );
    Ok(records)
}

fn parse_row(row_number: usize, row: &csv::StringRecord) -> Result<SnapshotRecord> {
    let field = |index: usize| -> Result<&str> {
        row.get(index).ok_or_else(|| Error::MalformedRecord {
            row: row_number,
            column: COLUMNS[index].to_string(),
            message: "column missing".to_string(),
        })
    };

    let kind = RecordKind::from_str(field(0)?).map_err(|message| Error::MalformedRecord {
        row: row_number,
        column: "kind".to_string(),
        message,
    })?;

    let title = field(1)?.to_string();
    if title.is_empty() {
        return Err(Error::MalformedRecord {
            row: row_number,
            column: "title".to_string(),
            message: "title must not be empty".to_string(),
        });
    }

    let primary_artist = field(2)?.to_string();
    let album = optional(field(3)?);

    let duration_field = field(4)?;
    let duration_secs = if duration_field.is_empty() {
        None
    } else {
        Some(
            duration_field
                .parse::<u32>()
                .map_err(|_| Error::MalformedRecord {
                    row: row_number,
                    column: "duration_secs".to_string(),
                    message: format!("'{}' is not a whole number of seconds", duration_field),
                })?,
        )
    };

    let isrc = optional(field(5)?);
    let source_playlist = optional(field(6)?);

    let source_id = field(7)?.to_string();
    if source_id.is_empty() {
        return Err(Error::MalformedRecord {
            row: row_number,
            column: "source_id".to_string(),
            message: "source_id must not be empty".to_string(),
        });
    }

    Ok(SnapshotRecord {
        kind,
        title,
        primary_artist,
        album,
        duration_secs,
        isrc,
        source_playlist,
        source_id,
    })
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
