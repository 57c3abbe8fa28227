//! Outcome log sink
//!
//! The session reports every per-record outcome through a single injected
//! sink rather than ambient logging, so callers choose where the record
//! of a run ends up (a log file in production, memory in tests).

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tunebridge_common::{ImportOutcome, Result};

/// Receives each outcome as the session records it
pub trait OutcomeSink: Send {
    fn emit(&mut self, outcome: &ImportOutcome) -> Result<()>;
}

/// Append-only structured text log, one line per outcome
///
/// Line format:
/// `<rfc3339> kind=<kind> source_id=<id> status=<status>
/// [destination_id=<id>] [reason="<reason>"]`
pub struct FileOutcomeSink {
    writer: BufWriter<std::fs::File>,
    path: PathBuf,
}

impl FileOutcomeSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutcomeSink for FileOutcomeSink {
    fn emit(&mut self, outcome: &ImportOutcome) -> Result<()> {
        let mut line = format!(
            "{} kind={} source_id={} status={}",
            Utc::now().to_rfc3339(),
            outcome.record.kind,
            outcome.record.source_id,
            outcome.status
        );
        if let Some(id) = &outcome.destination_id {
            line.push_str(&format!(" destination_id={}", id));
        }
        if let Some(reason) = &outcome.reason {
            line.push_str(&format!(" reason={:?}", reason));
        }
        writeln!(self.writer, "{}", line)?;
        // Flush per outcome: the log must be complete up to the current
        // record even if the run aborts
        self.writer.flush()?;
        Ok(())
    }
}
