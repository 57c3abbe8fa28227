//! tunebridge-import - CLI entry point
//!
//! Thin shell around the import engine: loads configuration, reads one
//! snapshot file, runs the import session against the destination
//! catalog, and reports aggregate counts plus the outcome log path.
//!
//! Exit code 0 on a completed run, even with per-record failures;
//! non-zero only for run-aborting errors (authorization failure,
//! unreadable or malformed snapshot).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tunebridge_common::config::Config;
use tunebridge_common::snapshot::read_snapshot_file;
use tunebridge_common::RecordKind;
use tunebridge_import::{FileOutcomeSink, HttpCatalogClient, ImportSession};

/// Command-line arguments for tunebridge-import
#[derive(Parser, Debug)]
#[command(name = "tunebridge-import")]
#[command(about = "Replay a library snapshot against the destination catalog")]
#[command(version)]
struct Args {
    /// Config file path (default: platform config dir)
    #[arg(long, env = "TUNEBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Outcome log path
    #[arg(long, default_value = "tunebridge-outcomes.log", env = "TUNEBRIDGE_OUTCOME_LOG")]
    outcome_log: PathBuf,

    /// Pre-authorized destination session token (supplied by the
    /// credential collaborator; never obtained here)
    #[arg(long, env = "TUNEBRIDGE_DEST_TOKEN", hide_env_values = true)]
    dest_token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import favorited tracks
    Tracks { snapshot: PathBuf },
    /// Import saved albums
    Albums { snapshot: PathBuf },
    /// Import followed artists
    Artists { snapshot: PathBuf },
    /// Import playlists (one row per track-in-playlist)
    Playlists { snapshot: PathBuf },
}

impl Command {
    fn kind(&self) -> RecordKind {
        match self {
            Command::Tracks { .. } => RecordKind::Track,
            Command::Albums { .. } => RecordKind::Album,
            Command::Artists { .. } => RecordKind::Artist,
            Command::Playlists { .. } => RecordKind::Playlist,
        }
    }

    fn snapshot(&self) -> &PathBuf {
        match self {
            Command::Tracks { snapshot }
            | Command::Albums { snapshot }
            | Command::Artists { snapshot }
            | Command::Playlists { snapshot } => snapshot,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunebridge_import=info,tunebridge_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting tunebridge-import");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config =
        Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    let kind = args.command.kind();
    let snapshot_path = args.command.snapshot();
    let all_records = read_snapshot_file(snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;

    // Keep only the rows matching the chosen import; mixed files happen
    // when a user points the wrong subcommand at an export
    let records: Vec<_> = all_records
        .iter()
        .filter(|r| r.kind == kind)
        .cloned()
        .collect();
    if records.len() < all_records.len() {
        warn!(
            expected = %kind,
            ignored = all_records.len() - records.len(),
            "Snapshot contains rows of other kinds; ignoring them"
        );
    }
    info!(kind = %kind, records = records.len(), "Snapshot loaded");

    let catalog = HttpCatalogClient::new(&config.destination_base_url, &args.dest_token)
        .context("Failed to build destination client")?;
    let sink = FileOutcomeSink::open(&args.outcome_log)
        .with_context(|| format!("Failed to open outcome log {}", args.outcome_log.display()))?;
    let log_path = sink.path().to_path_buf();

    let mut session = ImportSession::new(Arc::new(catalog), &config, Box::new(sink));

    // Ctrl-C stops between records, never mid-mutation
    let cancel = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the current record then stopping");
            cancel.cancel();
        }
    });

    let report = session
        .run(&records)
        .await
        .context("Import run aborted")?;

    println!("Import complete: {}", report.summary);
    println!("Outcome log: {}", log_path.display());

    Ok(())
}
