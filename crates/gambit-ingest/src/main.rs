//! `gambit`: builds the chess training corpus.
//!
//! # Usage
//!
//! ```text
//! gambit ingest                      # snapshots, vocabulary, encodings
//! gambit snapshots --threshold 50000
//! gambit file lichess_db_standard_rated_2013-01.pgn.zst
//! gambit vocabulary
//! gambit encode --limit 100000
//! gambit status
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use gambit_core::store::CorpusStore;
use gambit_ingest::{
  IngestConfig, Orchestrator,
  encode::{Encoder, encode_pending},
  source::HttpSource,
  vocabulary::{fill_vocabulary, load_vocabulary},
};
use gambit_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "gambit", author, version, about = "Chess training-corpus ingestion")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "gambit.toml")]
  config: PathBuf,

  /// SQLite database file; overrides `database_path`.
  #[arg(long, env = "GAMBIT_DATABASE_PATH")]
  database: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run the whole pipeline: snapshots, vocabulary, then encodings.
  Ingest {
    #[arg(long)]
    threshold: Option<u64>,
    /// Encode at most this many snapshots.
    #[arg(long)]
    limit:     Option<u64>,
  },
  /// Download and extract until the snapshot threshold is reached.
  Snapshots {
    #[arg(long)]
    threshold: Option<u64>,
  },
  /// Download and extract one named archive.
  File { filename: String },
  /// Store the move vocabulary.
  Vocabulary,
  /// Encode snapshots that have no cached encoding yet.
  Encode {
    #[arg(long)]
    limit: Option<u64>,
  },
  /// Print row counts of every table as JSON.
  Status,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let mut config = IngestConfig::load(&cli.config)
    .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
  if let Some(database) = cli.database {
    config.database_path = database;
  }

  let store = SqliteStore::open(&config.database_path)
    .await
    .with_context(|| format!("failed to open store at {}", config.database_path.display()))?;

  match cli.command {
    Command::Ingest { threshold, limit } => {
      if let Some(threshold) = threshold {
        config.snapshots_threshold = threshold;
      }
      snapshots(&store, &config).await?;
      fill_vocabulary(&store).await.context("vocabulary fill failed")?;
      encode(&store, &config, limit).await?;
    }
    Command::Snapshots { threshold } => {
      if let Some(threshold) = threshold {
        config.snapshots_threshold = threshold;
      }
      snapshots(&store, &config).await?;
    }
    Command::File { filename } => {
      let source = HttpSource::new().context("failed to build HTTP client")?;
      let report = Orchestrator::new(&store, &source, &config)
        .run_file(&filename)
        .await
        .with_context(|| format!("ingesting {filename} failed"))?;
      tracing::info!(
        file = %report.filename,
        downloaded = report.downloaded,
        fetched = report.records_fetched,
        processed = report.records_processed,
        snapshots = report.snapshots,
        "file ingested"
      );
    }
    Command::Vocabulary => {
      fill_vocabulary(&store).await.context("vocabulary fill failed")?;
    }
    Command::Encode { limit } => encode(&store, &config, limit).await?,
    Command::Status => {
      let counts = store.counts().await.context("failed to read counts")?;
      println!("{}", serde_json::to_string_pretty(&counts)?);
    }
  }

  Ok(())
}

async fn snapshots(store: &SqliteStore, config: &IngestConfig) -> anyhow::Result<()> {
  let source = HttpSource::new().context("failed to build HTTP client")?;
  Orchestrator::new(store, &source, config)
    .run()
    .await
    .context("snapshot ingestion failed")?;
  Ok(())
}

async fn encode(store: &SqliteStore, config: &IngestConfig, limit: Option<u64>) -> anyhow::Result<()> {
  let vocabulary = load_vocabulary(store).await.context("failed to load vocabulary")?;
  let encoder = Encoder::new(vocabulary);
  encode_pending(store, &encoder, config.batch_size, config.print_interval, limit)
    .await
    .context("encoding failed")?;
  Ok(())
}
