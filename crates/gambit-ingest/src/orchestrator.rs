//! The resumable snapshot-ingestion loop.
//!
//! States:
//!   CatalogCheck
//!     └─ ProcessRecords ⇄ FetchMore
//!          └─ Done(ThresholdReached | DataExhausted)
//!
//! Every step is idempotent: a crash anywhere leaves the store in a state
//! from which the next run picks up where this one stopped.

use gambit_core::{
  record::{FileMetadata, RecordQuery},
  snapshot::ExtractedRecord,
  store::CorpusStore,
};

use crate::{
  catalog,
  config::IngestConfig,
  error::{Error, Result},
  source::ArchiveSource,
  splitter::{PullOutcome, StreamSplitter},
};

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  ThresholdReached,
  DataExhausted,
}

/// Summary of one [`Orchestrator::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
  pub outcome:           Outcome,
  /// Snapshots in the store when the run stopped.
  pub snapshots:         u64,
  pub records_processed: u64,
  /// Records split out of archives downloaded during the run.
  pub records_fetched:   u64,
}

/// Summary of one [`Orchestrator::run_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
  pub filename:          String,
  /// `false` when the archive was already split by an earlier run.
  pub downloaded:        bool,
  pub records_fetched:   u64,
  pub records_processed: u64,
  pub snapshots:         u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  CatalogCheck,
  ProcessRecords,
  FetchMore,
  Done(Outcome),
}

/// Logs each time the snapshot count crosses a multiple of the interval.
struct Progress {
  interval: u64,
  bucket:   u64,
}

impl Progress {
  fn new(interval: u64, count: u64) -> Self {
    let interval = interval.max(1);
    Self { interval, bucket: count / interval }
  }

  fn update(&mut self, count: u64) {
    let bucket = count / self.interval;
    if bucket > self.bucket {
      self.bucket = bucket;
      tracing::info!(snapshots = count, "ingestion progress");
    }
  }
}

/// Result of one pass over the unprocessed backlog.
struct Pass {
  records:   u64,
  snapshots: u64,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct Orchestrator<'a, C, S> {
  store:  &'a C,
  source: &'a S,
  config: &'a IngestConfig,
}

impl<'a, C, S> Orchestrator<'a, C, S>
where
  C: CorpusStore,
  S: ArchiveSource,
{
  pub fn new(store: &'a C, source: &'a S, config: &'a IngestConfig) -> Self {
    Self { store, source, config }
  }

  fn splitter(&self) -> StreamSplitter<'a, C, S> {
    StreamSplitter::new(self.store, self.source, self.config.chunk_size)
  }

  async fn count_snapshots(&self) -> Result<u64> {
    self.store.count_snapshots().await.map_err(Error::store)
  }

  /// Populate the catalog if needed; a remote failure is logged, not fatal.
  async fn check_catalog(&self) -> Result<()> {
    match catalog::ensure_populated(self.store, self.source, &self.config.base_url).await {
      Ok(_) => Ok(()),
      Err(Error::Source(e)) => {
        tracing::warn!(error = %e, "could not read remote index; continuing with stored catalog");
        Ok(())
      }
      Err(e) => Err(e),
    }
  }

  /// Run until the snapshot threshold is reached or no archive is left.
  pub async fn run(&self) -> Result<RunReport> {
    let threshold = self.config.snapshots_threshold;
    let mut snapshots = self.count_snapshots().await?;
    let mut progress = Progress::new(self.config.print_interval, snapshots);
    let mut records_processed = 0u64;
    let mut records_fetched = 0u64;
    let mut state = State::CatalogCheck;

    let outcome = loop {
      state = match state {
        State::CatalogCheck => {
          self.check_catalog().await?;
          State::ProcessRecords
        }

        State::ProcessRecords => {
          if snapshots >= threshold {
            State::Done(Outcome::ThresholdReached)
          } else {
            let pass = self
              .process_backlog(None, Some(threshold), snapshots, &mut progress)
              .await?;
            records_processed += pass.records;
            snapshots = pass.snapshots;
            if pass.records > 0 || snapshots >= threshold {
              State::ProcessRecords
            } else {
              State::FetchMore
            }
          }
        }

        State::FetchMore => match self.next_archive().await? {
          None => State::Done(Outcome::DataExhausted),
          Some(entry) => match self.splitter().pull(&entry).await? {
            PullOutcome::Completed { fetched, inserted } => {
              records_fetched += fetched;
              if inserted == 0 {
                State::Done(Outcome::DataExhausted)
              } else {
                State::ProcessRecords
              }
            }
            // The entry stays unprocessed for the next run.
            PullOutcome::Failed(_) => State::Done(Outcome::DataExhausted),
          },
        },

        State::Done(outcome) => break outcome,
      };
    };

    let report = RunReport { outcome, snapshots, records_processed, records_fetched };
    tracing::info!(
      outcome = ?report.outcome,
      snapshots = report.snapshots,
      records_processed = report.records_processed,
      records_fetched = report.records_fetched,
      "ingestion finished"
    );
    Ok(report)
  }

  /// The smallest fitting archive not yet processed.
  async fn next_archive(&self) -> Result<Option<FileMetadata>> {
    let candidates = self
      .store
      .smallest_unprocessed_files(1, self.config.max_archive_size_gb)
      .await
      .map_err(Error::store)?;
    Ok(candidates.into_iter().next())
  }

  /// Split one named archive (unless already split) and extract all of its
  /// unprocessed records, regardless of the snapshot threshold.
  pub async fn run_file(&self, filename: &str) -> Result<FileReport> {
    self.check_catalog().await?;

    let entry = self
      .store
      .file_by_filename(filename.to_owned())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::UnknownFile(filename.to_owned()))?;

    let mut records_fetched = 0;
    let downloaded = !entry.processed;
    if downloaded {
      match self.splitter().pull(&entry).await? {
        PullOutcome::Completed { fetched, .. } => records_fetched = fetched,
        PullOutcome::Failed(e) => return Err(e.into()),
      }
    } else {
      tracing::info!(file = %entry.filename, "archive already split; extracting backlog only");
    }

    let snapshots = self.count_snapshots().await?;
    let mut progress = Progress::new(self.config.print_interval, snapshots);
    let pass = self
      .process_backlog(Some(entry.id), None, snapshots, &mut progress)
      .await?;

    Ok(FileReport {
      filename: entry.filename,
      downloaded,
      records_fetched,
      records_processed: pass.records,
      snapshots: pass.snapshots,
    })
  }

  /// Extract unprocessed records in id order, committing whenever
  /// `batch_size` snapshot rows are buffered. With a threshold, stops as soon
  /// as stored plus buffered snapshots reach it.
  async fn process_backlog(
    &self,
    file_id:   Option<i64>,
    threshold: Option<u64>,
    stored:    u64,
    progress:  &mut Progress,
  ) -> Result<Pass> {
    let batch_size = self.config.batch_size.max(1);
    let mut buffer: Vec<ExtractedRecord> = Vec::new();
    let mut buffered = 0usize;
    let mut stored = stored;
    let mut records = 0u64;
    let mut after_id = 0i64;

    'pages: loop {
      let page = self
        .store
        .unprocessed_raw_records(RecordQuery { file_id, after_id, limit: batch_size })
        .await
        .map_err(Error::store)?;
      if page.is_empty() {
        break;
      }

      for record in page {
        after_id = record.id;
        let extracted = gambit_pgn::extract(&record);
        buffered += extracted.snapshots.len();
        buffer.push(extracted);
        records += 1;
        progress.update(stored + buffered as u64);

        if buffered >= batch_size || buffer.len() >= batch_size {
          stored += self.commit(&mut buffer, &mut buffered).await?;
        }
        if threshold.is_some_and(|t| stored + buffered as u64 >= t) {
          break 'pages;
        }
      }
    }

    stored += self.commit(&mut buffer, &mut buffered).await?;
    Ok(Pass { records, snapshots: stored })
  }

  async fn commit(&self, buffer: &mut Vec<ExtractedRecord>, buffered: &mut usize) -> Result<u64> {
    if buffer.is_empty() {
      return Ok(0);
    }
    let rows = *buffered as u64;
    self
      .store
      .commit_extractions(std::mem::take(buffer))
      .await
      .map_err(Error::store)?;
    *buffered = 0;
    Ok(rows)
  }
}
