//! The `CorpusStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `gambit-store-sqlite`).
//! The ingestion pipeline depends on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  record::{FileMetadata, NewFileMetadata, NewRawRecord, RawRecord, RecordQuery, SaveOutcome},
  snapshot::{
    CorpusCounts, EncodingInput, ExtractedRecord, GameSnapshot, GameStatistics,
    ProcessedSnapshot,
  },
  vocabulary::LegalMove,
};

/// Abstraction over a corpus store backend.
///
/// Raw records, snapshots, statistics and vocabulary rows are append-only.
/// The only mutations are the monotonic `processed` flags on catalog entries
/// and raw records.
///
/// All methods return `Send` futures so the trait can be driven from a
/// multi-threaded tokio runtime.
pub trait CorpusStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Catalog ───────────────────────────────────────────────────────────

  fn count_files(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Insert a catalog entry unless its URL is already known. Either way the
  /// id of the row holding that URL is returned.
  fn upsert_file(
    &self,
    file: NewFileMetadata,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Up to `limit` unprocessed entries strictly smaller than `max_size_gb`,
  /// smallest first.
  fn smallest_unprocessed_files(
    &self,
    limit: usize,
    max_size_gb: f64,
  ) -> impl Future<Output = Result<Vec<FileMetadata>, Self::Error>> + Send + '_;

  fn file_by_filename(
    &self,
    filename: String,
  ) -> impl Future<Output = Result<Option<FileMetadata>, Self::Error>> + Send + '_;

  /// Flag an entry as fully split. Never reversed.
  fn mark_file_processed(
    &self,
    file_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Raw records ───────────────────────────────────────────────────────

  /// Store a record unless a byte-identical one exists. The check and the
  /// insert are a single atomic operation.
  fn save_raw_record(
    &self,
    record: NewRawRecord,
  ) -> impl Future<Output = Result<SaveOutcome, Self::Error>> + Send + '_;

  /// One page of records still waiting for extraction, ordered by id.
  fn unprocessed_raw_records(
    &self,
    query: RecordQuery,
  ) -> impl Future<Output = Result<Vec<RawRecord>, Self::Error>> + Send + '_;

  fn mark_raw_record_processed(
    &self,
    record_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn count_raw_records(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Snapshots & statistics ────────────────────────────────────────────

  /// Persist the derived rows of a batch of records and flag each record as
  /// processed, all in one transaction. Statistics rows for a record that
  /// already has one are ignored.
  fn commit_extractions(
    &self,
    batch: Vec<ExtractedRecord>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn count_snapshots(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// All snapshots of one record in replay order.
  fn snapshots_for_record(
    &self,
    raw_record_id: i64,
  ) -> impl Future<Output = Result<Vec<GameSnapshot>, Self::Error>> + Send + '_;

  fn statistics_for_record(
    &self,
    raw_record_id: i64,
  ) -> impl Future<Output = Result<Option<GameStatistics>, Self::Error>> + Send + '_;

  // ── Vocabulary ────────────────────────────────────────────────────────

  /// Insert vocabulary entries in the given order, skipping moves already
  /// present. Returns how many rows were added.
  fn save_legal_moves(
    &self,
    moves: Vec<LegalMove>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// The stored vocabulary in canonical (insertion) order.
  fn legal_moves(&self) -> impl Future<Output = Result<Vec<LegalMove>, Self::Error>> + Send + '_;

  // ── Processed snapshots ───────────────────────────────────────────────

  /// Highest snapshot id that already has a cached encoding.
  fn last_processed_snapshot_id(
    &self,
  ) -> impl Future<Output = Result<Option<i64>, Self::Error>> + Send + '_;

  /// Up to `limit` snapshots after `after_id` with no cached encoding,
  /// ordered by id and joined with what the encoder needs.
  fn pending_encodings(
    &self,
    after_id: i64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<EncodingInput>, Self::Error>> + Send + '_;

  /// Cache encodings; rows for snapshots already cached are ignored. Returns
  /// how many rows were added.
  fn save_processed_snapshots(
    &self,
    rows: Vec<ProcessedSnapshot>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn processed_snapshots(
    &self,
    snapshot_ids: Vec<i64>,
  ) -> impl Future<Output = Result<Vec<ProcessedSnapshot>, Self::Error>> + Send + '_;

  // ── Reporting ─────────────────────────────────────────────────────────

  fn counts(&self) -> impl Future<Output = Result<CorpusCounts, Self::Error>> + Send + '_;
}
