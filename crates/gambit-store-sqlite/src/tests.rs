//! Integration tests for `SqliteStore` against an in-memory database.

use gambit_core::{
  record::{NewFileMetadata, NewRawRecord, RecordQuery, SaveOutcome},
  snapshot::{
    ExtractedRecord, GameHeaders, INITIAL_FEN, NewGameSnapshot, NewGameStatistics,
    ProcessedSnapshot, Turn,
  },
  store::CorpusStore,
  vocabulary::{self, LegalMove},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn file(name: &str, size_gb: f64) -> NewFileMetadata {
  NewFileMetadata {
    url:      format!("https://example.test/standard/{name}"),
    filename: name.to_owned(),
    games:    100,
    size_gb,
  }
}

async fn seed_record(s: &SqliteStore, body: &str) -> i64 {
  let file_id = s.upsert_file(file("seed.pgn.zst", 0.1)).await.unwrap();
  s.save_raw_record(NewRawRecord::new(file_id, body)).await.unwrap().id()
}

fn snapshot(raw_record_id: i64, move_number: u32, san: &str, position: &str) -> NewGameSnapshot {
  NewGameSnapshot {
    raw_record_id,
    move_number,
    turn: if move_number % 2 == 1 { Turn::White } else { Turn::Black },
    san: san.to_owned(),
    position: position.to_owned(),
  }
}

fn extracted(raw_record_id: i64, plies: &[(&str, &str)]) -> ExtractedRecord {
  let snapshots: Vec<_> = plies
    .iter()
    .enumerate()
    .map(|(i, (san, fen))| snapshot(raw_record_id, i as u32 + 1, san, fen))
    .collect();
  let statistics = NewGameStatistics {
    raw_record_id,
    headers: GameHeaders {
      white: Some("alice".into()),
      white_rating: Some(1500),
      black_rating: Some(1700),
      ..Default::default()
    },
    total_moves: snapshots.len() as u32,
  };
  ExtractedRecord { raw_record_id, snapshots, statistics: Some(statistics) }
}

const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
const AFTER_E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_file_is_idempotent_on_url() {
  let s = store().await;

  let a = s.upsert_file(file("a.pgn.zst", 1.0)).await.unwrap();
  let b = s.upsert_file(file("a.pgn.zst", 9.0)).await.unwrap();
  assert_eq!(a, b);
  assert_eq!(s.count_files().await.unwrap(), 1);

  let stored = s.file_by_filename("a.pgn.zst".into()).await.unwrap().unwrap();
  assert_eq!(stored.size_gb, 1.0);
  assert_eq!(stored.games, 100);
  assert!(!stored.processed);
}

#[tokio::test]
async fn smallest_unprocessed_first_under_cap() {
  let s = store().await;
  s.upsert_file(file("small.pgn.zst", 0.2)).await.unwrap();
  s.upsert_file(file("big.pgn.zst", 5.0)).await.unwrap();
  s.upsert_file(file("mid.pgn.zst", 1.0)).await.unwrap();

  let picked = s.smallest_unprocessed_files(10, 2.0).await.unwrap();
  let sizes: Vec<f64> = picked.iter().map(|f| f.size_gb).collect();
  assert_eq!(sizes, [0.2, 1.0]);

  s.mark_file_processed(picked[0].id).await.unwrap();
  let next = s.smallest_unprocessed_files(1, 2.0).await.unwrap();
  assert_eq!(next.len(), 1);
  assert_eq!(next[0].filename, "mid.pgn.zst");

  s.mark_file_processed(next[0].id).await.unwrap();
  assert!(s.smallest_unprocessed_files(1, 2.0).await.unwrap().is_empty());
}

#[tokio::test]
async fn file_by_filename_missing_returns_none() {
  let s = store().await;
  assert!(s.file_by_filename("nope".into()).await.unwrap().is_none());
}

// ─── Raw records ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_bodies_are_stored_once() {
  let s = store().await;
  let file_id = s.upsert_file(file("a.pgn.zst", 1.0)).await.unwrap();

  let first = s
    .save_raw_record(NewRawRecord::new(file_id, "[Event \"x\"]\n\n1. e4 *"))
    .await
    .unwrap();
  let second = s
    .save_raw_record(NewRawRecord::new(file_id, "[Event \"x\"]\n\n1. e4 *"))
    .await
    .unwrap();

  assert!(matches!(first, SaveOutcome::Inserted(_)));
  assert_eq!(second, SaveOutcome::Existing(first.id()));
  assert_eq!(s.count_raw_records().await.unwrap(), 1);
}

#[tokio::test]
async fn unprocessed_records_page_by_id() {
  let s = store().await;
  let a = s.upsert_file(file("a.pgn.zst", 1.0)).await.unwrap();
  let b = s.upsert_file(file("b.pgn.zst", 1.0)).await.unwrap();

  let mut ids = Vec::new();
  for i in 0..5 {
    let owner = if i % 2 == 0 { a } else { b };
    let body = format!("[Event \"{i}\"]\n\n1. e4 *");
    ids.push(s.save_raw_record(NewRawRecord::new(owner, body)).await.unwrap().id());
  }
  s.mark_raw_record_processed(ids[0]).await.unwrap();

  let page = s.unprocessed_raw_records(RecordQuery::first_page(2)).await.unwrap();
  assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), [ids[1], ids[2]]);

  let rest = s
    .unprocessed_raw_records(RecordQuery { file_id: None, after_id: ids[2], limit: 10 })
    .await
    .unwrap();
  assert_eq!(rest.iter().map(|r| r.id).collect::<Vec<_>>(), [ids[3], ids[4]]);

  let only_a = s
    .unprocessed_raw_records(RecordQuery { file_id: Some(a), after_id: 0, limit: 10 })
    .await
    .unwrap();
  assert_eq!(only_a.iter().map(|r| r.id).collect::<Vec<_>>(), [ids[2], ids[4]]);
}

// ─── Snapshots & statistics ──────────────────────────────────────────────────

#[tokio::test]
async fn commit_persists_rows_and_flags_record() {
  let s = store().await;
  let id = seed_record(&s, "[Event \"t\"]\n\n1. e4 e5").await;

  s.commit_extractions(vec![extracted(id, &[("e4", AFTER_E4), ("e5", AFTER_E5)])])
    .await
    .unwrap();

  let snaps = s.snapshots_for_record(id).await.unwrap();
  assert_eq!(snaps.len(), 2);
  assert_eq!((snaps[0].move_number, snaps[0].turn), (1, Turn::White));
  assert_eq!((snaps[1].move_number, snaps[1].turn), (2, Turn::Black));
  assert_eq!(snaps[1].position, AFTER_E5);

  let stats = s.statistics_for_record(id).await.unwrap().unwrap();
  assert_eq!(stats.total_moves, 2);
  assert_eq!(stats.headers.white.as_deref(), Some("alice"));
  assert_eq!(stats.headers.black_rating, Some(1700));

  assert!(s.unprocessed_raw_records(RecordQuery::first_page(10)).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_extraction_still_flags_record() {
  let s = store().await;
  let id = seed_record(&s, "garbage").await;

  s.commit_extractions(vec![ExtractedRecord::empty(id)]).await.unwrap();

  assert!(s.unprocessed_raw_records(RecordQuery::first_page(10)).await.unwrap().is_empty());
  assert!(s.statistics_for_record(id).await.unwrap().is_none());
  assert_eq!(s.count_snapshots().await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_statistics_are_ignored() {
  let s = store().await;
  let id = seed_record(&s, "[Event \"t\"]\n\n1. e4").await;

  s.commit_extractions(vec![extracted(id, &[("e4", AFTER_E4)])]).await.unwrap();
  let mut again = extracted(id, &[]);
  again.statistics.as_mut().unwrap().total_moves = 99;
  s.commit_extractions(vec![again]).await.unwrap();

  let stats = s.statistics_for_record(id).await.unwrap().unwrap();
  assert_eq!(stats.total_moves, 1);
  assert_eq!(s.counts().await.unwrap().statistics, 1);
}

#[tokio::test]
async fn failed_commit_leaves_nothing_behind() {
  let s = store().await;
  let good = seed_record(&s, "[Event \"good\"]\n\n1. e4").await;

  // The second record references a raw record that does not exist, so the
  // foreign key check fails partway through the batch.
  let result = s
    .commit_extractions(vec![
      extracted(good, &[("e4", AFTER_E4)]),
      extracted(9_999, &[("e4", AFTER_E4)]),
    ])
    .await;
  assert!(result.is_err());

  assert_eq!(s.count_snapshots().await.unwrap(), 0);
  assert!(s.statistics_for_record(good).await.unwrap().is_none());
  let pending = s.unprocessed_raw_records(RecordQuery::first_page(10)).await.unwrap();
  assert_eq!(pending.len(), 1);
}

// ─── Vocabulary ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn vocabulary_round_trips_in_order() {
  let s = store().await;

  let generated: Vec<LegalMove> = vocabulary::generate().collect();
  let added = s.save_legal_moves(generated.clone()).await.unwrap();
  assert_eq!(added, generated.len() as u64);

  let again = s.save_legal_moves(generated.clone()).await.unwrap();
  assert_eq!(again, 0);

  assert_eq!(s.legal_moves().await.unwrap(), generated);
}

// ─── Processed snapshots ─────────────────────────────────────────────────────

#[tokio::test]
async fn pending_encodings_join_previous_position_and_ratings() {
  let s = store().await;
  let id = seed_record(&s, "[Event \"t\"]\n\n1. e4 e5").await;
  s.commit_extractions(vec![extracted(id, &[("e4", AFTER_E4), ("e5", AFTER_E5)])])
    .await
    .unwrap();

  let pending = s.pending_encodings(0, 10).await.unwrap();
  assert_eq!(pending.len(), 2);

  assert_eq!(pending[0].position_before, INITIAL_FEN);
  assert_eq!(pending[0].turn, Turn::White);
  assert_eq!(pending[0].san, "e4");
  assert_eq!(pending[1].position_before, AFTER_E4);
  assert_eq!(pending[1].turn, Turn::Black);
  assert_eq!(pending[1].white_rating, Some(1500));
  assert_eq!(pending[1].black_rating, Some(1700));

  let tail = s.pending_encodings(pending[0].snapshot_id, 10).await.unwrap();
  assert_eq!(tail.len(), 1);
  assert_eq!(tail[0].snapshot_id, pending[1].snapshot_id);
}

#[tokio::test]
async fn processed_snapshots_are_cached_once() {
  let s = store().await;
  let id = seed_record(&s, "[Event \"t\"]\n\n1. e4").await;
  s.commit_extractions(vec![extracted(id, &[("e4", AFTER_E4)])]).await.unwrap();
  let snapshot_id = s.pending_encodings(0, 1).await.unwrap()[0].snapshot_id;

  assert_eq!(s.last_processed_snapshot_id().await.unwrap(), None);

  let row = ProcessedSnapshot {
    snapshot_id,
    board: vec![0.0, 1.0, 0.5],
    metadata: vec![-0.75, 0.25, 1.0, 0.0],
    chosen_move_index: 7,
    valid_moves: vec![1.0, 0.0],
  };
  assert_eq!(s.save_processed_snapshots(vec![row.clone()]).await.unwrap(), 1);

  let mut changed = row.clone();
  changed.chosen_move_index = 8;
  assert_eq!(s.save_processed_snapshots(vec![changed]).await.unwrap(), 0);

  assert_eq!(s.processed_snapshots(vec![snapshot_id, 12_345]).await.unwrap(), [row]);
  assert_eq!(s.last_processed_snapshot_id().await.unwrap(), Some(snapshot_id));
  assert!(s.pending_encodings(0, 10).await.unwrap().is_empty());
}

// ─── Reporting ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn counts_cover_every_table() {
  let s = store().await;
  let id = seed_record(&s, "[Event \"t\"]\n\n1. e4").await;
  seed_record(&s, "[Event \"u\"]\n\n1. d4").await;
  s.commit_extractions(vec![extracted(id, &[("e4", AFTER_E4)])]).await.unwrap();
  s.save_legal_moves(vocabulary::generate().take(3).collect()).await.unwrap();

  let counts = s.counts().await.unwrap();
  assert_eq!(counts.files, 1);
  assert_eq!(counts.files_processed, 0);
  assert_eq!(counts.raw_records, 2);
  assert_eq!(counts.raw_records_pending, 1);
  assert_eq!(counts.snapshots, 1);
  assert_eq!(counts.statistics, 1);
  assert_eq!(counts.legal_moves, 3);
  assert_eq!(counts.processed_snapshots, 0);
}
