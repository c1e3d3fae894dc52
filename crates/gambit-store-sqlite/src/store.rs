//! [`SqliteStore`], the SQLite implementation of [`CorpusStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;

use gambit_core::{
  record::{FileMetadata, NewFileMetadata, NewRawRecord, RawRecord, RecordQuery, SaveOutcome},
  snapshot::{
    CorpusCounts, EncodingInput, ExtractedRecord, GameSnapshot, GameStatistics,
    ProcessedSnapshot,
  },
  store::CorpusStore,
  vocabulary::LegalMove,
};

use crate::{
  Error, Result,
  encode::{
    FILE_COLUMNS, PROCESSED_COLUMNS, RAW_RECORD_COLUMNS, RawEncodingInput, RawFile,
    RawLegalMove, RawProcessedSnapshot, RawSnapshot, RawStatistics, SNAPSHOT_COLUMNS,
    STATISTICS_COLUMNS, encode_count, encode_f32s, encode_piece_types, raw_record_from_row,
  },
  schema::SCHEMA,
};

fn count(conn: &rusqlite::Connection, sql: &str) -> rusqlite::Result<u64> {
  let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
  Ok(n.max(0) as u64)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A gambit corpus store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "opening corpus store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CorpusStore impl ────────────────────────────────────────────────────────

impl CorpusStore for SqliteStore {
  type Error = Error;

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn count_files(&self) -> Result<u64> {
    let n = self
      .conn
      .call(|conn| Ok(count(conn, "SELECT COUNT(*) FROM files_metadata")?))
      .await?;
    Ok(n)
  }

  async fn upsert_file(&self, file: NewFileMetadata) -> Result<i64> {
    let games = encode_count(file.games);

    let id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO files_metadata (url, filename, games, size_gb)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(url) DO NOTHING",
          rusqlite::params![file.url, file.filename, games, file.size_gb],
        )?;
        let id: i64 = tx.query_row(
          "SELECT id FROM files_metadata WHERE url = ?1",
          rusqlite::params![file.url],
          |r| r.get(0),
        )?;
        tx.commit()?;
        Ok(id)
      })
      .await?;
    Ok(id)
  }

  async fn smallest_unprocessed_files(
    &self,
    limit:       usize,
    max_size_gb: f64,
  ) -> Result<Vec<FileMetadata>> {
    let limit = limit as i64;

    let raws: Vec<RawFile> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FILE_COLUMNS} FROM files_metadata
           WHERE processed = 0 AND size_gb < ?1
           ORDER BY size_gb, id
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![max_size_gb, limit], RawFile::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFile::into_file).collect()
  }

  async fn file_by_filename(&self, filename: String) -> Result<Option<FileMetadata>> {
    let raw: Option<RawFile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {FILE_COLUMNS} FROM files_metadata
                 WHERE filename = ?1 ORDER BY id LIMIT 1"
              ),
              rusqlite::params![filename],
              RawFile::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFile::into_file).transpose()
  }

  async fn mark_file_processed(&self, file_id: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE files_metadata SET processed = 1 WHERE id = ?1",
          rusqlite::params![file_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Raw records ───────────────────────────────────────────────────────────

  async fn save_raw_record(&self, record: NewRawRecord) -> Result<SaveOutcome> {
    let (file_id, body, hash) = record.into_parts();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT INTO raw_records (file_id, body, content_hash)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(content_hash) DO NOTHING",
          rusqlite::params![file_id, body, hash],
        )?;
        let outcome = if inserted == 1 {
          SaveOutcome::Inserted(tx.last_insert_rowid())
        } else {
          let id: i64 = tx.query_row(
            "SELECT id FROM raw_records WHERE content_hash = ?1",
            rusqlite::params![hash],
            |r| r.get(0),
          )?;
          SaveOutcome::Existing(id)
        };
        tx.commit()?;
        Ok(outcome)
      })
      .await?;
    Ok(outcome)
  }

  async fn unprocessed_raw_records(&self, query: RecordQuery) -> Result<Vec<RawRecord>> {
    let limit = query.limit as i64;

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RAW_RECORD_COLUMNS} FROM raw_records
           WHERE processed = 0
             AND id > ?1
             AND (?2 IS NULL OR file_id = ?2)
           ORDER BY id
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![query.after_id, query.file_id, limit],
            raw_record_from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn mark_raw_record_processed(&self, record_id: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE raw_records SET processed = 1 WHERE id = ?1",
          rusqlite::params![record_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn count_raw_records(&self) -> Result<u64> {
    let n = self
      .conn
      .call(|conn| Ok(count(conn, "SELECT COUNT(*) FROM raw_records")?))
      .await?;
    Ok(n)
  }

  // ── Snapshots & statistics ────────────────────────────────────────────────

  async fn commit_extractions(&self, batch: Vec<ExtractedRecord>) -> Result<()> {
    if batch.is_empty() {
      return Ok(());
    }
    let records = batch.len();

    let snapshots = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut snapshots = 0usize;
        {
          let mut insert_stats = tx.prepare_cached(
            "INSERT OR IGNORE INTO game_statistics (
               raw_record_id, event, site, date, round, white, black, result,
               white_rating, black_rating, white_rating_diff, black_rating_diff,
               time_control, opening_code, opening_name, termination,
               utc_date, utc_time, variant, source_url, total_moves
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
          )?;
          let mut insert_snapshot = tx.prepare_cached(
            "INSERT INTO game_snapshots (raw_record_id, move_number, turn, move, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          let mut mark = tx.prepare_cached("UPDATE raw_records SET processed = 1 WHERE id = ?1")?;

          for record in &batch {
            if let Some(stats) = &record.statistics {
              let h = &stats.headers;
              insert_stats.execute(rusqlite::params![
                stats.raw_record_id,
                h.event,
                h.site,
                h.date,
                h.round,
                h.white,
                h.black,
                h.result,
                h.white_rating,
                h.black_rating,
                h.white_rating_diff,
                h.black_rating_diff,
                h.time_control,
                h.opening_code,
                h.opening_name,
                h.termination,
                h.utc_date,
                h.utc_time,
                h.variant,
                h.source_url,
                stats.total_moves,
              ])?;
            }
            for s in &record.snapshots {
              insert_snapshot.execute(rusqlite::params![
                s.raw_record_id,
                s.move_number,
                s.turn.as_str(),
                s.san,
                s.position,
              ])?;
            }
            snapshots += record.snapshots.len();
            mark.execute(rusqlite::params![record.raw_record_id])?;
          }
        }
        tx.commit()?;
        Ok(snapshots)
      })
      .await?;

    tracing::debug!(records, snapshots, "committed extraction batch");
    Ok(())
  }

  async fn count_snapshots(&self) -> Result<u64> {
    let n = self
      .conn
      .call(|conn| Ok(count(conn, "SELECT COUNT(*) FROM game_snapshots")?))
      .await?;
    Ok(n)
  }

  async fn snapshots_for_record(&self, raw_record_id: i64) -> Result<Vec<GameSnapshot>> {
    let raws: Vec<RawSnapshot> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SNAPSHOT_COLUMNS} FROM game_snapshots
           WHERE raw_record_id = ?1
           ORDER BY move_number"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![raw_record_id], RawSnapshot::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSnapshot::into_snapshot).collect()
  }

  async fn statistics_for_record(&self, raw_record_id: i64) -> Result<Option<GameStatistics>> {
    let raw: Option<RawStatistics> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {STATISTICS_COLUMNS} FROM game_statistics WHERE raw_record_id = ?1"),
              rusqlite::params![raw_record_id],
              RawStatistics::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStatistics::into_statistics).transpose()
  }

  // ── Vocabulary ────────────────────────────────────────────────────────────

  async fn save_legal_moves(&self, moves: Vec<LegalMove>) -> Result<u64> {
    let rows = moves
      .into_iter()
      .map(|m| Ok((m.mv, encode_piece_types(&m.piece_types)?)))
      .collect::<Result<Vec<_>>>()?;

    let added = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut added = 0u64;
        {
          let mut stmt =
            tx.prepare_cached("INSERT OR IGNORE INTO legal_moves (move, piece_types) VALUES (?1, ?2)")?;
          for (mv, piece_types) in &rows {
            added += stmt.execute(rusqlite::params![mv, piece_types])? as u64;
          }
        }
        tx.commit()?;
        Ok(added)
      })
      .await?;
    Ok(added)
  }

  async fn legal_moves(&self) -> Result<Vec<LegalMove>> {
    let raws: Vec<RawLegalMove> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT move, piece_types FROM legal_moves ORDER BY id")?;
        let rows = stmt
          .query_map([], |row| Ok(RawLegalMove { mv: row.get(0)?, piece_types: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLegalMove::into_legal_move).collect()
  }

  // ── Processed snapshots ───────────────────────────────────────────────────

  async fn last_processed_snapshot_id(&self) -> Result<Option<i64>> {
    let id = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT MAX(snapshot_id) FROM processed_snapshots", [], |r| {
          r.get::<_, Option<i64>>(0)
        })?)
      })
      .await?;
    Ok(id)
  }

  async fn pending_encodings(&self, after_id: i64, limit: usize) -> Result<Vec<EncodingInput>> {
    let limit = limit as i64;

    let raws: Vec<RawEncodingInput> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             s.id, s.move_number, s.turn, s.move,
             prev.position   AS previous_position,
             st.white_rating,
             st.black_rating
           FROM game_snapshots s
           LEFT JOIN game_snapshots prev
             ON prev.raw_record_id = s.raw_record_id
            AND prev.move_number   = s.move_number - 1
           LEFT JOIN game_statistics st     ON st.raw_record_id = s.raw_record_id
           LEFT JOIN processed_snapshots ps ON ps.snapshot_id   = s.id
           WHERE s.id > ?1
             AND ps.snapshot_id IS NULL
           ORDER BY s.id
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![after_id, limit], RawEncodingInput::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEncodingInput::into_input).collect()
  }

  async fn save_processed_snapshots(&self, rows: Vec<ProcessedSnapshot>) -> Result<u64> {
    let encoded: Vec<_> = rows
      .into_iter()
      .map(|p| {
        (
          p.snapshot_id,
          encode_f32s(&p.board),
          encode_f32s(&p.metadata),
          p.chosen_move_index,
          encode_f32s(&p.valid_moves),
        )
      })
      .collect();

    let added = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut added = 0u64;
        {
          let mut stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO processed_snapshots (
               snapshot_id, board_encoding, metadata_encoding,
               chosen_move_index, valid_moves_mask
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for (id, board, metadata, chosen, mask) in &encoded {
            added += stmt.execute(rusqlite::params![id, board, metadata, chosen, mask])? as u64;
          }
        }
        tx.commit()?;
        Ok(added)
      })
      .await?;
    Ok(added)
  }

  async fn processed_snapshots(&self, snapshot_ids: Vec<i64>) -> Result<Vec<ProcessedSnapshot>> {
    let raws: Vec<RawProcessedSnapshot> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PROCESSED_COLUMNS} FROM processed_snapshots WHERE snapshot_id = ?1"
        ))?;
        let mut rows = Vec::with_capacity(snapshot_ids.len());
        for id in snapshot_ids {
          if let Some(row) = stmt
            .query_row(rusqlite::params![id], RawProcessedSnapshot::from_row)
            .optional()?
          {
            rows.push(row);
          }
        }
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProcessedSnapshot::into_processed).collect()
  }

  // ── Reporting ─────────────────────────────────────────────────────────────

  async fn counts(&self) -> Result<CorpusCounts> {
    let counts = self
      .conn
      .call(|conn| {
        Ok(CorpusCounts {
          files:               count(conn, "SELECT COUNT(*) FROM files_metadata")?,
          files_processed:     count(conn, "SELECT COUNT(*) FROM files_metadata WHERE processed = 1")?,
          raw_records:         count(conn, "SELECT COUNT(*) FROM raw_records")?,
          raw_records_pending: count(conn, "SELECT COUNT(*) FROM raw_records WHERE processed = 0")?,
          snapshots:           count(conn, "SELECT COUNT(*) FROM game_snapshots")?,
          statistics:          count(conn, "SELECT COUNT(*) FROM game_statistics")?,
          legal_moves:         count(conn, "SELECT COUNT(*) FROM legal_moves")?,
          processed_snapshots: count(conn, "SELECT COUNT(*) FROM processed_snapshots")?,
        })
      })
      .await?;
    Ok(counts)
  }
}
