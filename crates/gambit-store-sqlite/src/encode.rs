//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Numeric tensors are stored as blobs of little-endian `f32` values. Piece
//! kind sets are stored as compact JSON arrays. Counts that the domain keeps
//! unsigned are stored as SQLite integers and range-checked on the way out.

use std::collections::BTreeSet;

use gambit_core::{
  record::{FileMetadata, RawRecord},
  snapshot::{
    EncodingInput, GameHeaders, GameSnapshot, GameStatistics, INITIAL_FEN, ProcessedSnapshot,
  },
  vocabulary::{LegalMove, PieceKind},
};

use crate::{Error, Result};

// ─── f32 blobs ───────────────────────────────────────────────────────────────

pub fn encode_f32s(values: &[f32]) -> Vec<u8> {
  values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_f32s(column: &'static str, bytes: &[u8]) -> Result<Vec<f32>> {
  if bytes.len() % 4 != 0 {
    return Err(Error::BlobLength { column, len: bytes.len() });
  }
  Ok(
    bytes
      .chunks_exact(4)
      .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
      .collect(),
  )
}

// ─── Piece kinds ─────────────────────────────────────────────────────────────

pub fn encode_piece_types(kinds: &BTreeSet<PieceKind>) -> Result<String> {
  Ok(serde_json::to_string(kinds)?)
}

pub fn decode_piece_types(s: &str) -> Result<BTreeSet<PieceKind>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Integers ────────────────────────────────────────────────────────────────

fn decode_u32(column: &'static str, value: i64) -> Result<u32> {
  u32::try_from(value).map_err(|_| Error::OutOfRange { column, value })
}

fn decode_u64(column: &'static str, value: i64) -> Result<u64> {
  u64::try_from(value).map_err(|_| Error::OutOfRange { column, value })
}

pub fn encode_count(value: u64) -> i64 { i64::try_from(value).unwrap_or(i64::MAX) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const FILE_COLUMNS: &str = "id, url, filename, games, size_gb, processed";

/// A `files_metadata` row as read from SQLite.
pub struct RawFile {
  pub id:        i64,
  pub url:       String,
  pub filename:  String,
  pub games:     i64,
  pub size_gb:   f64,
  pub processed: bool,
}

impl RawFile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:        row.get(0)?,
      url:       row.get(1)?,
      filename:  row.get(2)?,
      games:     row.get(3)?,
      size_gb:   row.get(4)?,
      processed: row.get(5)?,
    })
  }

  pub fn into_file(self) -> Result<FileMetadata> {
    Ok(FileMetadata {
      id:        self.id,
      url:       self.url,
      filename:  self.filename,
      games:     decode_u64("games", self.games)?,
      size_gb:   self.size_gb,
      processed: self.processed,
    })
  }
}

pub const RAW_RECORD_COLUMNS: &str = "id, file_id, body, content_hash, processed";

pub fn raw_record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
  Ok(RawRecord {
    id:           row.get(0)?,
    file_id:      row.get(1)?,
    body:         row.get(2)?,
    content_hash: row.get(3)?,
    processed:    row.get(4)?,
  })
}

pub const SNAPSHOT_COLUMNS: &str = "id, raw_record_id, move_number, turn, move, position";

/// A `game_snapshots` row as read from SQLite.
pub struct RawSnapshot {
  pub id:            i64,
  pub raw_record_id: i64,
  pub move_number:   i64,
  pub turn:          String,
  pub san:           String,
  pub position:      String,
}

impl RawSnapshot {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      raw_record_id: row.get(1)?,
      move_number:   row.get(2)?,
      turn:          row.get(3)?,
      san:           row.get(4)?,
      position:      row.get(5)?,
    })
  }

  pub fn into_snapshot(self) -> Result<GameSnapshot> {
    Ok(GameSnapshot {
      id:            self.id,
      raw_record_id: self.raw_record_id,
      move_number:   decode_u32("move_number", self.move_number)?,
      turn:          self.turn.parse()?,
      san:           self.san,
      position:      self.position,
    })
  }
}

pub const STATISTICS_COLUMNS: &str = "id, raw_record_id, event, site, date, round, white, \
  black, result, white_rating, black_rating, white_rating_diff, black_rating_diff, \
  time_control, opening_code, opening_name, termination, utc_date, utc_time, variant, \
  source_url, total_moves";

/// A `game_statistics` row as read from SQLite.
pub struct RawStatistics {
  pub id:            i64,
  pub raw_record_id: i64,
  pub headers:       GameHeaders,
  pub total_moves:   i64,
}

impl RawStatistics {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      raw_record_id: row.get(1)?,
      headers:       GameHeaders {
        event:             row.get(2)?,
        site:              row.get(3)?,
        date:              row.get(4)?,
        round:             row.get(5)?,
        white:             row.get(6)?,
        black:             row.get(7)?,
        result:            row.get(8)?,
        white_rating:      row.get(9)?,
        black_rating:      row.get(10)?,
        white_rating_diff: row.get(11)?,
        black_rating_diff: row.get(12)?,
        time_control:      row.get(13)?,
        opening_code:      row.get(14)?,
        opening_name:      row.get(15)?,
        termination:       row.get(16)?,
        utc_date:          row.get(17)?,
        utc_time:          row.get(18)?,
        variant:           row.get(19)?,
        source_url:        row.get(20)?,
      },
      total_moves:   row.get(21)?,
    })
  }

  pub fn into_statistics(self) -> Result<GameStatistics> {
    Ok(GameStatistics {
      id:            self.id,
      raw_record_id: self.raw_record_id,
      headers:       self.headers,
      total_moves:   decode_u32("total_moves", self.total_moves)?,
    })
  }
}

/// A `legal_moves` row as read from SQLite.
pub struct RawLegalMove {
  pub mv:          String,
  pub piece_types: String,
}

impl RawLegalMove {
  pub fn into_legal_move(self) -> Result<LegalMove> {
    Ok(LegalMove { mv: self.mv, piece_types: decode_piece_types(&self.piece_types)? })
  }
}

pub const PROCESSED_COLUMNS: &str =
  "snapshot_id, board_encoding, metadata_encoding, chosen_move_index, valid_moves_mask";

/// A `processed_snapshots` row as read from SQLite.
pub struct RawProcessedSnapshot {
  pub snapshot_id:       i64,
  pub board:             Vec<u8>,
  pub metadata:          Vec<u8>,
  pub chosen_move_index: i64,
  pub valid_moves:       Vec<u8>,
}

impl RawProcessedSnapshot {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      snapshot_id:       row.get(0)?,
      board:             row.get(1)?,
      metadata:          row.get(2)?,
      chosen_move_index: row.get(3)?,
      valid_moves:       row.get(4)?,
    })
  }

  pub fn into_processed(self) -> Result<ProcessedSnapshot> {
    Ok(ProcessedSnapshot {
      snapshot_id:       self.snapshot_id,
      board:             decode_f32s("board_encoding", &self.board)?,
      metadata:          decode_f32s("metadata_encoding", &self.metadata)?,
      chosen_move_index: decode_u32("chosen_move_index", self.chosen_move_index)?,
      valid_moves:       decode_f32s("valid_moves_mask", &self.valid_moves)?,
    })
  }
}

/// A snapshot joined with its predecessor's position and its game's ratings.
pub struct RawEncodingInput {
  pub snapshot_id:       i64,
  pub move_number:       i64,
  pub turn:              String,
  pub san:               String,
  pub previous_position: Option<String>,
  pub white_rating:      Option<i32>,
  pub black_rating:      Option<i32>,
}

impl RawEncodingInput {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      snapshot_id:       row.get(0)?,
      move_number:       row.get(1)?,
      turn:              row.get(2)?,
      san:               row.get(3)?,
      previous_position: row.get(4)?,
      white_rating:      row.get(5)?,
      black_rating:      row.get(6)?,
    })
  }

  /// The first ply is played from the initial position. A later ply with no
  /// stored predecessor gets an empty position, which the encoder rejects.
  pub fn into_input(self) -> Result<EncodingInput> {
    let position_before = match (self.previous_position, self.move_number) {
      (Some(fen), _) => fen,
      (None, 1) => INITIAL_FEN.to_owned(),
      (None, _) => String::new(),
    };
    Ok(EncodingInput {
      snapshot_id: self.snapshot_id,
      turn: self.turn.parse()?,
      san: self.san,
      position_before,
      white_rating: self.white_rating,
      black_rating: self.black_rating,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn f32_blob_is_little_endian() {
    let bytes = encode_f32s(&[1.0, -0.5]);
    assert_eq!(bytes, [0, 0, 128, 63, 0, 0, 0, 191]);
    assert_eq!(decode_f32s("x", &bytes).unwrap(), [1.0, -0.5]);
  }

  #[test]
  fn truncated_blob_is_rejected() {
    assert!(matches!(
      decode_f32s("board_encoding", &[0, 0, 128]),
      Err(Error::BlobLength { column: "board_encoding", len: 3 })
    ));
  }

  #[test]
  fn piece_types_are_a_json_array() {
    let kinds = BTreeSet::from([PieceKind::Queen, PieceKind::Rook]);
    let json = encode_piece_types(&kinds).unwrap();
    assert_eq!(json, r#"["rook","queen"]"#);
    assert_eq!(decode_piece_types(&json).unwrap(), kinds);
  }
}
