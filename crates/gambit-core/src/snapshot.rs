//! Per-ply snapshots, per-game statistics and their cached encodings.
//!
//! Snapshots and statistics are derived from a raw record exactly once and
//! are never updated afterwards. Processed snapshots are a cache keyed by
//! snapshot id.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

// ─── Turn ────────────────────────────────────────────────────────────────────

/// The colour of the player who made a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Turn {
  #[serde(rename = "w")]
  White,
  #[serde(rename = "b")]
  Black,
}

impl Turn {
  /// The single-letter marker stored in the `turn` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::White => "w",
      Self::Black => "b",
    }
  }
}

impl fmt::Display for Turn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Turn {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "w" => Ok(Self::White),
      "b" => Ok(Self::Black),
      other => Err(Error::InvalidTurn(other.to_owned())),
    }
  }
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

/// FEN of the standard starting position; the board before the first ply.
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// One ply of a replayed game, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGameSnapshot {
  pub raw_record_id: i64,
  /// 1-based ply index in replay order.
  pub move_number:   u32,
  pub turn:          Turn,
  /// The move in standard algebraic notation, including any check suffix.
  pub san:           String,
  /// FEN of the board after the move was played.
  pub position:      String,
}

/// A persisted snapshot row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
  pub id:            i64,
  pub raw_record_id: i64,
  pub move_number:   u32,
  pub turn:          Turn,
  pub san:           String,
  pub position:      String,
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Header fields read from a game's tag-pair section. Every field is optional
/// because real archives omit tags freely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameHeaders {
  pub event:             Option<String>,
  pub site:              Option<String>,
  pub date:              Option<String>,
  pub round:             Option<String>,
  pub white:             Option<String>,
  pub black:             Option<String>,
  pub result:            Option<String>,
  pub white_rating:      Option<i32>,
  pub black_rating:      Option<i32>,
  pub white_rating_diff: Option<i32>,
  pub black_rating_diff: Option<i32>,
  pub time_control:      Option<String>,
  /// ECO classification, e.g. `C20`.
  pub opening_code:      Option<String>,
  pub opening_name:      Option<String>,
  pub termination:       Option<String>,
  /// `YYYY.MM.DD`.
  pub utc_date:          Option<String>,
  /// `HH:MM:SS`.
  pub utc_time:          Option<String>,
  pub variant:           Option<String>,
  /// The `Site` tag when it is an http(s) link back to the game.
  pub source_url:        Option<String>,
}

impl GameHeaders {
  /// Combine `utc_date` and `utc_time` into a timestamp when both parse.
  pub fn played_at(&self) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(self.utc_date.as_deref()?, "%Y.%m.%d").ok()?;
    let time = NaiveTime::parse_from_str(self.utc_time.as_deref()?, "%H:%M:%S").ok()?;
    Some(NaiveDateTime::new(date, time).and_utc())
  }
}

/// Per-game statistics, before they are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGameStatistics {
  pub raw_record_id: i64,
  pub headers:       GameHeaders,
  /// Number of plies in the mainline; equals the snapshot count.
  pub total_moves:   u32,
}

/// A persisted statistics row. One per raw record at most.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatistics {
  pub id:            i64,
  pub raw_record_id: i64,
  pub headers:       GameHeaders,
  pub total_moves:   u32,
}

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Everything derived from one raw record in a single parse pass.
///
/// A malformed record yields no snapshots and no statistics; it is still
/// committed so the record is marked processed and never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
  pub raw_record_id: i64,
  pub snapshots:     Vec<NewGameSnapshot>,
  pub statistics:    Option<NewGameStatistics>,
}

impl ExtractedRecord {
  /// The output for a record that could not be parsed.
  pub fn empty(raw_record_id: i64) -> Self {
    Self { raw_record_id, snapshots: Vec::new(), statistics: None }
  }

  pub fn is_empty(&self) -> bool {
    self.snapshots.is_empty() && self.statistics.is_none()
  }
}

// ─── Encodings ───────────────────────────────────────────────────────────────

/// A snapshot joined with the data needed to encode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingInput {
  pub snapshot_id:     i64,
  pub turn:            Turn,
  pub san:             String,
  /// FEN of the board the move was played from.
  pub position_before: String,
  pub white_rating:    Option<i32>,
  pub black_rating:    Option<i32>,
}

/// Cached numeric encoding of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSnapshot {
  pub snapshot_id:       i64,
  /// 12 planes × 8 ranks × 8 files of piece occupancy.
  pub board:             Vec<f32>,
  /// `[white_rating, black_rating, turn_white, turn_black]`, ratings
  /// normalised.
  pub metadata:          Vec<f32>,
  /// Vocabulary index of the move actually played.
  pub chosen_move_index: u32,
  /// One entry per vocabulary move; 1.0 where the move is legal.
  pub valid_moves:       Vec<f32>,
}

// ─── Counts ──────────────────────────────────────────────────────────────────

/// Row counts of every table, for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorpusCounts {
  pub files:               u64,
  pub files_processed:     u64,
  pub raw_records:         u64,
  pub raw_records_pending: u64,
  pub snapshots:           u64,
  pub statistics:          u64,
  pub legal_moves:         u64,
  pub processed_snapshots: u64,
}
