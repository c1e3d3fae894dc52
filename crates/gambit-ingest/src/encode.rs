//! Numeric encoding of snapshots for model training.
//!
//! Each snapshot becomes four tensors:
//! - board: 12 occupancy planes (white P N B R Q K, then black) × 8 ranks ×
//!   8 files, `1.0` where the piece stands;
//! - metadata: `[white_rating, black_rating, turn_white, turn_black]` with
//!   ratings standardised against the corpus mean and deviation;
//! - the vocabulary index of the move played;
//! - a vocabulary-sized mask of the legal moves in the position.

use gambit_core::{
  snapshot::{EncodingInput, ProcessedSnapshot, Turn},
  store::CorpusStore,
  vocabulary::MoveVocabulary,
};
use shakmaty::{CastlingMode, Chess, Color, Position, Role, Square, fen::Fen, san::SanPlus};

use crate::error::{Error, Result};

pub const RATING_MEAN: f64 = 1638.43153;
pub const RATING_STD: f64 = 185.80054702756055;

pub const PLANES: usize = 12;
pub const BOARD_LEN: usize = PLANES * 64;
pub const METADATA_LEN: usize = 4;

/// Index returned when the played move cannot be resolved.
pub const FALLBACK_MOVE_INDEX: u32 = 0;

/// Standardised rating; a missing rating encodes as zero.
pub fn normalize_rating(rating: Option<i32>) -> f32 {
  match rating {
    Some(r) => ((f64::from(r) - RATING_MEAN) / RATING_STD) as f32,
    None => 0.0,
  }
}

fn plane(color: Color, role: Role) -> usize {
  let offset = match color {
    Color::White => 0,
    Color::Black => 6,
  };
  let kind = match role {
    Role::Pawn => 0,
    Role::Knight => 1,
    Role::Bishop => 2,
    Role::Rook => 3,
    Role::Queen => 4,
    Role::King => 5,
  };
  offset + kind
}

/// Occupancy planes, indexed `plane * 64 + rank * 8 + file`.
pub fn encode_board(pos: &Chess) -> Vec<f32> {
  let mut board = vec![0.0; BOARD_LEN];
  for square in Square::ALL {
    if let Some(piece) = pos.board().piece_at(square) {
      board[plane(piece.color, piece.role) * 64 + square as usize] = 1.0;
    }
  }
  board
}

/// Why a snapshot could not be encoded at all.
#[derive(Debug)]
pub struct Unencodable {
  pub snapshot_id: i64,
  pub reason:      String,
}

/// One successful encoding. `degraded` is set when the played move had to
/// fall back to [`FALLBACK_MOVE_INDEX`].
#[derive(Debug)]
pub struct Encoded {
  pub row:      ProcessedSnapshot,
  pub degraded: bool,
}

/// Turns snapshots into [`ProcessedSnapshot`] rows against a fixed vocabulary.
pub struct Encoder {
  vocabulary: MoveVocabulary,
}

impl Encoder {
  pub fn new(vocabulary: MoveVocabulary) -> Self { Self { vocabulary } }

  pub fn vocabulary(&self) -> &MoveVocabulary { &self.vocabulary }

  fn uci_index(&self, m: &shakmaty::Move) -> Option<usize> {
    self
      .vocabulary
      .index_of(&m.to_uci(CastlingMode::Standard).to_string())
  }

  pub fn encode(&self, input: &EncodingInput) -> Result<Encoded, Unencodable> {
    let unencodable = |reason: String| Unencodable { snapshot_id: input.snapshot_id, reason };

    let pos: Chess = input
      .position_before
      .parse::<Fen>()
      .map_err(|e| unencodable(format!("bad FEN {:?}: {e}", input.position_before)))?
      .into_position(CastlingMode::Standard)
      .map_err(|e| unencodable(format!("impossible position: {e}")))?;

    let played = input
      .san
      .parse::<SanPlus>()
      .ok()
      .and_then(|san| san.san.to_move(&pos).ok())
      .and_then(|m| self.uci_index(&m));
    let degraded = played.is_none();
    if degraded {
      tracing::debug!(
        snapshot_id = input.snapshot_id,
        san = %input.san,
        "played move not resolvable; using fallback index"
      );
    }
    let chosen_move_index = played.map_or(FALLBACK_MOVE_INDEX, |i| i as u32);

    let mut valid_moves = vec![0.0; self.vocabulary.len()];
    for m in pos.legal_moves() {
      if let Some(i) = self.uci_index(&m) {
        valid_moves[i] = 1.0;
      }
    }

    let (turn_white, turn_black) = match input.turn {
      Turn::White => (1.0, 0.0),
      Turn::Black => (0.0, 1.0),
    };
    let metadata = vec![
      normalize_rating(input.white_rating),
      normalize_rating(input.black_rating),
      turn_white,
      turn_black,
    ];

    Ok(Encoded {
      row: ProcessedSnapshot {
        snapshot_id: input.snapshot_id,
        board: encode_board(&pos),
        metadata,
        chosen_move_index,
        valid_moves,
      },
      degraded,
    })
  }

  /// Encode a batch, dropping rows whose position cannot be decoded.
  pub fn encode_batch(&self, inputs: &[EncodingInput]) -> (Vec<ProcessedSnapshot>, EncodeReport) {
    let mut rows = Vec::with_capacity(inputs.len());
    let mut report = EncodeReport::default();
    for input in inputs {
      match self.encode(input) {
        Ok(encoded) => {
          report.encoded += 1;
          report.degraded += u64::from(encoded.degraded);
          rows.push(encoded.row);
        }
        Err(e) => {
          tracing::warn!(snapshot_id = e.snapshot_id, reason = %e.reason, "skipping snapshot");
          report.skipped += 1;
        }
      }
    }
    (rows, report)
  }
}

/// Totals of an encoding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeReport {
  pub encoded:  u64,
  pub degraded: u64,
  pub skipped:  u64,
}

impl EncodeReport {
  fn absorb(&mut self, other: Self) {
    self.encoded += other.encoded;
    self.degraded += other.degraded;
    self.skipped += other.skipped;
  }
}

/// Encode every snapshot after the highest cached one, `batch_size` rows per
/// transaction, stopping after `limit` rows when given.
pub async fn encode_pending<C: CorpusStore>(
  store:          &C,
  encoder:        &Encoder,
  batch_size:     usize,
  print_interval: u64,
  limit:          Option<u64>,
) -> Result<EncodeReport> {
  let batch_size = batch_size.max(1);
  let mut cursor = store
    .last_processed_snapshot_id()
    .await
    .map_err(Error::store)?
    .unwrap_or(0);
  let mut report = EncodeReport::default();
  let mut seen = 0u64;

  tracing::info!(after = cursor, "encoding pending snapshots");

  loop {
    let take = match limit {
      Some(limit) if seen >= limit => break,
      Some(limit) => batch_size.min((limit - seen) as usize),
      None => batch_size,
    };

    let inputs = store
      .pending_encodings(cursor, take)
      .await
      .map_err(Error::store)?;
    let Some(last) = inputs.last() else { break };
    cursor = last.snapshot_id;
    seen += inputs.len() as u64;

    let before = report.encoded;
    let (rows, batch) = encoder.encode_batch(&inputs);
    store
      .save_processed_snapshots(rows)
      .await
      .map_err(Error::store)?;
    report.absorb(batch);

    if print_interval > 0 && before / print_interval != report.encoded / print_interval {
      tracing::info!(encoded = report.encoded, degraded = report.degraded, "encoding progress");
    }
  }

  tracing::info!(
    encoded = report.encoded,
    degraded = report.degraded,
    skipped = report.skipped,
    "encoding finished"
  );
  Ok(report)
}

#[cfg(test)]
mod tests {
  use gambit_core::snapshot::INITIAL_FEN;

  use super::*;

  fn input(san: &str, position_before: &str) -> EncodingInput {
    EncodingInput {
      snapshot_id: 1,
      turn: Turn::White,
      san: san.to_owned(),
      position_before: position_before.to_owned(),
      white_rating: Some(1500),
      black_rating: None,
    }
  }

  #[test]
  fn opening_move_from_initial_position() {
    let encoder = Encoder::new(MoveVocabulary::standard());
    let out = encoder.encode(&input("e4", INITIAL_FEN)).unwrap();

    let e2e4 = encoder.vocabulary().index_of("e2e4").unwrap();
    assert_eq!(out.row.chosen_move_index as usize, e2e4);
    assert!(!out.degraded);
    assert_eq!(out.row.valid_moves.len(), encoder.vocabulary().len());
    assert_eq!(out.row.valid_moves.iter().filter(|v| **v == 1.0).count(), 20);
  }

  #[test]
  fn board_planes_match_initial_position() {
    let pos = Chess::default();
    let board = encode_board(&pos);
    assert_eq!(board.len(), BOARD_LEN);
    assert_eq!(board.iter().sum::<f32>(), 32.0);

    // White king on e1: plane 5, rank 0, file 4.
    assert_eq!(board[5 * 64 + 4], 1.0);
    // Black pawn on a7: plane 6, rank 6, file 0.
    assert_eq!(board[6 * 64 + 6 * 8], 1.0);
    // Nothing on e4.
    assert!((0..PLANES).all(|p| board[p * 64 + 3 * 8 + 4] == 0.0));
  }

  #[test]
  fn metadata_normalises_ratings_and_turn() {
    let encoder = Encoder::new(MoveVocabulary::standard());
    let out = encoder.encode(&input("e4", INITIAL_FEN)).unwrap();
    let [white, black, turn_w, turn_b] = out.row.metadata[..] else {
      panic!("metadata has {} entries", out.row.metadata.len());
    };
    assert!((white - (-0.745_054)).abs() < 1e-4);
    assert_eq!(black, 0.0);
    assert_eq!((turn_w, turn_b), (1.0, 0.0));
  }

  #[test]
  fn castling_resolves_to_king_move() {
    let fen = "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1";
    let encoder = Encoder::new(MoveVocabulary::standard());
    let out = encoder.encode(&input("O-O", fen)).unwrap();
    let e1g1 = encoder.vocabulary().index_of("e1g1").unwrap();
    assert_eq!(out.row.chosen_move_index as usize, e1g1);
  }

  #[test]
  fn unresolvable_move_falls_back() {
    let encoder = Encoder::new(MoveVocabulary::standard());
    let out = encoder.encode(&input("Ke3", INITIAL_FEN)).unwrap();
    assert!(out.degraded);
    assert_eq!(out.row.chosen_move_index, FALLBACK_MOVE_INDEX);
  }

  #[test]
  fn bad_position_is_skipped() {
    let encoder = Encoder::new(MoveVocabulary::standard());
    let (rows, report) = encoder.encode_batch(&[input("e4", ""), input("e4", INITIAL_FEN)]);
    assert_eq!(rows.len(), 1);
    assert_eq!(report, EncodeReport { encoded: 1, degraded: 0, skipped: 1 });
  }
}
