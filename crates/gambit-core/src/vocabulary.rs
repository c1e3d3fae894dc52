//! The fixed move-classification vocabulary.
//!
//! Every coordinate move that some chess piece could make on an empty board,
//! plus pawn promotion variants, written in lowercase UCI form (`e2e4`,
//! `a7a8q`). The set depends only on board geometry, never on game legality,
//! so generating it twice always yields the same entries in the same order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

const FILES: &[u8; 8] = b"abcdefgh";
const RANKS: &[u8; 8] = b"12345678";
const PROMOTIONS: [char; 4] = ['q', 'r', 'b', 'n'];

// ─── Piece kinds ─────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PieceKind {
  Pawn,
  Knight,
  Bishop,
  Rook,
  Queen,
  King,
}

impl PieceKind {
  /// Whether this kind can cover the displacement `(dx, dy)` in one move.
  ///
  /// Pawn shapes are accepted in both directions because the vocabulary is
  /// shared by both colours.
  fn covers(self, dx: i8, dy: i8) -> bool {
    let (ax, ay) = (dx.abs(), dy.abs());
    match self {
      Self::Pawn => (ax == 0 && (ay == 1 || ay == 2)) || (ax == 1 && ay == 1),
      Self::Knight => (ax == 1 && ay == 2) || (ax == 2 && ay == 1),
      Self::Bishop => ax == ay,
      Self::Rook => ax == 0 || ay == 0,
      Self::Queen => ax == ay || ax == 0 || ay == 0,
      Self::King => ax <= 1 && ay <= 1,
    }
  }
}

// ─── Entries ─────────────────────────────────────────────────────────────────

/// One vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalMove {
  /// Lowercase UCI coordinate string.
  pub mv:          String,
  /// Piece kinds geometrically capable of the move, in [`PieceKind`] order.
  pub piece_types: BTreeSet<PieceKind>,
}

fn square_name(file: i8, rank: i8) -> [u8; 2] {
  [FILES[file as usize], RANKS[rank as usize]]
}

/// Enumerate the whole vocabulary, sorted by move string.
///
/// Each call recomputes the table from scratch, so the returned iterator can
/// be restarted simply by calling this again.
pub fn generate() -> impl Iterator<Item = LegalMove> {
  let mut moves: BTreeMap<String, BTreeSet<PieceKind>> = BTreeMap::new();

  for from in 0..64i8 {
    let (fx, fy) = (from % 8, from / 8);
    for to in 0..64i8 {
      if from == to {
        continue;
      }
      let (tx, ty) = (to % 8, to / 8);
      let (dx, dy) = (tx - fx, ty - fy);

      let mut coords = String::with_capacity(5);
      coords.extend(square_name(fx, fy).map(char::from));
      coords.extend(square_name(tx, ty).map(char::from));

      for kind in PieceKind::iter() {
        if !kind.covers(dx, dy) {
          continue;
        }
        moves.entry(coords.clone()).or_default().insert(kind);

        if kind == PieceKind::Pawn && (ty == 0 || ty == 7) {
          for promo in PROMOTIONS {
            moves
              .entry(format!("{coords}{promo}"))
              .or_default()
              .insert(PieceKind::Pawn);
          }
        }
      }
    }
  }

  moves
    .into_iter()
    .map(|(mv, piece_types)| LegalMove { mv, piece_types })
}

// ─── Index ───────────────────────────────────────────────────────────────────

/// An ordered vocabulary with constant-time lookup in both directions.
#[derive(Debug, Clone)]
pub struct MoveVocabulary {
  entries: Vec<LegalMove>,
  index:   HashMap<String, usize>,
}

impl MoveVocabulary {
  /// Build the vocabulary directly from [`generate`].
  pub fn standard() -> Self { Self::from_moves(generate()) }

  /// Build the vocabulary from entries in their canonical (insertion) order.
  /// Duplicate moves keep their first index.
  pub fn from_moves(moves: impl IntoIterator<Item = LegalMove>) -> Self {
    let mut entries = Vec::new();
    let mut index = HashMap::new();
    for entry in moves {
      if index.contains_key(&entry.mv) {
        continue;
      }
      index.insert(entry.mv.clone(), entries.len());
      entries.push(entry);
    }
    Self { entries, index }
  }

  pub fn index_of(&self, mv: &str) -> Option<usize> { self.index.get(mv).copied() }

  pub fn move_at(&self, index: usize) -> Option<&str> {
    self.entries.get(index).map(|e| e.mv.as_str())
  }

  pub fn piece_types_at(&self, index: usize) -> Option<&BTreeSet<PieceKind>> {
    self.entries.get(index).map(|e| &e.piece_types)
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn entries(&self) -> &[LegalMove] { &self.entries }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(mv: &str) -> LegalMove {
    generate().find(|e| e.mv == mv).expect("move in vocabulary")
  }

  #[test]
  fn generation_is_deterministic() {
    let first: Vec<_> = generate().collect();
    let second: Vec<_> = generate().collect();
    assert_eq!(first, second);

    let a = MoveVocabulary::from_moves(first);
    let b = MoveVocabulary::standard();
    assert_eq!(a.len(), b.len());
    for i in 0..a.len() {
      assert_eq!(a.move_at(i), b.move_at(i));
    }
  }

  #[test]
  fn total_count_covers_lines_knights_and_promotions() {
    // 896 rook lines + 560 diagonals + 336 knight jumps + 60 promotion
    // squares × 4 pieces.
    assert_eq!(generate().count(), 2032);
  }

  #[test]
  fn output_is_sorted_and_unique() {
    let moves: Vec<_> = generate().map(|e| e.mv).collect();
    let mut sorted = moves.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(moves, sorted);
  }

  #[test]
  fn file_move_is_rook_and_queen() {
    let e = entry("a1a8");
    assert!(e.piece_types.contains(&PieceKind::Rook));
    assert!(e.piece_types.contains(&PieceKind::Queen));
    assert!(!e.piece_types.contains(&PieceKind::Bishop));
  }

  #[test]
  fn diagonal_step_is_bishop_queen_king_and_pawn() {
    let e = entry("a1b2");
    assert!(e.piece_types.contains(&PieceKind::Bishop));
    assert!(e.piece_types.contains(&PieceKind::Queen));
    assert!(e.piece_types.contains(&PieceKind::King));
    assert!(e.piece_types.contains(&PieceKind::Pawn));
    assert!(!e.piece_types.contains(&PieceKind::Rook));
  }

  #[test]
  fn knight_jump_is_only_knight() {
    let e = entry("g1f3");
    assert_eq!(e.piece_types, BTreeSet::from([PieceKind::Knight]));
  }

  #[test]
  fn promotions_are_separate_pawn_entries() {
    for promo in ["a7a8q", "a7a8r", "a7a8b", "a7a8n", "b2a1q", "h6h8n"] {
      assert_eq!(entry(promo).piece_types, BTreeSet::from([PieceKind::Pawn]));
    }
    assert!(generate().all(|e| e.mv != "a6a8k"));
  }

  #[test]
  fn castling_coordinates_resolve() {
    let vocab = MoveVocabulary::standard();
    assert!(vocab.index_of("e1g1").is_some());
    assert!(vocab.index_of("e8c8").is_some());
  }

  #[test]
  fn index_and_move_are_inverse() {
    let vocab = MoveVocabulary::standard();
    let i = vocab.index_of("e2e4").unwrap();
    assert_eq!(vocab.move_at(i), Some("e2e4"));
    assert_eq!(vocab.index_of("z9z9"), None);
    assert_eq!(vocab.move_at(vocab.len()), None);
  }

  #[test]
  fn piece_kind_names_are_lowercase() {
    assert_eq!(PieceKind::Knight.to_string(), "knight");
    assert_eq!("queen".parse::<PieceKind>().unwrap(), PieceKind::Queen);
  }
}
