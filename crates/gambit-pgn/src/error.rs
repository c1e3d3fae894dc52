//! Error types for the gambit-pgn codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("record contains neither tags nor moves")]
  Empty,

  #[error("malformed tag pair: {0}")]
  MalformedTag(String),

  #[error("unterminated comment in movetext")]
  UnterminatedComment,

  #[error("unbalanced variation in movetext")]
  UnbalancedVariation,

  #[error("unparseable move {token:?} at ply {ply}")]
  InvalidSan { ply: u32, token: String },

  #[error("illegal move {token:?} at ply {ply}")]
  IllegalMove { ply: u32, token: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
