//! Error types for `gambit-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid turn marker: {0:?}")]
  InvalidTurn(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
