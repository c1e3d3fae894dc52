//! Error types for `gambit-ingest`.

use thiserror::Error;

/// Failures of the remote side: the catalog, a download, or decompressing
/// it. These are skippable; the run goes on without that unit of work.
#[derive(Debug, Error)]
pub enum SourceError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{url} returned status {status}")]
  Status { url: String, status: u16 },

  #[error("invalid url: {0}")]
  Url(#[from] url::ParseError),

  #[error("decompression failed: {0}")]
  Decode(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Source(#[from] SourceError),

  /// The corpus store failed. Always fatal for the run.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("no catalog entry named {0:?}")]
  UnknownFile(String),
}

impl Error {
  /// Box a backend error from any [`gambit_core::store::CorpusStore`].
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
