//! Catalog entries and raw game records.
//!
//! A catalog entry describes one remote archive before it is downloaded. A raw
//! record is one game's PGN text as it appeared in that archive, identified by
//! the SHA-256 digest of its bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// One remote archive known to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
  pub id:        i64,
  /// Absolute download URL; unique across the catalog.
  pub url:       String,
  pub filename:  String,
  /// Game count reported by the remote counts manifest.
  pub games:     u64,
  /// Compressed size in GiB, rounded to two decimals.
  pub size_gb:   f64,
  /// Set once every record of the archive has been split into the store.
  /// Never cleared.
  pub processed: bool,
}

/// Input to [`crate::store::CorpusStore::upsert_file`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFileMetadata {
  pub url:      String,
  pub filename: String,
  pub games:    u64,
  pub size_gb:  f64,
}

// ─── Raw records ─────────────────────────────────────────────────────────────

/// A raw PGN game record as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
  pub id:           i64,
  pub file_id:      i64,
  pub body:         String,
  /// Lowercase hex SHA-256 of `body`; the record's dedup identity.
  pub content_hash: String,
  /// Whether snapshots and statistics have been derived from this record.
  pub processed:    bool,
}

/// Input to [`crate::store::CorpusStore::save_raw_record`].
///
/// The content hash is always computed from the body; it is not accepted from
/// callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRawRecord {
  file_id:      i64,
  body:         String,
  content_hash: String,
}

impl NewRawRecord {
  pub fn new(file_id: i64, body: impl Into<String>) -> Self {
    let body = body.into();
    let content_hash = content_hash(&body);
    Self { file_id, body, content_hash }
  }

  pub fn file_id(&self) -> i64 { self.file_id }

  pub fn body(&self) -> &str { &self.body }

  pub fn content_hash(&self) -> &str { &self.content_hash }

  pub fn into_parts(self) -> (i64, String, String) {
    (self.file_id, self.body, self.content_hash)
  }
}

/// Compute the dedup identity of a record body.
pub fn content_hash(body: &str) -> String {
  let digest = Sha256::digest(body.as_bytes());
  hex::encode(digest)
}

/// What happened when a raw record was offered to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
  /// A new row was created with this id.
  Inserted(i64),
  /// A byte-identical record already existed; this is its id.
  Existing(i64),
}

impl SaveOutcome {
  pub fn id(self) -> i64 {
    match self {
      Self::Inserted(id) | Self::Existing(id) => id,
    }
  }

  pub fn is_inserted(self) -> bool { matches!(self, Self::Inserted(_)) }
}

/// Parameters for [`crate::store::CorpusStore::unprocessed_raw_records`].
///
/// Pages are keyed on the record id so a caller can walk the backlog without
/// holding it all in memory.
#[derive(Debug, Clone, Copy)]
pub struct RecordQuery {
  /// Restrict to records split from one archive.
  pub file_id:  Option<i64>,
  /// Only return records with an id strictly greater than this.
  pub after_id: i64,
  pub limit:    usize,
}

impl RecordQuery {
  pub fn first_page(limit: usize) -> Self {
    Self { file_id: None, after_id: 0, limit }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identical_bodies_share_a_hash() {
    let a = NewRawRecord::new(1, "[Event \"a\"]\n\n1. e4 *");
    let b = NewRawRecord::new(7, "[Event \"a\"]\n\n1. e4 *");
    assert_eq!(a.content_hash(), b.content_hash());
    assert_eq!(a.content_hash().len(), 64);
  }

  #[test]
  fn hash_matches_known_digest() {
    assert_eq!(
      content_hash("abc"),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }

  #[test]
  fn save_outcome_exposes_id() {
    assert_eq!(SaveOutcome::Inserted(3).id(), 3);
    assert_eq!(SaveOutcome::Existing(9).id(), 9);
    assert!(!SaveOutcome::Existing(9).is_inserted());
  }
}
