//! Incremental splitting of concatenated PGN text into single records.
//!
//! Records are separated by a blank line immediately followed by the next
//! record's opening tag. The splitter works on raw bytes so a chunk boundary
//! may fall anywhere, including inside a multi-byte character or inside the
//! separator itself.

use std::borrow::Cow;

/// The tag every record opens with.
pub const OPENING_TAG: &str = "[Event ";

/// Feeds arbitrary byte chunks in, yields complete records out.
///
/// At most one partial record is buffered at any time, so memory use is
/// bounded by the largest record rather than by the whole stream.
#[derive(Debug)]
pub struct RecordSplitter {
  boundary: Vec<u8>,
  pending:  Vec<u8>,
  /// Offset in `pending` before which no boundary can start.
  scanned:  usize,
}

impl Default for RecordSplitter {
  fn default() -> Self { Self::new(OPENING_TAG) }
}

impl RecordSplitter {
  /// A splitter for records that open with `opening_tag`.
  pub fn new(opening_tag: &str) -> Self {
    let mut boundary = b"\n\n".to_vec();
    boundary.extend_from_slice(opening_tag.as_bytes());
    Self { boundary, pending: Vec::new(), scanned: 0 }
  }

  /// Append a chunk and return every record it completed.
  pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
    self.pending.extend_from_slice(chunk);

    let mut records = Vec::new();
    let mut start = 0usize;
    let mut from = self.scanned;

    while let Some(at) = find(&self.pending[from..], &self.boundary) {
      let end = from + at;
      if let Some(record) = finish_record(&self.pending[start..end]) {
        records.push(record);
      }
      // The opening tag stays with the next record; only the blank line
      // between records is dropped.
      start = end + 2;
      from = start;
    }

    self.pending.drain(..start);
    self.scanned = self
      .pending
      .len()
      .saturating_sub(self.boundary.len() - 1);
    records
  }

  /// Flush whatever remains once the stream is exhausted.
  pub fn finish(mut self) -> Option<String> {
    let rest = std::mem::take(&mut self.pending);
    finish_record(&rest)
  }
}

/// Split a whole text at once. Same result as feeding it to a
/// [`RecordSplitter`] in any chunking.
pub fn split_records(text: &str) -> Vec<String> {
  let mut splitter = RecordSplitter::default();
  let mut records = splitter.push(text.as_bytes());
  records.extend(splitter.finish());
  records
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
  haystack
    .windows(needle.len())
    .position(|window| window == needle)
}

fn finish_record(bytes: &[u8]) -> Option<String> {
  let text = match String::from_utf8_lossy(bytes) {
    Cow::Borrowed(text) => Cow::Borrowed(text),
    Cow::Owned(text) => {
      tracing::warn!("record contains invalid UTF-8; replaced lossily");
      Cow::Owned(text)
    }
  };
  let trimmed = text.trim();
  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_owned())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn game(n: usize) -> String {
    format!("[Event \"game {n}\"]\n[Site \"x\"]\n\n1. e4 e5 {n}-0")
  }

  fn archive(k: usize) -> String {
    (0..k).map(game).collect::<Vec<_>>().join("\n\n")
  }

  #[test]
  fn splits_k_records() {
    let records = split_records(&format!("{}\n", archive(5)));
    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
      assert!(record.starts_with(OPENING_TAG));
      assert_eq!(record, &game(i));
    }
  }

  #[test]
  fn chunking_does_not_change_the_result() {
    let text = archive(7);
    let expected = split_records(&text);

    for size in [1, 2, 3, 5, 8, 13, 64] {
      let mut splitter = RecordSplitter::default();
      let mut records = Vec::new();
      for chunk in text.as_bytes().chunks(size) {
        records.extend(splitter.push(chunk));
      }
      records.extend(splitter.finish());
      assert_eq!(records, expected, "chunk size {size}");
    }
  }

  #[test]
  fn multibyte_characters_survive_chunk_boundaries() {
    let text = "[Event \"Šachy\"]\n\n1. e4 *\n\n[Event \"ß\"]\n\n1. d4 *";
    let mut splitter = RecordSplitter::default();
    let mut records = Vec::new();
    for chunk in text.as_bytes().chunks(1) {
      records.extend(splitter.push(chunk));
    }
    records.extend(splitter.finish());
    assert_eq!(records, ["[Event \"Šachy\"]\n\n1. e4 *", "[Event \"ß\"]\n\n1. d4 *"]);
  }

  #[test]
  fn blank_lines_inside_a_record_do_not_split() {
    let records = split_records("[Event \"a\"]\n[Site \"s\"]\n\n1. e4 *\n\n\n[Event \"b\"]\n\n1. d4 *");
    assert_eq!(records.len(), 2);
    assert!(records[0].ends_with("1. e4 *"));
  }

  #[test]
  fn empty_input_yields_nothing() {
    assert!(split_records("").is_empty());
    assert!(split_records("\n\n  \n").is_empty());
  }
}
