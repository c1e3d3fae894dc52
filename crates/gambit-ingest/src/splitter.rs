//! Streaming one archive into the raw record store.
//!
//! Pipeline per network chunk:
//!   bytes
//!     └─ chunk_size slices  → FrameDecoder (zstd)
//!          └─ decoded bytes  → RecordSplitter
//!               └─ records   → CorpusStore::save_raw_record
//!
//! Only one partial record and one chunk are held in memory at a time. The
//! trailing record is saved only once the last zstd frame is known to be
//! complete; a body that ends mid-frame is a decode failure.

use std::io;

use gambit_core::{
  record::{FileMetadata, NewRawRecord},
  store::CorpusStore,
};
use gambit_pgn::RecordSplitter;
use url::Url;
use zstd::stream::raw::{Decoder, InBuffer, Operation, OutBuffer};

use crate::{
  error::{Error, Result, SourceError},
  source::{ArchiveBody, ArchiveSource},
};

/// Result of pulling one catalog entry.
#[derive(Debug)]
pub enum PullOutcome {
  /// The whole archive was read and the entry is now marked processed.
  Completed {
    /// Records split out of the archive.
    fetched:  u64,
    /// Records that were new to the store.
    inserted: u64,
  },
  /// The download or decompression failed. The entry stays unprocessed.
  Failed(SourceError),
}

#[derive(Debug, Default)]
struct Tally {
  fetched:  u64,
  inserted: u64,
}

// ─── Frame decoder ───────────────────────────────────────────────────────────

/// Incremental zstd decompression that tracks whether the stream currently
/// sits on a frame boundary.
struct FrameDecoder {
  inner:    Decoder<'static>,
  scratch:  Vec<u8>,
  /// The last frame was fully decoded and flushed.
  finished: bool,
}

impl FrameDecoder {
  fn new() -> io::Result<Self> {
    Ok(Self {
      inner:    Decoder::new()?,
      scratch:  vec![0; zstd::zstd_safe::DCtx::out_size()],
      finished: false,
    })
  }

  /// Decode `src`, returning all bytes it produced.
  fn decode(&mut self, src: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    if src.is_empty() {
      return Ok(decoded);
    }

    let mut input = InBuffer::around(src);
    loop {
      // Concatenated frames: start the next one on a clean session.
      if self.finished && input.pos() < src.len() {
        self.inner.reinit()?;
      }

      let mut output = OutBuffer::around(&mut self.scratch[..]);
      let hint = self.inner.run(&mut input, &mut output)?;
      let written = output.pos();
      decoded.extend_from_slice(&self.scratch[..written]);
      self.finished = hint == 0;

      if input.pos() == src.len() && (self.finished || written < self.scratch.len()) {
        return Ok(decoded);
      }
    }
  }

  /// Fails unless the input ended exactly on a frame boundary.
  fn finish(&self) -> io::Result<()> {
    if self.finished {
      Ok(())
    } else {
      Err(io::Error::new(io::ErrorKind::UnexpectedEof, "archive ends inside a zstd frame"))
    }
  }
}

pub struct StreamSplitter<'a, C, S> {
  store:      &'a C,
  source:     &'a S,
  chunk_size: usize,
}

impl<'a, C, S> StreamSplitter<'a, C, S>
where
  C: CorpusStore,
  S: ArchiveSource,
{
  pub fn new(store: &'a C, source: &'a S, chunk_size: usize) -> Self {
    Self { store, source, chunk_size: chunk_size.max(1) }
  }

  /// Download, decompress and split `entry`, saving every record.
  ///
  /// Source failures are reported as [`PullOutcome::Failed`]; records saved
  /// before the failure stay saved and are deduplicated on the next attempt.
  /// Store failures are returned as errors.
  pub async fn pull(&self, entry: &FileMetadata) -> Result<PullOutcome> {
    tracing::info!(file = %entry.filename, size_gb = entry.size_gb, "pulling archive");

    let tally = match self.stream(entry).await {
      Ok(tally) => tally,
      Err(Error::Source(e)) => {
        tracing::warn!(file = %entry.filename, error = %e, "archive pull failed; will retry later");
        return Ok(PullOutcome::Failed(e));
      }
      Err(e) => return Err(e),
    };

    self
      .store
      .mark_file_processed(entry.id)
      .await
      .map_err(Error::store)?;

    tracing::info!(
      file = %entry.filename,
      fetched = tally.fetched,
      inserted = tally.inserted,
      "archive split"
    );
    Ok(PullOutcome::Completed { fetched: tally.fetched, inserted: tally.inserted })
  }

  async fn stream(&self, entry: &FileMetadata) -> Result<Tally> {
    let url = Url::parse(&entry.url).map_err(SourceError::from)?;
    let mut body = self.source.open(url).await?;
    let mut decoder = FrameDecoder::new().map_err(SourceError::Decode)?;
    let mut splitter = RecordSplitter::default();
    let mut tally = Tally::default();

    while let Some(chunk) = body.chunk().await? {
      for slice in chunk.chunks(self.chunk_size) {
        let decoded = decoder.decode(slice).map_err(SourceError::Decode)?;
        for record in splitter.push(&decoded) {
          self.save(entry.id, record, &mut tally).await?;
        }
      }
    }

    decoder.finish().map_err(SourceError::Decode)?;
    if let Some(record) = splitter.finish() {
      self.save(entry.id, record, &mut tally).await?;
    }

    Ok(tally)
  }

  async fn save(&self, file_id: i64, body: String, tally: &mut Tally) -> Result<()> {
    let outcome = self
      .store
      .save_raw_record(NewRawRecord::new(file_id, body))
      .await
      .map_err(Error::store)?;
    tally.fetched += 1;
    if outcome.is_inserted() {
      tally.inserted += 1;
    }
    Ok(())
  }
}
