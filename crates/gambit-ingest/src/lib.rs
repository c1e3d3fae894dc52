//! Ingestion pipeline for the gambit training corpus.
//!
//! Reads the remote archive index into the catalog, streams archives into the
//! raw record store, replays records into snapshots, and encodes snapshots
//! into training tensors. Generic over any [`gambit_core::store::CorpusStore`]
//! and any [`source::ArchiveSource`].

pub mod catalog;
pub mod config;
pub mod encode;
pub mod error;
pub mod orchestrator;
pub mod source;
pub mod splitter;
pub mod vocabulary;

pub use config::IngestConfig;
pub use error::{Error, Result, SourceError};
pub use orchestrator::{Orchestrator, Outcome, RunReport};
