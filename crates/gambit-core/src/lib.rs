//! Core types and trait definitions for the gambit training corpus.
//!
//! This crate is deliberately free of HTTP, PGN and database dependencies.
//! All other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod record;
pub mod snapshot;
pub mod store;
pub mod vocabulary;

pub use error::{Error, Result};
