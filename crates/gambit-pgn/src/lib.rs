//! PGN codec for gambit.
//!
//! Splits concatenated archive text into single game records and replays a
//! record into [`gambit_core`] snapshots and statistics. Pure synchronous;
//! no HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use gambit_pgn::{extract_body, split_records};
//!
//! let text = "[Event \"a\"]\n\n1. e4 e5 *\n\n[Event \"b\"]\n\n1. d4 *";
//! for (id, body) in split_records(text).iter().enumerate() {
//!   let out = extract_body(id as i64, body).unwrap();
//!   println!("{} plies", out.snapshots.len());
//! }
//! ```

pub mod error;
mod extract;
mod parse;
mod split;

pub use error::{Error, Result};
pub use extract::{extract, extract_body};
pub use parse::{PgnGame, parse_game};
pub use split::{OPENING_TAG, RecordSplitter, split_records};
