//! Replaying a parsed game into per-ply snapshots and per-game statistics.

use gambit_core::{
  record::RawRecord,
  snapshot::{ExtractedRecord, GameHeaders, NewGameSnapshot, NewGameStatistics, Turn},
};
use shakmaty::{
  Chess, Color, EnPassantMode, Position,
  fen::Fen,
  san::SanPlus,
};

use crate::{
  error::{Error, Result},
  parse::{PgnGame, parse_game},
};

/// Derive snapshots and statistics from a stored record.
///
/// A record that cannot be parsed or replayed produces an empty extraction;
/// the failure is logged and never propagated.
pub fn extract(record: &RawRecord) -> ExtractedRecord {
  match extract_body(record.id, &record.body) {
    Ok(extracted) => extracted,
    Err(e) => {
      tracing::debug!(raw_record_id = record.id, error = %e, "skipping unreadable record");
      ExtractedRecord::empty(record.id)
    }
  }
}

/// Like [`extract`], but reports why a record was rejected.
pub fn extract_body(raw_record_id: i64, body: &str) -> Result<ExtractedRecord> {
  let game = parse_game(body)?;
  let snapshots = replay(raw_record_id, &game.moves)?;

  let statistics = NewGameStatistics {
    raw_record_id,
    headers: headers(&game),
    total_moves: snapshots.len() as u32,
  };

  Ok(ExtractedRecord { raw_record_id, snapshots, statistics: Some(statistics) })
}

/// Play `moves` from the standard initial position.
fn replay(raw_record_id: i64, moves: &[String]) -> Result<Vec<NewGameSnapshot>> {
  let mut pos = Chess::default();
  let mut snapshots = Vec::with_capacity(moves.len());

  for (i, token) in moves.iter().enumerate() {
    let ply = i as u32 + 1;
    let san = token
      .parse::<SanPlus>()
      .map_err(|_| Error::InvalidSan { ply, token: token.clone() })?;
    let mv = san
      .san
      .to_move(&pos)
      .map_err(|_| Error::IllegalMove { ply, token: token.clone() })?;

    let turn = match pos.turn() {
      Color::White => Turn::White,
      Color::Black => Turn::Black,
    };
    let played = SanPlus::from_move_and_play_unchecked(&mut pos, &mv);
    let position = Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string();

    snapshots.push(NewGameSnapshot {
      raw_record_id,
      move_number: ply,
      turn,
      san: played.to_string(),
      position,
    });
  }

  Ok(snapshots)
}

/// Text tags are stored as written, placeholders like `?` included.
fn text(game: &PgnGame, name: &str) -> Option<String> { game.tag(name).map(str::to_owned) }

/// Integers are read leniently: `?`, blanks and junk become `None`, and an
/// explicit `+` sign is accepted.
fn number(game: &PgnGame, name: &str) -> Option<i32> {
  let value = game.tag(name)?.trim();
  value.strip_prefix('+').unwrap_or(value).parse().ok()
}

fn headers(game: &PgnGame) -> GameHeaders {
  let site = text(game, "Site");
  let source_url = site
    .as_deref()
    .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
    .map(str::to_owned);

  GameHeaders {
    event: text(game, "Event"),
    site,
    date: text(game, "Date"),
    round: text(game, "Round"),
    white: text(game, "White"),
    black: text(game, "Black"),
    result: text(game, "Result"),
    white_rating: number(game, "WhiteElo"),
    black_rating: number(game, "BlackElo"),
    white_rating_diff: number(game, "WhiteRatingDiff"),
    black_rating_diff: number(game, "BlackRatingDiff"),
    time_control: text(game, "TimeControl"),
    opening_code: text(game, "ECO"),
    opening_name: text(game, "Opening"),
    termination: text(game, "Termination"),
    utc_date: text(game, "UTCDate"),
    utc_time: text(game, "UTCTime"),
    variant: text(game, "Variant"),
    source_url,
  }
}
