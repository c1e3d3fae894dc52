//! PGN tag-pair and movetext parser.
//!
//! Pipeline:
//!   raw &str
//!     └─ split_sections()     → tag lines + movetext
//!          ├─ parse_tag()      → (name, value)
//!          └─ tokenize()       → mainline SAN tokens

use crate::error::{Error, Result};

// ─── Parsed representation ───────────────────────────────────────────────────

/// One game as read from PGN text, before any move is checked for legality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PgnGame {
  /// Tag pairs in source order.
  pub tags:  Vec<(String, String)>,
  /// Mainline moves as written, minus move numbers and annotations.
  pub moves: Vec<String>,
}

impl PgnGame {
  /// The value of the first tag called `name`.
  pub fn tag(&self, name: &str) -> Option<&str> {
    self
      .tags
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, v)| v.as_str())
  }
}

const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

// ─── Sections ────────────────────────────────────────────────────────────────

/// Leading `[...]` lines form the tag section; everything after the first
/// other non-blank line is movetext.
fn split_sections(input: &str) -> (Vec<&str>, String) {
  let mut tags = Vec::new();
  let mut movetext = String::new();
  let mut in_tags = true;

  for raw in input.lines() {
    let line = raw.trim();
    if in_tags {
      if line.is_empty() {
        continue;
      }
      if line.starts_with('[') {
        tags.push(line);
        continue;
      }
      in_tags = false;
    }
    // `%` in the first column escapes the whole line.
    if line.starts_with('%') {
      continue;
    }
    movetext.push_str(raw);
    movetext.push('\n');
  }

  (tags, movetext)
}

// ─── Tags ────────────────────────────────────────────────────────────────────

/// Parse `[Name "value"]`, honouring `\"` and `\\` escapes in the value.
fn parse_tag(line: &str) -> Result<(String, String)> {
  let malformed = || Error::MalformedTag(line.to_owned());

  let inner = line
    .strip_prefix('[')
    .and_then(|s| s.trim_end().strip_suffix(']'))
    .ok_or_else(malformed)?;
  let inner = inner.trim();

  let name_end = inner
    .find(char::is_whitespace)
    .ok_or_else(malformed)?;
  let name = &inner[..name_end];
  if name.is_empty() {
    return Err(malformed());
  }

  let rest = inner[name_end..].trim_start();
  let mut chars = rest.chars();
  if chars.next() != Some('"') {
    return Err(malformed());
  }

  let mut value = String::new();
  let mut closed = false;
  while let Some(c) = chars.next() {
    match c {
      '\\' => match chars.next() {
        Some(escaped) => value.push(escaped),
        None => return Err(malformed()),
      },
      '"' => {
        closed = true;
        break;
      }
      other => value.push(other),
    }
  }
  if !closed || !chars.as_str().trim().is_empty() {
    return Err(malformed());
  }

  Ok((name.to_owned(), value))
}

// ─── Movetext ────────────────────────────────────────────────────────────────

fn skip_comment(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<()> {
  for c in chars.by_ref() {
    if c == '}' {
      return Ok(());
    }
  }
  Err(Error::UnterminatedComment)
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
  for c in chars.by_ref() {
    if c == '\n' {
      break;
    }
  }
}

/// Skip a `( ... )` variation whose opening parenthesis was already consumed.
fn skip_variation(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<()> {
  let mut depth = 1usize;
  while let Some(c) = chars.next() {
    match c {
      '{' => skip_comment(chars)?,
      ';' => skip_line(chars),
      '(' => depth += 1,
      ')' => {
        depth -= 1;
        if depth == 0 {
          return Ok(());
        }
      }
      _ => {}
    }
  }
  Err(Error::UnbalancedVariation)
}

fn is_delimiter(c: char) -> bool {
  c.is_whitespace() || matches!(c, '{' | '}' | '(' | ')' | ';')
}

/// Reduce a raw movetext token to a SAN move, or `None` if it carries no
/// move (a bare move number).
fn normalize_token(token: &str) -> Option<String> {
  let mut token = token;

  // `12.`, `12...`, or `12.e4` written without a space.
  if token.starts_with(|c: char| c.is_ascii_digit())
    && let Some(dot) = token.rfind('.')
  {
    token = &token[dot + 1..];
  }

  let token = token.trim_end_matches(['!', '?']);
  if token.is_empty() {
    return None;
  }

  // Zero-style castling.
  if token.starts_with("0-0") {
    return Some(token.replace('0', "O"));
  }
  Some(token.to_owned())
}

/// Extract the mainline move tokens from movetext, stopping at the result.
fn tokenize(movetext: &str) -> Result<Vec<String>> {
  let mut moves = Vec::new();
  let mut chars = movetext.chars().peekable();

  while let Some(&c) = chars.peek() {
    match c {
      c if c.is_whitespace() => {
        chars.next();
      }
      '{' => {
        chars.next();
        skip_comment(&mut chars)?;
      }
      ';' => skip_line(&mut chars),
      '(' => {
        chars.next();
        skip_variation(&mut chars)?;
      }
      ')' | '}' => return Err(Error::UnbalancedVariation),
      '$' => {
        chars.next();
        while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
          chars.next();
        }
      }
      _ => {
        let mut token = String::new();
        while let Some(&c) = chars.peek() {
          if is_delimiter(c) {
            break;
          }
          token.push(c);
          chars.next();
        }
        if RESULTS.contains(&token.as_str()) {
          break;
        }
        if let Some(san) = normalize_token(&token) {
          moves.push(san);
        }
      }
    }
  }

  Ok(moves)
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Parse one PGN record into tags and mainline move tokens.
pub fn parse_game(input: &str) -> Result<PgnGame> {
  let (tag_lines, movetext) = split_sections(input);

  let tags = tag_lines
    .into_iter()
    .map(parse_tag)
    .collect::<Result<Vec<_>>>()?;
  let moves = tokenize(&movetext)?;

  if tags.is_empty() && moves.is_empty() {
    return Err(Error::Empty);
  }

  Ok(PgnGame { tags, moves })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_tags_and_moves() {
    let game = parse_game("[Event \"t\"]\n[White \"a\"]\n\n1. e4 e5 2. Nf3 1-0").unwrap();
    assert_eq!(game.tag("Event"), Some("t"));
    assert_eq!(game.tag("White"), Some("a"));
    assert_eq!(game.moves, ["e4", "e5", "Nf3"]);
  }

  #[test]
  fn tag_value_escapes() {
    let (name, value) = parse_tag(r#"[Annotator "say \"hi\" \\ bye"]"#).unwrap();
    assert_eq!(name, "Annotator");
    assert_eq!(value, r#"say "hi" \ bye"#);
  }

  #[test]
  fn malformed_tag_is_rejected() {
    assert!(matches!(
      parse_game("[Event t]\n\n1. e4"),
      Err(Error::MalformedTag(_))
    ));
    assert!(matches!(
      parse_game("[Event \"t\"\n\n1. e4"),
      Err(Error::MalformedTag(_))
    ));
  }

  #[test]
  fn skips_comments_variations_and_nags() {
    let text = "1. e4 { [%eval 0.17] [%clk 0:03:00] } 1... e5?! $6 \
                (1... c5 2. Nf3 (2. c3) { side (line) }) 2. Nf3!! ; trailing\n\
                2... Nc6 *";
    let game = parse_game(text).unwrap();
    assert_eq!(game.moves, ["e4", "e5", "Nf3", "Nc6"]);
  }

  #[test]
  fn move_numbers_glued_to_moves() {
    let game = parse_game("1.e4 e5 2.Nf3 2...Nc6 3.0-0").unwrap();
    assert_eq!(game.moves, ["e4", "e5", "Nf3", "Nc6", "O-O"]);
  }

  #[test]
  fn stops_at_result() {
    let game = parse_game("1. e4 e5 1/2-1/2 2. Nf3").unwrap();
    assert_eq!(game.moves, ["e4", "e5"]);
  }

  #[test]
  fn unterminated_comment_is_an_error() {
    assert!(matches!(
      parse_game("1. e4 { never closed"),
      Err(Error::UnterminatedComment)
    ));
  }

  #[test]
  fn unbalanced_variation_is_an_error() {
    assert!(matches!(
      parse_game("1. e4 (1. d4 e5"),
      Err(Error::UnbalancedVariation)
    ));
    assert!(matches!(parse_game("1. e4 )"), Err(Error::UnbalancedVariation)));
  }

  #[test]
  fn blank_input_is_empty() {
    assert!(matches!(parse_game("  \n\n "), Err(Error::Empty)));
  }

  #[test]
  fn tags_without_moves_are_valid() {
    let game = parse_game("[Event \"abandoned\"]\n[Result \"*\"]\n\n*").unwrap();
    assert!(game.moves.is_empty());
    assert_eq!(game.tags.len(), 2);
  }
}
