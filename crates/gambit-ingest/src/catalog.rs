//! Populating the archive catalog from the remote index.
//!
//! The index is two resources under the base URL: `counts.txt`, with one
//! `<filename> <games>` line per archive, and the directory listing page whose
//! `href="….zst"` links name the archives. Sizes come from a HEAD request per
//! archive.

use std::{
  collections::{HashMap, HashSet},
  sync::LazyLock,
};

use gambit_core::{record::NewFileMetadata, store::CorpusStore};
use regex::Regex;
use url::Url;

use crate::{
  error::{Error, Result, SourceError},
  source::ArchiveSource,
};

static ARCHIVE_LINK: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"href="([^"]+\.zst)""#).expect("valid archive link pattern"));

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Parse `counts.txt`. Counts may carry thousands separators; lines that do
/// not parse are ignored.
pub fn parse_counts(text: &str) -> HashMap<String, u64> {
  text
    .lines()
    .filter_map(|line| {
      let mut parts = line.split_whitespace();
      let name = parts.next()?;
      let count: String = parts.collect::<String>().replace(',', "");
      Some((name.to_owned(), count.parse().ok()?))
    })
    .collect()
}

/// Archive links in the listing page, first occurrence order, deduplicated.
pub fn parse_listing(html: &str) -> Vec<String> {
  let mut seen = HashSet::new();
  ARCHIVE_LINK
    .captures_iter(html)
    .map(|c| c[1].to_owned())
    .filter(|href| seen.insert(href.clone()))
    .collect()
}

/// Bytes to GiB, rounded to two decimals.
pub fn size_gb(bytes: Option<u64>) -> f64 {
  match bytes {
    Some(b) => (b as f64 / BYTES_PER_GIB * 100.0).round() / 100.0,
    None => 0.0,
  }
}

/// Parse `base_url` as a directory, so relative links resolve inside it.
pub fn base_dir(base_url: &str) -> Result<Url, SourceError> {
  if base_url.ends_with('/') {
    Ok(Url::parse(base_url)?)
  } else {
    Ok(Url::parse(&format!("{base_url}/"))?)
  }
}

fn filename_of(url: &Url) -> String {
  url
    .path_segments()
    .and_then(|mut segments| segments.next_back())
    .unwrap_or_default()
    .to_owned()
}

/// Read the remote index into catalog rows. Archives whose HEAD request fails
/// are left out with a warning.
pub async fn scan<S: ArchiveSource>(source: &S, base: &Url) -> Result<Vec<NewFileMetadata>, SourceError> {
  let counts = parse_counts(&source.fetch_text(base.join("counts.txt")?).await?);
  let links = parse_listing(&source.fetch_text(base.clone()).await?);
  tracing::debug!(archives = links.len(), counted = counts.len(), "read remote index");

  let mut entries = Vec::with_capacity(links.len());
  for href in links {
    let url = base.join(&href)?;
    let filename = filename_of(&url);

    let bytes = match source.content_length(url.clone()).await {
      Ok(bytes) => bytes,
      Err(e) => {
        tracing::warn!(%url, error = %e, "skipping archive whose size is unavailable");
        continue;
      }
    };

    entries.push(NewFileMetadata {
      games: counts.get(&filename).copied().unwrap_or(0),
      size_gb: size_gb(bytes),
      url: url.to_string(),
      filename,
    });
  }
  Ok(entries)
}

/// Fill the catalog from the remote index if it is empty. Returns how many
/// rows were added.
pub async fn ensure_populated<C, S>(store: &C, source: &S, base_url: &str) -> Result<u64>
where
  C: CorpusStore,
  S: ArchiveSource,
{
  if store.count_files().await.map_err(Error::store)? > 0 {
    return Ok(0);
  }

  let base = base_dir(base_url)?;
  tracing::info!(%base, "catalog is empty; reading remote index");
  let entries = scan(source, &base).await?;

  for entry in entries {
    store.upsert_file(entry).await.map_err(Error::store)?;
  }
  let added = store.count_files().await.map_err(Error::store)?;
  tracing::info!(added, "catalog populated");
  Ok(added)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counts_accept_thousands_separators() {
    let counts = parse_counts(
      "lichess_db_standard_rated_2013-01.pgn.zst 121,332\n\
       lichess_db_standard_rated_2013-02.pgn.zst 123961\n\
       garbage\n\
       broken.pgn.zst n/a\n",
    );
    assert_eq!(counts.len(), 2);
    assert_eq!(counts["lichess_db_standard_rated_2013-01.pgn.zst"], 121_332);
    assert_eq!(counts["lichess_db_standard_rated_2013-02.pgn.zst"], 123_961);
  }

  #[test]
  fn listing_links_are_deduplicated_in_order() {
    let html = r#"<a href="b.pgn.zst">b</a> <a href="a.pgn.zst">a</a>
      <a href="b.pgn.zst">b again</a> <a href="a.pgn.zst.torrent">t</a>
      <a href="counts.txt">counts</a>"#;
    assert_eq!(parse_listing(html), ["b.pgn.zst", "a.pgn.zst"]);
  }

  #[test]
  fn sizes_round_to_two_decimals() {
    assert_eq!(size_gb(None), 0.0);
    assert_eq!(size_gb(Some(0)), 0.0);
    assert_eq!(size_gb(Some(1024 * 1024 * 1024)), 1.0);
    assert_eq!(size_gb(Some(1_610_612_736)), 1.5);
    assert_eq!(size_gb(Some(17_825_792)), 0.02);
  }

  #[test]
  fn base_dir_gains_a_trailing_slash() {
    let base = base_dir("https://example.test/standard").unwrap();
    assert_eq!(base.join("x.zst").unwrap().as_str(), "https://example.test/standard/x.zst");
  }
}
