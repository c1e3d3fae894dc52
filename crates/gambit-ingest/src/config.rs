//! Run configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variables with this prefix override file values, e.g.
/// `GAMBIT_BATCH_SIZE=500`.
pub const ENV_PREFIX: &str = "GAMBIT";

/// Settings for one ingestion run, deserialised from `gambit.toml` and the
/// environment. Every field has a default so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
  pub database_path:       PathBuf,
  /// Directory holding `counts.txt`, the listing page and the archives.
  pub base_url:            String,
  /// Stop the snapshot phase once this many snapshots are stored.
  pub snapshots_threshold: u64,
  /// Archives at or above this compressed size are never downloaded.
  pub max_archive_size_gb: f64,
  /// Snapshot rows per transaction.
  pub batch_size:          usize,
  /// Log progress every time the snapshot count crosses a multiple of this.
  pub print_interval:      u64,
  /// Largest slice of compressed bytes fed to the decoder at once.
  pub chunk_size:          usize,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      database_path:       PathBuf::from("gambit.sqlite3"),
      base_url:            "https://database.lichess.org/standard/".to_owned(),
      snapshots_threshold: 10_000,
      max_archive_size_gb: 10.0,
      batch_size:          1_000,
      print_interval:      1_000,
      chunk_size:          16 * 1024,
    }
  }
}

impl IngestConfig {
  /// Layer the optional TOML file at `path` under `GAMBIT_*` variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
      .build()?
      .try_deserialize()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = IngestConfig::load(Path::new("/nonexistent/gambit.toml")).unwrap();
    assert_eq!(cfg.base_url, IngestConfig::default().base_url);
    assert_eq!(cfg.chunk_size, 16_384);
  }

  #[test]
  fn file_values_override_defaults() {
    let path = std::env::temp_dir().join(format!("gambit-config-{}.toml", std::process::id()));
    std::fs::write(&path, "batch_size = 250\nmax_archive_size_gb = 0.5\n").unwrap();

    let cfg = IngestConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cfg.batch_size, 250);
    assert_eq!(cfg.max_archive_size_gb, 0.5);
    assert_eq!(cfg.snapshots_threshold, 10_000);
  }
}
