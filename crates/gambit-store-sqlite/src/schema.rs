//! SQL schema for the gambit SQLite store.
//!
//! Executed once at connection startup. The layout version is recorded in
//! `PRAGMA user_version`; future migrations will be gated on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per remote archive. Only `processed` is ever updated.
CREATE TABLE IF NOT EXISTS files_metadata (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    url       TEXT    NOT NULL UNIQUE,
    filename  TEXT    NOT NULL,
    games     INTEGER NOT NULL DEFAULT 0,
    size_gb   REAL    NOT NULL DEFAULT 0,
    processed INTEGER NOT NULL DEFAULT 0
);

-- Raw PGN text of one game. `content_hash` is the dedup identity.
CREATE TABLE IF NOT EXISTS raw_records (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id      INTEGER NOT NULL REFERENCES files_metadata(id),
    body         TEXT    NOT NULL,
    content_hash TEXT    NOT NULL UNIQUE,   -- hex SHA-256 of body
    processed    INTEGER NOT NULL DEFAULT 0
);

-- Append-only; one row per ply.
CREATE TABLE IF NOT EXISTS game_snapshots (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    raw_record_id INTEGER NOT NULL REFERENCES raw_records(id),
    move_number   INTEGER NOT NULL,   -- 1-based ply
    turn          TEXT    NOT NULL,   -- 'w' | 'b'
    move          TEXT    NOT NULL,   -- SAN
    position      TEXT    NOT NULL    -- FEN after the move
);

CREATE TABLE IF NOT EXISTS game_statistics (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    raw_record_id     INTEGER NOT NULL UNIQUE REFERENCES raw_records(id),
    event             TEXT,
    site              TEXT,
    date              TEXT,
    round             TEXT,
    white             TEXT,
    black             TEXT,
    result            TEXT,
    white_rating      INTEGER,
    black_rating      INTEGER,
    white_rating_diff INTEGER,
    black_rating_diff INTEGER,
    time_control      TEXT,
    opening_code      TEXT,
    opening_name      TEXT,
    termination       TEXT,
    utc_date          TEXT,
    utc_time          TEXT,
    variant           TEXT,
    source_url        TEXT,
    total_moves       INTEGER NOT NULL
);

-- Insertion order is the canonical vocabulary order.
CREATE TABLE IF NOT EXISTS legal_moves (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    move        TEXT    NOT NULL UNIQUE,
    piece_types TEXT    NOT NULL   -- JSON array of piece kinds
);

-- Cached encodings; blobs hold little-endian f32 values.
CREATE TABLE IF NOT EXISTS processed_snapshots (
    snapshot_id       INTEGER PRIMARY KEY REFERENCES game_snapshots(id),
    board_encoding    BLOB    NOT NULL,
    metadata_encoding BLOB    NOT NULL,
    chosen_move_index INTEGER NOT NULL,
    valid_moves_mask  BLOB    NOT NULL
);

CREATE INDEX IF NOT EXISTS raw_records_pending_idx ON raw_records(processed, id);
CREATE INDEX IF NOT EXISTS raw_records_file_idx    ON raw_records(file_id);
CREATE INDEX IF NOT EXISTS game_snapshots_ply_idx  ON game_snapshots(raw_record_id, move_number);
CREATE INDEX IF NOT EXISTS files_metadata_size_idx ON files_metadata(processed, size_gb);

PRAGMA user_version = 1;
";
