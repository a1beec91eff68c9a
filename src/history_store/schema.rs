//! Database schema for the catalog and listening-history store.
//!
//! - artists/albums/tracks: the catalog the history entries point into
//! - listening_history: one row per recorded play (scrobble)

/// SQL schema for the history database (version 1).
pub const HISTORY_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS artists (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS albums (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    artist_id TEXT NOT NULL,

    FOREIGN KEY (artist_id) REFERENCES artists(id)
);

CREATE TABLE IF NOT EXISTS tracks (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    album_id TEXT NOT NULL,

    FOREIGN KEY (album_id) REFERENCES albums(id)
);

CREATE TABLE IF NOT EXISTS listening_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    track_id TEXT NOT NULL,

    -- Unix seconds, UTC
    timestamp INTEGER NOT NULL,
    -- Milliseconds of actual listening time
    duration_played INTEGER NOT NULL,

    FOREIGN KEY (track_id) REFERENCES tracks(id)
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_id);
CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id);
CREATE INDEX IF NOT EXISTS idx_history_user_ts ON listening_history(user_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_history_track ON listening_history(track_id);
"#;

/// Current schema version.
pub const HISTORY_SCHEMA_VERSION: i32 = 1;
