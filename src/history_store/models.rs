//! Catalog and listening-history row types.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artist_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub album_id: String,
}

/// One recorded play event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scrobble {
    pub user_id: i64,
    pub track_id: String,
    /// Unix timestamp of the play, in seconds UTC.
    pub timestamp: i64,
    /// Listening time in milliseconds.
    pub duration_played_ms: i64,
}
