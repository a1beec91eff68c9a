//! Shared fixtures: an in-memory store seeded with a small but varied
//! listening history, and a request context with a pinned clock.

use chrono::{DateTime, TimeZone, Utc};
use musicmuse_query::history_store::{Album, Artist, Scrobble, Track};
use musicmuse_query::{PipelineConfig, SqliteHistoryStore, TimeUnit, UserContext};

pub const USER_ID: i64 = 1;
pub const PLAY_MS: i64 = 200_000;

/// Pinned "now": Thursday 2023-06-01 12:00 UTC.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()
}

pub fn test_ctx() -> UserContext {
    UserContext::new(0, TimeUnit::Hours).with_now(test_now())
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig::default()
}

/// Catalog: five artists (including a near-duplicate pair and a name with
/// diacritics), four albums, five tracks.
///
/// History for user 1, all plays 200s long:
/// - Friday 2022-07-15 19:00 UTC: Airbag x5, Hysteria x2
/// - Sunday 2023-01-08 10:00 UTC: Hysteria x4, One More Time x1
/// - Tuesday 2023-02-14 22:00 UTC: Formation x2
/// - Monday 2023-05-15 08:00 UTC: Paranoid Android x3
pub fn seeded_store() -> SqliteHistoryStore {
    let store = SqliteHistoryStore::open_in_memory().unwrap();

    let artists = [
        ("ar1", "Radiohead"),
        ("ar2", "Muse"),
        ("ar3", "Daft Punky"),
        ("ar4", "Daft Punks"),
        ("ar5", "Beyoncé"),
    ];
    for (id, name) in artists {
        store
            .insert_artist(&Artist {
                id: id.into(),
                name: name.into(),
            })
            .unwrap();
    }

    let albums = [
        ("al1", "OK Computer", "ar1"),
        ("al2", "Absolution", "ar2"),
        ("al3", "Discovery", "ar3"),
        ("al5", "Lemonade", "ar5"),
    ];
    for (id, name, artist_id) in albums {
        store
            .insert_album(&Album {
                id: id.into(),
                name: name.into(),
                artist_id: artist_id.into(),
            })
            .unwrap();
    }

    let tracks = [
        ("t1", "Airbag", "al1"),
        ("t2", "Paranoid Android", "al1"),
        ("t3", "Hysteria", "al2"),
        ("t4", "One More Time", "al3"),
        ("t5", "Formation", "al5"),
    ];
    for (id, name, album_id) in tracks {
        store
            .insert_track(&Track {
                id: id.into(),
                name: name.into(),
                album_id: album_id.into(),
            })
            .unwrap();
    }

    let friday_evening = Utc.with_ymd_and_hms(2022, 7, 15, 19, 0, 0).unwrap();
    let sunday_morning = Utc.with_ymd_and_hms(2023, 1, 8, 10, 0, 0).unwrap();
    let tuesday_night = Utc.with_ymd_and_hms(2023, 2, 14, 22, 0, 0).unwrap();
    let monday_morning = Utc.with_ymd_and_hms(2023, 5, 15, 8, 0, 0).unwrap();

    let sessions = [
        ("t1", friday_evening, 5),
        ("t3", friday_evening, 2),
        ("t3", sunday_morning, 4),
        ("t4", sunday_morning, 1),
        ("t5", tuesday_night, 2),
        ("t2", monday_morning, 3),
    ];
    for (track_id, at, plays) in sessions {
        for i in 0..plays {
            store
                .record_scrobble(&Scrobble {
                    user_id: USER_ID,
                    track_id: track_id.into(),
                    timestamp: at.timestamp() + i,
                    duration_played_ms: PLAY_MS,
                })
                .unwrap();
        }
    }

    store
}
