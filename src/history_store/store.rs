//! SQLite-backed catalog/history store implementation.

use super::models::{Album, Artist, Scrobble, Track};
use super::schema::{HISTORY_SCHEMA_SQL, HISTORY_SCHEMA_VERSION};
use super::trait_def::{
    AggregateQuery, AggregateResult, AggregateRow, CatalogName, EntityLevel, HistoryStore,
    SqlValue, StoreError,
};
use anyhow::{Context, Result};
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{params, Connection, ToSql};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Integer(i) => Ok(ToSqlOutput::Owned(Value::Integer(*i))),
            SqlValue::Text(s) => Ok(ToSqlOutput::Owned(Value::Text(s.clone()))),
        }
    }
}

/// SQLite store for the catalog and listening history.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    /// Open (or create) a history database file.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open history database at {:?}", db_path.as_ref()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Open an in-memory database. Used by tests and tooling.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(HISTORY_SCHEMA_SQL)
            .context("Failed to create history schema")?;
        conn.pragma_update(None, "user_version", HISTORY_SCHEMA_VERSION)?;

        let artist_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0))
            .unwrap_or(0);
        let scrobble_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM listening_history", [], |r| r.get(0))
            .unwrap_or(0);
        info!(
            "Opened history store: {} artists, {} scrobbles",
            artist_count, scrobble_count
        );

        Ok(SqliteHistoryStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // =========================================================================
    // Write Operations (importer / fixtures)
    // =========================================================================

    pub fn insert_artist(&self, artist: &Artist) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO artists (id, name) VALUES (?1, ?2)",
            params![artist.id, artist.name],
        )?;
        Ok(())
    }

    pub fn insert_album(&self, album: &Album) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO albums (id, name, artist_id) VALUES (?1, ?2, ?3)",
            params![album.id, album.name, album.artist_id],
        )?;
        Ok(())
    }

    pub fn insert_track(&self, track: &Track) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO tracks (id, name, album_id) VALUES (?1, ?2, ?3)",
            params![track.id, track.name, track.album_id],
        )?;
        Ok(())
    }

    pub fn record_scrobble(&self, scrobble: &Scrobble) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO listening_history (user_id, track_id, timestamp, duration_played)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                scrobble.user_id,
                scrobble.track_id,
                scrobble.timestamp,
                scrobble.duration_played_ms
            ],
        )?;
        Ok(())
    }
}

fn map_db_err(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = &e {
        if ffi_err.code == rusqlite::ErrorCode::OperationInterrupted {
            return StoreError::Timeout;
        }
    }
    StoreError::Database(e.to_string())
}

impl HistoryStore for SqliteHistoryStore {
    fn catalog_names(&self, level: EntityLevel) -> Result<Vec<CatalogName>, StoreError> {
        let sql = match level {
            EntityLevel::Artist => "SELECT id, name FROM artists ORDER BY id",
            EntityLevel::Album => "SELECT id, name FROM albums ORDER BY id",
            EntityLevel::Track => "SELECT id, name FROM tracks ORDER BY id",
        };
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(sql).map_err(map_db_err)?;
        let names = stmt
            .query_map([], |r| {
                Ok(CatalogName {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })
            .map_err(map_db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_db_err)?;
        Ok(names)
    }

    fn run_aggregate(
        &self,
        query: &AggregateQuery,
        deadline: Duration,
    ) -> Result<AggregateResult, StoreError> {
        let conn = self.conn.lock().unwrap();

        // Interrupt the statement once the deadline passes; the interrupted
        // query surfaces as SQLITE_INTERRUPT and maps to StoreError::Timeout.
        let expires_at = Instant::now() + deadline;
        conn.progress_handler(1000, Some(move || Instant::now() >= expires_at));

        let result = run_aggregate_inner(&conn, query);

        conn.progress_handler(0, None::<fn() -> bool>);
        result
    }
}

fn run_aggregate_inner(
    conn: &Connection,
    query: &AggregateQuery,
) -> Result<AggregateResult, StoreError> {
    let mut stmt = conn.prepare(&query.sql).map_err(map_db_err)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(query.params.iter()), |r| {
            Ok(AggregateRow {
                entity_id: r.get(0)?,
                display_name: r.get(1)?,
                artist_name: r.get(2)?,
                play_count: r.get::<_, Option<i64>>(3)?.unwrap_or(0) as u64,
                total_duration_ms: r.get::<_, Option<i64>>(4)?.unwrap_or(0) as u64,
            })
        })
        .map_err(map_db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(map_db_err)?;

    let group_count = match &query.count_sql {
        Some(count_sql) => conn
            .query_row(
                count_sql,
                rusqlite::params_from_iter(query.count_params.iter()),
                |r| r.get::<_, i64>(0),
            )
            .map_err(map_db_err)? as u64,
        None => rows.len() as u64,
    };

    Ok(AggregateResult { rows, group_count })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> SqliteHistoryStore {
        let store = SqliteHistoryStore::open_in_memory().unwrap();
        store
            .insert_artist(&Artist {
                id: "ar1".into(),
                name: "Radiohead".into(),
            })
            .unwrap();
        store
            .insert_album(&Album {
                id: "al1".into(),
                name: "OK Computer".into(),
                artist_id: "ar1".into(),
            })
            .unwrap();
        store
            .insert_track(&Track {
                id: "t1".into(),
                name: "Airbag".into(),
                album_id: "al1".into(),
            })
            .unwrap();
        store
            .record_scrobble(&Scrobble {
                user_id: 1,
                track_id: "t1".into(),
                timestamp: 1_650_000_000,
                duration_played_ms: 284_000,
            })
            .unwrap();
        store
    }

    #[test]
    fn test_open_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let store = SqliteHistoryStore::open(&path).unwrap();
            store
                .insert_artist(&Artist {
                    id: "ar1".into(),
                    name: "Radiohead".into(),
                })
                .unwrap();
        }
        let reopened = SqliteHistoryStore::open(&path).unwrap();
        let artists = reopened.catalog_names(EntityLevel::Artist).unwrap();
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].name, "Radiohead");
    }

    #[test]
    fn test_catalog_names_per_level() {
        let store = seeded_store();
        let artists = store.catalog_names(EntityLevel::Artist).unwrap();
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].name, "Radiohead");

        let tracks = store.catalog_names(EntityLevel::Track).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, "t1");
    }

    #[test]
    fn test_run_aggregate_binds_params() {
        let store = seeded_store();
        let query = AggregateQuery {
            sql: "SELECT t.id, t.name, ar.name, COUNT(*), SUM(lh.duration_played)
                  FROM listening_history lh
                  JOIN tracks t ON lh.track_id = t.id
                  JOIN albums al ON t.album_id = al.id
                  JOIN artists ar ON al.artist_id = ar.id
                  WHERE lh.user_id = ?1
                  GROUP BY t.id, t.name, ar.name"
                .to_string(),
            params: vec![SqlValue::Integer(1)],
            count_sql: None,
            count_params: vec![],
        };
        let result = store
            .run_aggregate(&query, Duration::from_secs(5))
            .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].display_name, "Airbag");
        assert_eq!(result.rows[0].artist_name.as_deref(), Some("Radiohead"));
        assert_eq!(result.rows[0].play_count, 1);
        assert_eq!(result.rows[0].total_duration_ms, 284_000);
        assert_eq!(result.group_count, 1);
    }

    #[test]
    fn test_expired_deadline_surfaces_as_timeout() {
        let store = seeded_store();
        // Enough rows that the cross join cannot finish before the first
        // progress callback fires
        for i in 0..300 {
            store
                .record_scrobble(&Scrobble {
                    user_id: 1,
                    track_id: "t1".into(),
                    timestamp: 1_650_000_000 + i,
                    duration_played_ms: 1_000,
                })
                .unwrap();
        }
        let query = AggregateQuery {
            sql: "SELECT 'x', 'x', NULL, COUNT(*), SUM(a.duration_played)
                  FROM listening_history a, listening_history b, listening_history c"
                .to_string(),
            params: vec![],
            count_sql: None,
            count_params: vec![],
        };
        let err = store
            .run_aggregate(&query, Duration::from_millis(0))
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout));
    }

    #[test]
    fn test_unknown_user_yields_no_rows() {
        let store = seeded_store();
        let query = AggregateQuery {
            sql: "SELECT t.id, t.name, NULL, COUNT(*), SUM(lh.duration_played)
                  FROM listening_history lh
                  JOIN tracks t ON lh.track_id = t.id
                  WHERE lh.user_id = ?1
                  GROUP BY t.id, t.name"
                .to_string(),
            params: vec![SqlValue::Integer(99)],
            count_sql: None,
            count_params: vec![],
        };
        let result = store
            .run_aggregate(&query, Duration::from_secs(5))
            .unwrap();
        assert!(result.rows.is_empty());
    }
}
