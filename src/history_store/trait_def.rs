//! HistoryStore trait definition.
//!
//! Abstracts the catalog/history backend so the pipeline can run against the
//! production SQLite store or an in-memory store in tests.

use std::time::Duration;
use thiserror::Error;

/// Catalog level an aggregation or name lookup applies at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityLevel {
    Artist,
    Album,
    Track,
}

impl EntityLevel {
    pub fn noun(&self) -> &'static str {
        match self {
            EntityLevel::Artist => "artist",
            EntityLevel::Album => "album",
            EntityLevel::Track => "track",
        }
    }
}

/// A catalog row's identity, for name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogName {
    pub id: String,
    pub name: String,
}

/// A value bound into a compiled query. Everything the executor produces is
/// bound, never interpolated.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Integer(i64),
    Text(String),
}

/// A fully compiled, parameterized aggregation query.
///
/// `sql` must select exactly five columns: entity id, display name, artist
/// name (nullable), play count, total duration in milliseconds. `count_sql`,
/// when present, must select a single integer: the number of qualifying
/// groups before the limit.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub count_sql: Option<String>,
    pub count_params: Vec<SqlValue>,
}

/// One row of an executed aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRow {
    pub entity_id: String,
    pub display_name: String,
    pub artist_name: Option<String>,
    pub play_count: u64,
    pub total_duration_ms: u64,
}

/// Executed aggregation rows plus the pre-limit group count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    pub rows: Vec<AggregateRow>,
    pub group_count: u64,
}

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query exceeded its deadline")]
    Timeout,

    #[error("database error: {0}")]
    Database(String),
}

/// Trait for catalog/history storage backends.
pub trait HistoryStore: Send + Sync {
    /// All (id, name) pairs at the given catalog level, for name resolution
    /// and for the offline duplicate finder.
    fn catalog_names(&self, level: EntityLevel) -> Result<Vec<CatalogName>, StoreError>;

    /// Run a compiled aggregation under a deadline. A query that exceeds the
    /// deadline returns `StoreError::Timeout` rather than blocking.
    fn run_aggregate(
        &self,
        query: &AggregateQuery,
        deadline: Duration,
    ) -> Result<AggregateResult, StoreError>;
}
