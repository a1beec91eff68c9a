//! Query representations passed between the pipeline stages.
//!
//! `QuerySpec` is the parser's best-effort reading of the question text,
//! `ResolvedQuerySpec` is the validated, defaulted form the executor runs.
//! Both are created and discarded within a single pipeline invocation.

use crate::history_store::EntityLevel;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// The analytical question category. Closed set; new intents are added to
/// the parser's keyword table, never as ad hoc string checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TopTracks,
    TopAlbums,
    TopArtists,
    ListeningStats,
    Compare,
}

impl Intent {
    /// The catalog level this intent aggregates at.
    pub fn default_level(&self) -> EntityLevel {
        match self {
            Intent::TopTracks | Intent::ListeningStats => EntityLevel::Track,
            Intent::TopAlbums => EntityLevel::Album,
            Intent::TopArtists | Intent::Compare => EntityLevel::Artist,
        }
    }
}

/// Ranking key. Both orders are descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    PlayCount,
    TotalDuration,
}

/// One typed, independently extracted time-domain filter.
///
/// Constraints of different kinds compose by conjunction; constraints of the
/// same kind compose by union, except two different explicit years which
/// conflict outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeConstraint {
    /// Explicit instant range, end-exclusive.
    AbsoluteRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Days of the week, 0 = Sunday .. 6 = Saturday (SQLite `%w` numbering).
    WeekdaySet(BTreeSet<u8>),
    /// Calendar months, 1 = January .. 12 = December. Seasons resolve here:
    /// Winter = {12, 1, 2}, Spring = {3, 4, 5}, Summer = {6, 7, 8},
    /// Fall = {9, 10, 11}.
    MonthSet(BTreeSet<u8>),
    /// A four-digit calendar year.
    Year(i32),
    /// Hour-of-day window, end-exclusive, in the caller's timezone.
    HourRange { start: u8, end: u8 },
}

/// A raw entity name mentioned in the question, with an optional level hint
/// ("by &lt;name&gt;" implies an artist).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFragment {
    pub text: String,
    pub level_hint: Option<EntityLevel>,
}

/// Parser output: unresolved, best-effort, always well-formed.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub intent: Intent,
    /// Catalog level to aggregate at (entity nouns can override the
    /// intent's default, e.g. "compare ... albums").
    pub level: EntityLevel,
    pub limit: u32,
    pub time_filters: Vec<TimeConstraint>,
    pub entity_name_fragments: Vec<EntityFragment>,
    pub sort: SortKey,
    /// How much of the input mapped to known grammar, in [0, 1].
    pub confidence: f64,
}

/// All time constraints merged into one normalized filter per kind.
/// An empty filter means all time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeFilter {
    /// Union of absolute ranges as unix-second intervals, end-exclusive.
    pub ranges: Vec<(i64, i64)>,
    pub weekdays: Option<BTreeSet<u8>>,
    pub months: Option<BTreeSet<u8>>,
    pub year: Option<i32>,
    /// Union of hour-of-day windows, end-exclusive.
    pub hours: Vec<(u8, u8)>,
}

impl TimeFilter {
    pub fn is_all_time(&self) -> bool {
        self.ranges.is_empty()
            && self.weekdays.is_none()
            && self.months.is_none()
            && self.year.is_none()
            && self.hours.is_empty()
    }
}

/// An entity name fragment resolved to a catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntity {
    pub id: String,
    pub name: String,
}

/// Fully validated and defaulted query. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ResolvedQuerySpec {
    pub intent: Intent,
    pub level: EntityLevel,
    pub limit: u32,
    pub filter: TimeFilter,
    /// Catalog rows the query is restricted to, all at `entity_level`.
    pub entities: Vec<ResolvedEntity>,
    /// Level the entity restriction applies at (an artist filter on a
    /// track ranking restricts by artist, not by track).
    pub entity_level: EntityLevel,
    pub sort: SortKey,
    pub confidence: f64,
}

/// One aggregated result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub entity_id: String,
    pub display_name: String,
    /// Owning artist for track/album rows; absent for artist rows.
    pub artist_name: Option<String>,
    pub play_count: u64,
    pub total_duration_ms: u64,
}

/// Ordered aggregation result, produced fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    pub rows: Vec<ResultRow>,
    /// Total qualifying groups before the limit was applied, for
    /// "showing top N of M" messaging.
    pub row_count_before_limit: u64,
}

/// Caller-selected unit for rendering listening time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Minutes,
    Hours,
}

/// Caller-supplied request context. The clock instant is injected so that
/// identical inputs always produce identical results.
#[derive(Debug, Clone)]
pub struct UserContext {
    /// Offset of the user's timezone from UTC, in minutes.
    pub tz_offset_minutes: i32,
    pub time_unit: TimeUnit,
    pub now_utc: DateTime<Utc>,
}

impl UserContext {
    pub fn new(tz_offset_minutes: i32, time_unit: TimeUnit) -> Self {
        Self {
            tz_offset_minutes,
            time_unit,
            now_utc: Utc::now(),
        }
    }

    pub fn with_now(mut self, now_utc: DateTime<Utc>) -> Self {
        self.now_utc = now_utc;
        self
    }
}
