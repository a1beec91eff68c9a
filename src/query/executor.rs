//! Executor: compiles a resolved query to parameterized SQL and runs it.
//!
//! Compilation is a pure function so the generated SQL can be asserted on
//! directly. Every user-derived value is bound, never interpolated; the only
//! text spliced into the statement comes from fixed lookup tables in this
//! module. Ordering carries a full tiebreak so equal counts always come back
//! in the same order.

use super::error::ExecutionError;
use super::spec::{Intent, ResolvedQuerySpec, ResultRow, ResultSet, SortKey, UserContext};
use crate::config::PipelineConfig;
use crate::history_store::{AggregateQuery, EntityLevel, HistoryStore, SqlValue};
use std::time::Duration;
use tracing::debug;

const BASE_FROM: &str = "FROM listening_history lh \
     JOIN tracks t ON lh.track_id = t.id \
     JOIN albums al ON t.album_id = al.id \
     JOIN artists ar ON al.artist_id = ar.id";

/// Select list, GROUP BY list and group key column for an aggregation level.
fn level_columns(level: EntityLevel) -> (&'static str, &'static str, &'static str) {
    match level {
        EntityLevel::Track => (
            "t.id AS entity_id, t.name AS display_name, ar.name AS artist_name",
            "t.id, t.name, ar.name",
            "t.id",
        ),
        EntityLevel::Album => (
            "al.id AS entity_id, al.name AS display_name, ar.name AS artist_name",
            "al.id, al.name, ar.name",
            "al.id",
        ),
        EntityLevel::Artist => (
            "ar.id AS entity_id, ar.name AS display_name, NULL AS artist_name",
            "ar.id, ar.name",
            "ar.id",
        ),
    }
}

fn entity_filter_column(level: EntityLevel) -> &'static str {
    match level {
        EntityLevel::Artist => "ar.id",
        EntityLevel::Album => "al.id",
        EntityLevel::Track => "t.id",
    }
}

/// Hour/weekday/month/year predicates evaluate in the user's local time, so
/// the raw UTC timestamp is shifted by the bound offset before formatting.
fn local_part(field: char) -> String {
    format!(
        "CAST(strftime('%{}', lh.timestamp + ?, 'unixepoch') AS INTEGER)",
        field
    )
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Compile a resolved query into a parameterized aggregation.
pub fn compile(spec: &ResolvedQuerySpec, user_id: i64, ctx: &UserContext) -> AggregateQuery {
    let offset_secs = i64::from(ctx.tz_offset_minutes) * 60;

    let mut clauses = vec!["lh.user_id = ?".to_string()];
    let mut params = vec![SqlValue::Integer(user_id)];

    if !spec.filter.ranges.is_empty() {
        let windows: Vec<&str> = spec
            .filter
            .ranges
            .iter()
            .map(|_| "(lh.timestamp >= ? AND lh.timestamp < ?)")
            .collect();
        clauses.push(format!("({})", windows.join(" OR ")));
        for &(start, end) in &spec.filter.ranges {
            params.push(SqlValue::Integer(start));
            params.push(SqlValue::Integer(end));
        }
    }

    if let Some(days) = &spec.filter.weekdays {
        clauses.push(format!("{} IN ({})", local_part('w'), placeholders(days.len())));
        params.push(SqlValue::Integer(offset_secs));
        params.extend(days.iter().map(|&d| SqlValue::Integer(i64::from(d))));
    }

    if let Some(months) = &spec.filter.months {
        clauses.push(format!(
            "{} IN ({})",
            local_part('m'),
            placeholders(months.len())
        ));
        params.push(SqlValue::Integer(offset_secs));
        params.extend(months.iter().map(|&m| SqlValue::Integer(i64::from(m))));
    }

    if let Some(year) = spec.filter.year {
        clauses.push(format!("{} = ?", local_part('Y')));
        params.push(SqlValue::Integer(offset_secs));
        params.push(SqlValue::Integer(i64::from(year)));
    }

    if !spec.filter.hours.is_empty() {
        let hour = local_part('H');
        let windows: Vec<String> = spec
            .filter
            .hours
            .iter()
            .map(|_| format!("({hour} >= ? AND {hour} < ?)"))
            .collect();
        clauses.push(format!("({})", windows.join(" OR ")));
        for &(start, end) in &spec.filter.hours {
            params.push(SqlValue::Integer(offset_secs));
            params.push(SqlValue::Integer(i64::from(start)));
            params.push(SqlValue::Integer(offset_secs));
            params.push(SqlValue::Integer(i64::from(end)));
        }
    }

    if !spec.entities.is_empty() {
        clauses.push(format!(
            "{} IN ({})",
            entity_filter_column(spec.entity_level),
            placeholders(spec.entities.len())
        ));
        params.extend(
            spec.entities
                .iter()
                .map(|e| SqlValue::Text(e.id.clone())),
        );
    }

    let where_sql = clauses.join(" AND ");

    if spec.intent == Intent::ListeningStats {
        let sql = format!(
            "SELECT 'all' AS entity_id, 'All listening' AS display_name, \
             NULL AS artist_name, COUNT(*) AS play_count, \
             COALESCE(SUM(lh.duration_played), 0) AS total_ms \
             {BASE_FROM} WHERE {where_sql}"
        );
        return AggregateQuery {
            sql,
            params,
            count_sql: None,
            count_params: vec![],
        };
    }

    let (select_cols, group_by, group_key) = level_columns(spec.level);
    let order_key = match spec.sort {
        SortKey::PlayCount => "play_count",
        SortKey::TotalDuration => "total_ms",
    };

    let count_sql = format!(
        "SELECT COUNT(*) FROM (SELECT {group_key} {BASE_FROM} \
         WHERE {where_sql} GROUP BY {group_by})"
    );
    let count_params = params.clone();

    let sql = format!(
        "SELECT {select_cols}, COUNT(*) AS play_count, \
         COALESCE(SUM(lh.duration_played), 0) AS total_ms \
         {BASE_FROM} WHERE {where_sql} GROUP BY {group_by} \
         ORDER BY {order_key} DESC, display_name ASC, entity_id ASC LIMIT ?"
    );
    params.push(SqlValue::Integer(i64::from(spec.limit)));

    AggregateQuery {
        sql,
        params,
        count_sql: Some(count_sql),
        count_params,
    }
}

/// Compile and run a resolved query against the store.
pub fn execute(
    store: &dyn HistoryStore,
    user_id: i64,
    spec: &ResolvedQuerySpec,
    ctx: &UserContext,
    config: &PipelineConfig,
) -> Result<ResultSet, ExecutionError> {
    let query = compile(spec, user_id, ctx);
    debug!("Executing aggregation: {}", query.sql);

    let deadline = Duration::from_millis(config.query_timeout_ms);
    let result = store.run_aggregate(&query, deadline)?;

    let mut rows: Vec<ResultRow> = result
        .rows
        .into_iter()
        .map(|r| ResultRow {
            entity_id: r.entity_id,
            display_name: r.display_name,
            artist_name: r.artist_name,
            play_count: r.play_count,
            total_duration_ms: r.total_duration_ms,
        })
        .collect();

    // An aggregate without GROUP BY always yields one row; a zero play
    // count there means no history matched at all.
    if spec.intent == Intent::ListeningStats {
        rows.retain(|r| r.play_count > 0);
        let count = rows.len() as u64;
        return Ok(ResultSet {
            rows,
            row_count_before_limit: count,
        });
    }

    Ok(ResultSet {
        rows,
        row_count_before_limit: result.group_count,
    })
}
