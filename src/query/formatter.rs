//! Formatter: renders a result set as narrative text.
//!
//! The text answer restates the filters the query actually ran with, so a
//! misparsed question is visible to the user. Structured rows are attached
//! separately by the pipeline boundary; nothing here touches the store.

use super::error::{QueryError, Warning};
use super::spec::{Intent, ResolvedQuerySpec, ResultSet, TimeFilter, TimeUnit, UserContext};
use crate::config::PipelineConfig;
use crate::history_store::EntityLevel;
use chrono::{TimeZone, Utc};

const WEEKDAY_NAMES: [&str; 7] = [
    "Sundays",
    "Mondays",
    "Tuesdays",
    "Wednesdays",
    "Thursdays",
    "Fridays",
    "Saturdays",
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Render an hour-of-day boundary in 12-hour clock form. 24 is the
/// end-exclusive midnight boundary.
fn format_hour(hour: u8) -> String {
    match hour {
        0 | 24 => "12AM".to_string(),
        12 => "12PM".to_string(),
        h if h < 12 => format!("{h}AM"),
        h => format!("{}PM", h - 12),
    }
}

fn join_words(items: &[String]) -> String {
    match items.len() {
        0 => String::new(),
        1 => items[0].clone(),
        2 => format!("{} and {}", items[0], items[1]),
        _ => format!(
            "{} and {}",
            items[..items.len() - 1].join(", "),
            items[items.len() - 1]
        ),
    }
}

/// Describe the normalized filter in words, with a leading space, or return
/// an empty string for an all-time query.
pub fn describe_filter(filter: &TimeFilter) -> String {
    let mut phrases: Vec<String> = Vec::new();

    for &(start, end) in &filter.ranges {
        let start_day = Utc
            .timestamp_opt(start, 0)
            .single()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| start.to_string());
        let end_day = Utc
            .timestamp_opt(end, 0)
            .single()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| end.to_string());
        phrases.push(format!("from {start_day} to {end_day}"));
    }

    if let Some(days) = &filter.weekdays {
        let names: Vec<String> = days
            .iter()
            .filter_map(|&d| WEEKDAY_NAMES.get(d as usize))
            .map(|s| s.to_string())
            .collect();
        if !names.is_empty() {
            phrases.push(format!("on {}", join_words(&names)));
        }
    }

    if let Some(months) = &filter.months {
        let names: Vec<String> = months
            .iter()
            .filter_map(|&m| MONTH_NAMES.get(m as usize - 1))
            .map(|s| s.to_string())
            .collect();
        if !names.is_empty() {
            phrases.push(format!("in {}", join_words(&names)));
        }
    }

    if let Some(year) = filter.year {
        phrases.push(format!("in {year}"));
    }

    if !filter.hours.is_empty() {
        let windows: Vec<String> = filter
            .hours
            .iter()
            .map(|&(start, end)| {
                format!("between {} and {}", format_hour(start), format_hour(end))
            })
            .collect();
        phrases.push(windows.join(" or "));
    }

    if phrases.is_empty() {
        String::new()
    } else {
        format!(" {}", phrases.join(" "))
    }
}

fn format_plays(count: u64) -> String {
    if count == 1 {
        "1 play".to_string()
    } else {
        format!("{count} plays")
    }
}

/// Render listening time in the caller's unit.
fn format_duration(ms: u64, unit: TimeUnit) -> String {
    match unit {
        TimeUnit::Hours => {
            let hours = ms as f64 / 3_600_000.0;
            let rendered = format!("{hours:.1}");
            if rendered == "1.0" {
                "1 hour".to_string()
            } else {
                format!("{rendered} hours")
            }
        }
        TimeUnit::Minutes => {
            let minutes = (ms as f64 / 60_000.0).round() as u64;
            if minutes == 1 {
                "1 minute".to_string()
            } else {
                format!("{minutes} minutes")
            }
        }
    }
}

fn row_label(level: EntityLevel, display_name: &str, artist_name: Option<&str>) -> String {
    match level {
        EntityLevel::Artist => display_name.to_string(),
        _ => format!(
            "\"{}\" by {}",
            display_name,
            artist_name.unwrap_or("Unknown Artist")
        ),
    }
}

fn level_plural(level: EntityLevel) -> &'static str {
    match level {
        EntityLevel::Artist => "artists",
        EntityLevel::Album => "albums",
        EntityLevel::Track => "tracks",
    }
}

/// Render the narrative answer for an executed query.
pub fn format_response(
    spec: &ResolvedQuerySpec,
    result: &ResultSet,
    ctx: &UserContext,
    config: &PipelineConfig,
    warnings: &[Warning],
) -> String {
    let filter_desc = describe_filter(&spec.filter);
    let mut lines: Vec<String> = Vec::new();

    if warnings.contains(&Warning::LowConfidence) {
        lines.push(
            "I may have misunderstood the question; here is my best guess.".to_string(),
        );
    }

    if result.rows.is_empty() {
        lines.push(format!(
            "No listening history matched{filter_desc}. Try broadening the filters."
        ));
        return lines.join("\n");
    }

    match spec.intent {
        Intent::ListeningStats => {
            let row = &result.rows[0];
            let times = if row.play_count == 1 {
                "once".to_string()
            } else {
                format!("{} times", row.play_count)
            };
            lines.push(format!(
                "You listened {times}{filter_desc}, for a total of {}.",
                format_duration(row.total_duration_ms, ctx.time_unit)
            ));
        }
        Intent::Compare => {
            lines.push(format!("Comparing{filter_desc}:"));
            for row in &result.rows {
                lines.push(format!(
                    "{}: {} ({})",
                    row_label(spec.level, &row.display_name, row.artist_name.as_deref()),
                    format_plays(row.play_count),
                    format_duration(row.total_duration_ms, ctx.time_unit)
                ));
            }
        }
        _ => {
            let shown = result.rows.len().min(config.narrative_rows);
            lines.push(format!(
                "Your top {}{filter_desc}:",
                level_plural(spec.level)
            ));
            for (i, row) in result.rows.iter().take(shown).enumerate() {
                lines.push(format!(
                    "{}. {} ({}, {})",
                    i + 1,
                    row_label(spec.level, &row.display_name, row.artist_name.as_deref()),
                    format_plays(row.play_count),
                    format_duration(row.total_duration_ms, ctx.time_unit)
                ));
            }
            if result.row_count_before_limit > result.rows.len() as u64 {
                lines.push(format!(
                    "Showing top {} of {}.",
                    result.rows.len(),
                    result.row_count_before_limit
                ));
            }
        }
    }

    lines.join("\n")
}

/// Render a terminal failure as a clarification message.
pub fn format_error(err: &QueryError) -> String {
    match err {
        QueryError::Validation(e) => format!("I can't run that as asked: {e}."),
        QueryError::Resolution(e) => format!("I couldn't find what you meant: {e}."),
        QueryError::Execution(e) => format!("Something went wrong answering that: {e}."),
    }
}
