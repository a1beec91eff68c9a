//! Analyzer: validates a `QuerySpec` and resolves it against the catalog.
//!
//! Constraint merging is pure; catalog resolution is the one stage that
//! reads the store outside the executor. Constraints of different kinds
//! compose by conjunction; same-kind constraints union, except two
//! different explicit years which are rejected outright.

use super::error::{QueryError, ResolutionError, ValidationError};
use super::spec::{Intent, QuerySpec, ResolvedEntity, ResolvedQuerySpec, TimeConstraint, TimeFilter};
use crate::config::PipelineConfig;
use crate::history_store::{EntityLevel, HistoryStore};
use crate::matching::{best_match, Candidate, NameMatch};
use std::collections::BTreeSet;
use tracing::debug;

/// Merge typed constraints into one normalized filter per kind.
pub fn merge_time_constraints(
    constraints: &[TimeConstraint],
) -> Result<TimeFilter, ValidationError> {
    let mut filter = TimeFilter::default();
    for constraint in constraints {
        match constraint {
            TimeConstraint::AbsoluteRange { start, end } => {
                if end <= start {
                    return Err(ValidationError::InvalidRange);
                }
                filter.ranges.push((start.timestamp(), end.timestamp()));
            }
            TimeConstraint::WeekdaySet(days) => {
                filter
                    .weekdays
                    .get_or_insert_with(BTreeSet::new)
                    .extend(days.iter().copied());
            }
            TimeConstraint::MonthSet(months) => {
                filter
                    .months
                    .get_or_insert_with(BTreeSet::new)
                    .extend(months.iter().copied());
            }
            TimeConstraint::Year(year) => match filter.year {
                Some(existing) if existing != *year => {
                    return Err(ValidationError::ConflictingYears(existing, *year));
                }
                _ => filter.year = Some(*year),
            },
            TimeConstraint::HourRange { start, end } => {
                if start >= end || *end > 24 {
                    return Err(ValidationError::InvalidHourRange {
                        start: *start,
                        end: *end,
                    });
                }
                filter.hours.push((*start, *end));
            }
        }
    }
    filter.ranges = merge_intervals(filter.ranges);
    filter.hours = merge_hour_windows(filter.hours);
    Ok(filter)
}

fn merge_intervals(mut ranges: Vec<(i64, i64)>) -> Vec<(i64, i64)> {
    ranges.sort_unstable();
    let mut merged: Vec<(i64, i64)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn merge_hour_windows(mut hours: Vec<(u8, u8)>) -> Vec<(u8, u8)> {
    hours.sort_unstable();
    let mut merged: Vec<(u8, u8)> = Vec::with_capacity(hours.len());
    for (start, end) in hours {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn resolve_fragment(
    fragment: &str,
    level: EntityLevel,
    candidates: &[Candidate],
    threshold: f64,
) -> Result<ResolvedEntity, ResolutionError> {
    match best_match(fragment, candidates, threshold) {
        NameMatch::Exact { index } => Ok(ResolvedEntity {
            id: candidates[index].id.clone(),
            name: candidates[index].name.clone(),
        }),
        NameMatch::Fuzzy { index, score } => {
            debug!(
                "Fuzzy-matched \"{}\" to \"{}\" (score {:.2})",
                fragment, candidates[index].name, score
            );
            Ok(ResolvedEntity {
                id: candidates[index].id.clone(),
                name: candidates[index].name.clone(),
            })
        }
        NameMatch::Ambiguous { first, second, .. } => Err(ResolutionError::Ambiguous {
            fragment: fragment.to_string(),
            first: candidates[first].name.clone(),
            second: candidates[second].name.clone(),
        }),
        NameMatch::NoMatch => Err(ResolutionError::Unknown {
            fragment: fragment.to_string(),
            level: level.noun(),
        }),
    }
}

/// Validate a parsed spec and resolve its entity names against the catalog.
pub fn analyze(
    spec: &QuerySpec,
    store: &dyn HistoryStore,
    config: &PipelineConfig,
) -> Result<ResolvedQuerySpec, QueryError> {
    if spec.limit == 0 {
        return Err(ValidationError::InvalidLimit.into());
    }
    let filter = merge_time_constraints(&spec.time_filters)?;

    // All named entities resolve at a single level. A hint wins ("by X"
    // restricts a track ranking by artist, not by track); without one the
    // fragment names an entity at the query's own level (a quoted track
    // name in a track query).
    let entity_level = if spec.intent == Intent::Compare {
        spec.level
    } else {
        spec.entity_name_fragments
            .iter()
            .find_map(|f| f.level_hint)
            .unwrap_or(spec.level)
    };

    let mut entities = Vec::with_capacity(spec.entity_name_fragments.len());
    if !spec.entity_name_fragments.is_empty() {
        let candidates: Vec<Candidate> = store
            .catalog_names(entity_level)
            .map_err(super::error::ExecutionError::from)?
            .into_iter()
            .map(|n| Candidate {
                id: n.id,
                name: n.name,
            })
            .collect();
        for fragment in &spec.entity_name_fragments {
            entities.push(resolve_fragment(
                &fragment.text,
                entity_level,
                &candidates,
                config.fuzzy_match_threshold,
            )?);
        }
    }

    Ok(ResolvedQuerySpec {
        intent: spec.intent,
        level: spec.level,
        limit: spec.limit,
        filter,
        entities,
        entity_level,
        sort: spec.sort,
        confidence: spec.confidence,
    })
}
