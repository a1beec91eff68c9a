//! Time-Expression Resolver.
//!
//! Scans question text for time phrases and resolves each one into a typed
//! `TimeConstraint`. Scanning is exhaustive rather than first-match, which is
//! what lets "Fridays in the Summer of 2022 after 6PM" yield four independent
//! constraints. Fragments that look temporal but cannot be resolved are
//! dropped and counted against parse confidence.

use super::spec::{TimeConstraint, UserContext};
use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref WEEKDAY_RE: Regex =
        Regex::new(r"\b(sunday|monday|tuesday|wednesday|thursday|friday|saturday)s?\b").unwrap();
    static ref SEASON_RE: Regex =
        Regex::new(r"\b(winter|spring|summer|fall|autumn)\b").unwrap();
    // Month names only count as time expressions after a preposition;
    // a bare "may" is almost always the verb.
    static ref MONTH_RE: Regex = Regex::new(
        r"\b(?:in|during|of)\s+(january|february|march|april|may|june|july|august|september|october|november|december)\b"
    )
    .unwrap();
    static ref YEAR_RE: Regex = Regex::new(r"\b((?:19|20)\d{2})\b").unwrap();
    static ref RELATIVE_RE: Regex = Regex::new(
        r"\b(all time|this week|past week|last week|this month|past month|last month|this year|current year)\b"
    )
    .unwrap();
    static ref BETWEEN_RE: Regex = Regex::new(
        r"\bbetween\s+(\d{1,2})(?::\d{2})?\s*(am|pm)?\s+and\s+(\d{1,2})(?::\d{2})?\s*(am|pm)?\b"
    )
    .unwrap();
    static ref AFTER_RE: Regex =
        Regex::new(r"\bafter\s+(?:(\d{1,2})(?::\d{2})?\s*(am|pm)?|(noon)|(midnight))\b").unwrap();
    static ref BEFORE_RE: Regex =
        Regex::new(r"\bbefore\s+(?:(\d{1,2})(?::\d{2})?\s*(am|pm)?|(noon)|(midnight))\b").unwrap();
    static ref EVENING_CUE_RE: Regex =
        Regex::new(r"\b(night|evening|tonight|dinner|pm)\b").unwrap();
}

/// Everything the resolver extracted from one question.
#[derive(Debug, Clone, Default)]
pub struct TimeScan {
    pub constraints: Vec<TimeConstraint>,
    /// Byte spans of the matched phrases, so the parser can exclude them
    /// from entity-name extraction and count them toward grammar coverage.
    pub spans: Vec<(usize, usize)>,
    /// "all time" was stated explicitly.
    pub all_time: bool,
    /// Count of 12-hour values resolved without an AM/PM marker.
    pub ambiguous_hours: usize,
}

fn weekday_number(name: &str) -> u8 {
    // SQLite strftime('%w') numbering: 0 = Sunday
    match name {
        "sunday" => 0,
        "monday" => 1,
        "tuesday" => 2,
        "wednesday" => 3,
        "thursday" => 4,
        "friday" => 5,
        "saturday" => 6,
        _ => unreachable!("weekday regex only matches known names"),
    }
}

fn season_months(name: &str) -> BTreeSet<u8> {
    let months: &[u8] = match name {
        "winter" => &[12, 1, 2],
        "spring" => &[3, 4, 5],
        "summer" => &[6, 7, 8],
        "fall" | "autumn" => &[9, 10, 11],
        _ => unreachable!("season regex only matches known names"),
    };
    months.iter().copied().collect()
}

fn month_number(name: &str) -> u8 {
    match name {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        "december" => 12,
        _ => unreachable!("month regex only matches known names"),
    }
}

/// Resolve a 12/24-hour value with an optional AM/PM marker.
///
/// Unmarked values in the 12-hour range are a guess: values up to 7 read as
/// evening when the question carries an evening cue, otherwise as morning.
/// Either way the guess is flagged so confidence can reflect it.
fn resolve_hour(hour: u32, period: Option<&str>, evening_cue: bool) -> Option<(u8, bool)> {
    if hour > 23 {
        return None;
    }
    match period {
        Some("pm") => {
            let h = if hour < 12 { hour + 12 } else { hour };
            Some((h as u8, false))
        }
        Some("am") => {
            let h = if hour == 12 { 0 } else { hour };
            Some((h as u8, false))
        }
        _ => {
            if hour == 0 || hour >= 13 {
                // Unambiguous 24-hour form
                Some((hour as u8, false))
            } else if hour <= 7 && evening_cue {
                Some((hour as u8 + 12, true))
            } else {
                Some((hour as u8, true))
            }
        }
    }
}

fn local_midnight_of_jan1(ctx: &UserContext) -> chrono::DateTime<Utc> {
    let offset = Duration::minutes(ctx.tz_offset_minutes as i64);
    let local_now = ctx.now_utc + offset;
    let jan1 = NaiveDate::from_ymd_opt(local_now.year(), 1, 1)
        .expect("January 1st always exists")
        .and_hms_opt(0, 0, 0)
        .expect("midnight always exists");
    Utc.from_utc_datetime(&jan1) - offset
}

/// Scan lowercased question text for time expressions.
pub fn scan_time_expressions(text: &str, ctx: &UserContext) -> TimeScan {
    let mut scan = TimeScan::default();
    let evening_cue = EVENING_CUE_RE.is_match(text);

    // "between H and H" first so the plain after/before patterns cannot
    // partially re-match inside it.
    let mut hour_spans: Vec<(usize, usize)> = Vec::new();
    for caps in BETWEEN_RE.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        hour_spans.push((whole.start(), whole.end()));
        scan.spans.push((whole.start(), whole.end()));

        let first_period = caps.get(2).map(|m| m.as_str());
        let second_period = caps.get(4).map(|m| m.as_str());
        // "between 6 and 9pm": the trailing marker applies to both ends
        let inherited_first = first_period.or(second_period);
        let inherited_second = second_period.or(first_period);

        let start = caps[1]
            .parse::<u32>()
            .ok()
            .and_then(|h| resolve_hour(h, inherited_first, evening_cue));
        let end = caps[3]
            .parse::<u32>()
            .ok()
            .and_then(|h| resolve_hour(h, inherited_second, evening_cue));

        if let (Some((start, start_guessed)), Some((end, end_guessed))) = (start, end) {
            if start_guessed || end_guessed {
                scan.ambiguous_hours += 1;
            }
            scan.constraints.push(TimeConstraint::HourRange { start, end });
        }
    }

    let scan_edge = |re: &Regex, is_after: bool, scan: &mut TimeScan| {
        for caps in re.captures_iter(text) {
            let whole = caps.get(0).expect("group 0 always present");
            if hour_spans
                .iter()
                .any(|&(s, e)| whole.start() >= s && whole.end() <= e)
            {
                continue;
            }
            scan.spans.push((whole.start(), whole.end()));

            let resolved = if caps.get(3).is_some() {
                Some((12u8, false)) // noon
            } else if caps.get(4).is_some() {
                Some((0u8, false)) // midnight
            } else {
                caps.get(1)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .and_then(|h| resolve_hour(h, caps.get(2).map(|m| m.as_str()), evening_cue))
            };

            if let Some((hour, guessed)) = resolved {
                if guessed {
                    scan.ambiguous_hours += 1;
                }
                let constraint = if is_after {
                    TimeConstraint::HourRange {
                        start: hour,
                        end: 24,
                    }
                } else {
                    // "before midnight" covers the whole day
                    TimeConstraint::HourRange {
                        start: 0,
                        end: if hour == 0 { 24 } else { hour },
                    }
                };
                scan.constraints.push(constraint);
            }
        }
    };
    scan_edge(&AFTER_RE, true, &mut scan);
    scan_edge(&BEFORE_RE, false, &mut scan);

    for caps in WEEKDAY_RE.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        scan.spans.push((whole.start(), whole.end()));
        let mut set = BTreeSet::new();
        set.insert(weekday_number(&caps[1]));
        scan.constraints.push(TimeConstraint::WeekdaySet(set));
    }

    for caps in SEASON_RE.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        scan.spans.push((whole.start(), whole.end()));
        scan.constraints
            .push(TimeConstraint::MonthSet(season_months(&caps[1])));
    }

    for caps in MONTH_RE.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        scan.spans.push((whole.start(), whole.end()));
        let mut set = BTreeSet::new();
        set.insert(month_number(&caps[1]));
        scan.constraints.push(TimeConstraint::MonthSet(set));
    }

    for caps in YEAR_RE.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        scan.spans.push((whole.start(), whole.end()));
        if let Ok(year) = caps[1].parse::<i32>() {
            scan.constraints.push(TimeConstraint::Year(year));
        }
    }

    for caps in RELATIVE_RE.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        scan.spans.push((whole.start(), whole.end()));
        match &caps[1] {
            "all time" => scan.all_time = true,
            "this week" | "past week" | "last week" => {
                scan.constraints.push(TimeConstraint::AbsoluteRange {
                    start: ctx.now_utc - Duration::days(7),
                    end: ctx.now_utc,
                });
            }
            "this month" | "past month" | "last month" => {
                scan.constraints.push(TimeConstraint::AbsoluteRange {
                    start: ctx.now_utc - Duration::days(30),
                    end: ctx.now_utc,
                });
            }
            "this year" | "current year" => {
                scan.constraints.push(TimeConstraint::AbsoluteRange {
                    start: local_midnight_of_jan1(ctx),
                    end: ctx.now_utc,
                });
            }
            _ => {}
        }
    }

    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::spec::TimeUnit;
    use chrono::TimeZone;

    fn ctx() -> UserContext {
        UserContext::new(0, TimeUnit::Hours)
            .with_now(Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap())
    }

    fn constraints(text: &str) -> Vec<TimeConstraint> {
        scan_time_expressions(text, &ctx()).constraints
    }

    #[test]
    fn test_weekday_singular_and_plural() {
        let friday: BTreeSet<u8> = [5].into_iter().collect();
        assert_eq!(
            constraints("on friday"),
            vec![TimeConstraint::WeekdaySet(friday.clone())]
        );
        assert_eq!(
            constraints("on fridays"),
            vec![TimeConstraint::WeekdaySet(friday)]
        );
    }

    #[test]
    fn test_season_with_trailing_year_binds_separately() {
        let got = constraints("in the summer of 2022");
        assert!(got.contains(&TimeConstraint::MonthSet(
            [6, 7, 8].into_iter().collect()
        )));
        assert!(got.contains(&TimeConstraint::Year(2022)));
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn test_compound_expression_yields_independent_constraints() {
        let got = constraints("on fridays in the summer of 2022 after 6pm");
        assert_eq!(got.len(), 4);
        assert!(got.contains(&TimeConstraint::WeekdaySet([5].into_iter().collect())));
        assert!(got.contains(&TimeConstraint::MonthSet(
            [6, 7, 8].into_iter().collect()
        )));
        assert!(got.contains(&TimeConstraint::Year(2022)));
        assert!(got.contains(&TimeConstraint::HourRange { start: 18, end: 24 }));
    }

    #[test]
    fn test_after_pm() {
        assert_eq!(
            constraints("after 6pm"),
            vec![TimeConstraint::HourRange { start: 18, end: 24 }]
        );
    }

    #[test]
    fn test_before_noon() {
        assert_eq!(
            constraints("before noon"),
            vec![TimeConstraint::HourRange { start: 0, end: 12 }]
        );
    }

    #[test]
    fn test_between_with_single_trailing_marker() {
        assert_eq!(
            constraints("between 6 and 9pm"),
            vec![TimeConstraint::HourRange { start: 18, end: 21 }]
        );
    }

    #[test]
    fn test_ambiguous_hour_without_marker_is_flagged() {
        let scan = scan_time_expressions("after 6", &ctx());
        assert_eq!(
            scan.constraints,
            vec![TimeConstraint::HourRange { start: 6, end: 24 }]
        );
        assert_eq!(scan.ambiguous_hours, 1);
    }

    #[test]
    fn test_evening_cue_flips_small_hours_to_pm() {
        let scan = scan_time_expressions("after 6 at night", &ctx());
        assert_eq!(
            scan.constraints,
            vec![TimeConstraint::HourRange { start: 18, end: 24 }]
        );
        assert_eq!(scan.ambiguous_hours, 1);
    }

    #[test]
    fn test_this_year_is_year_to_date() {
        let got = constraints("this year");
        match &got[0] {
            TimeConstraint::AbsoluteRange { start, end } => {
                assert_eq!(*start, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
                assert_eq!(*end, ctx().now_utc);
            }
            other => panic!("expected absolute range, got {other:?}"),
        }
    }

    #[test]
    fn test_this_week_is_last_seven_days() {
        let got = constraints("this week");
        match &got[0] {
            TimeConstraint::AbsoluteRange { start, end } => {
                assert_eq!(*end - *start, Duration::days(7));
            }
            other => panic!("expected absolute range, got {other:?}"),
        }
    }

    #[test]
    fn test_all_time_adds_no_constraint() {
        let scan = scan_time_expressions("of all time", &ctx());
        assert!(scan.all_time);
        assert!(scan.constraints.is_empty());
    }

    #[test]
    fn test_month_name_requires_preposition() {
        assert_eq!(
            constraints("in july"),
            vec![TimeConstraint::MonthSet([7].into_iter().collect())]
        );
        // Bare "may" is the verb, not the month
        assert!(constraints("songs i may like").is_empty());
    }

    #[test]
    fn test_not_a_time_expression_yields_nothing() {
        assert!(constraints("my favorite songs").is_empty());
    }

    #[test]
    fn test_timezone_offset_shifts_year_start() {
        let ctx = UserContext::new(-300, TimeUnit::Hours)
            .with_now(Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap());
        let scan = scan_time_expressions("this year", &ctx);
        match &scan.constraints[0] {
            TimeConstraint::AbsoluteRange { start, .. } => {
                // Local midnight Jan 1 at UTC-5 is 05:00 UTC
                assert_eq!(*start, Utc.with_ymd_and_hms(2023, 1, 1, 5, 0, 0).unwrap());
            }
            other => panic!("expected absolute range, got {other:?}"),
        }
    }
}
