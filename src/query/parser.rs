//! Parser: free text to an unresolved `QuerySpec`.
//!
//! Never fails. Intent comes from a fixed keyword table checked
//! case-insensitively; entity nouns disambiguate; a number adjacent to the
//! intent phrase overrides the default limit. Every substring recognized as
//! a time expression is excluded from entity-name extraction. Whatever the
//! grammar could not account for lowers `confidence`.

use super::spec::{EntityFragment, Intent, QuerySpec, SortKey, UserContext};
use super::time::scan_time_expressions;
use crate::config::PipelineConfig;
use crate::history_store::EntityLevel;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref COMPARE_RE: Regex =
        Regex::new(r"\b(compare|versus|vs\.?|difference between)\b").unwrap();
    static ref STATS_RE: Regex = Regex::new(
        r"\b(how many times|how many|how much|how long|total plays|total time|statistics|stats|listening time)\b"
    )
    .unwrap();
    // Longer alternatives first so "most played" wins over "most"
    static ref RANKING_RE: Regex = Regex::new(
        r"\b(most played|most listened to|most listened|top|favourite|favorite|best|most)\b"
    )
    .unwrap();
    static ref NOUN_RE: Regex = Regex::new(r"\b(song|track|album|artist)(s)?\b").unwrap();
    static ref DURATION_SORT_RE: Regex =
        Regex::new(r"\b(longest|most time|by time|most hours|most minutes)\b").unwrap();
    static ref LIMIT_AFTER_KEYWORD_RE: Regex = Regex::new(
        r"\b(?:top|best|favourite|favorite|most played|most listened)\s+(\d{1,3})\b"
    )
    .unwrap();
    static ref LIMIT_BEFORE_NOUN_RE: Regex =
        Regex::new(r"\b(\d{1,3})\s+(?:songs|tracks|albums|artists)\b").unwrap();
    static ref LIMIT_WORD_RE: Regex = Regex::new(
        r"\b(?:top|best|favourite|favorite)\s+(one|two|three|four|five|six|seven|eight|nine|ten|twenty|thirty|forty|fifty)\b"
    )
    .unwrap();
    static ref QUOTED_RE: Regex = Regex::new(r#""([^"]{1,80})""#).unwrap();
    static ref BY_FRAGMENT_RE: Regex = Regex::new(r"\b(?:by|from)\s+(.{2,80})$").unwrap();
    static ref COMPARE_SPLIT_RE: Regex = Regex::new(
        r"\b(?:compare|difference between)\s+(.+?)\s+(?:and|vs\.?|versus|with|to)\s+(.+)$"
    )
    .unwrap();
    static ref VS_SPLIT_RE: Regex = Regex::new(r"^(.+?)\s+(?:vs\.?|versus)\s+(.+)$").unwrap();
    static ref WORD_RE: Regex = Regex::new(r"[a-z0-9']+").unwrap();
}

/// Filler words that count as understood grammar when scoring coverage.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "my", "i", "me", "do", "did", "does", "what", "which", "who", "when", "how",
    "was", "were", "are", "is", "have", "has", "had", "to", "of", "on", "in", "at", "for", "and",
    "or", "this", "that", "with", "from", "listen", "listens", "listened", "listening", "play",
    "played", "plays", "playing", "hear", "heard", "music", "please", "out", "mostly",
];

/// Noise tokens stripped from the edges of an extracted entity name.
const FRAGMENT_TRIM: &[&str] = &[
    "my", "songs", "song", "tracks", "track", "albums", "album", "artists", "artist", "music",
    "listened", "listening", "played", "plays", "to", "do", "i", "most", "of", "on", "in",
];

fn word_number(word: &str) -> Option<u32> {
    match word {
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        "twenty" => Some(20),
        "thirty" => Some(30),
        "forty" => Some(40),
        "fifty" => Some(50),
        _ => None,
    }
}

fn noun_level(noun: &str) -> EntityLevel {
    match noun {
        "song" | "track" => EntityLevel::Track,
        "album" => EntityLevel::Album,
        "artist" => EntityLevel::Artist,
        _ => unreachable!("noun regex only matches known nouns"),
    }
}

/// Blank out the given byte spans so later extraction cannot re-read them.
fn mask_spans(text: &str, spans: &[(usize, usize)]) -> String {
    let mut bytes = text.as_bytes().to_vec();
    let len = bytes.len();
    for &(start, end) in spans {
        for b in bytes.iter_mut().take(end.min(len)).skip(start) {
            if !b.is_ascii_whitespace() {
                *b = b' ';
            }
        }
    }
    // Spans sit on character boundaries of ASCII-lowered text, but be safe
    String::from_utf8(bytes).unwrap_or_else(|_| text.to_string())
}

/// Strip noise tokens and punctuation from the edges of a captured name.
fn trim_fragment(raw: &str) -> String {
    let mut tokens: Vec<&str> = raw
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| ",.?!;:".contains(c)))
        .filter(|t| !t.is_empty())
        .collect();
    while tokens
        .first()
        .is_some_and(|t| FRAGMENT_TRIM.contains(t))
    {
        tokens.remove(0);
    }
    while tokens
        .last()
        .is_some_and(|t| FRAGMENT_TRIM.contains(t))
    {
        tokens.pop();
    }
    tokens.join(" ")
}

/// Parse a natural-language question. Always returns a well-formed spec;
/// unrecognizable input falls back to top tracks with confidence near zero.
pub fn parse(raw_text: &str, ctx: &UserContext, config: &PipelineConfig) -> QuerySpec {
    let text = raw_text.to_lowercase();
    debug!("Parsing query: {}", text);

    let time_scan = scan_time_expressions(&text, ctx);
    let mut consumed: Vec<(usize, usize)> = time_scan.spans.clone();

    // Intent from the keyword table, most specific class first
    let mut intent_recognized = true;
    let noun_match = NOUN_RE.captures(&text);
    let noun_singular = noun_match
        .as_ref()
        .is_some_and(|c| c.get(2).is_none());
    let level_from_noun = noun_match.as_ref().map(|c| noun_level(&c[1]));
    if let Some(c) = &noun_match {
        let m = c.get(0).expect("group 0 always present");
        consumed.push((m.start(), m.end()));
    }

    // The intent span joins the mask only after fragment extraction: the
    // compare split is anchored on the keyword itself
    let mut intent_span: Option<(usize, usize)> = None;
    let intent = if let Some(m) = COMPARE_RE.find(&text) {
        intent_span = Some((m.start(), m.end()));
        Intent::Compare
    } else if let Some(m) = STATS_RE.find(&text) {
        intent_span = Some((m.start(), m.end()));
        Intent::ListeningStats
    } else if let Some(m) = RANKING_RE.find(&text) {
        intent_span = Some((m.start(), m.end()));
        match level_from_noun {
            Some(EntityLevel::Artist) => Intent::TopArtists,
            Some(EntityLevel::Album) => Intent::TopAlbums,
            _ => Intent::TopTracks,
        }
    } else if let Some(level) = level_from_noun {
        // "which songs do I listen to on sundays" carries no ranking word
        match level {
            EntityLevel::Artist => Intent::TopArtists,
            EntityLevel::Album => Intent::TopAlbums,
            EntityLevel::Track => Intent::TopTracks,
        }
    } else {
        intent_recognized = false;
        Intent::TopTracks
    };

    let level = match intent {
        Intent::Compare => level_from_noun.unwrap_or(EntityLevel::Artist),
        other => other.default_level(),
    };

    // Sort key: play count unless the question asks about time spent
    let sort = if let Some(m) = DURATION_SORT_RE.find(&text) {
        consumed.push((m.start(), m.end()));
        SortKey::TotalDuration
    } else {
        SortKey::PlayCount
    };

    // Limit: an integer adjacent to the intent phrase wins, then a number
    // word, then the singular-noun reading ("my favorite song" means one)
    let mut limit = config.default_limit;
    let mut limit_found = false;
    for re in [&*LIMIT_AFTER_KEYWORD_RE, &*LIMIT_BEFORE_NOUN_RE] {
        if let Some(caps) = re.captures(&text) {
            if let Ok(n) = caps[1].parse::<u32>() {
                let m = caps.get(0).expect("group 0 always present");
                consumed.push((m.start(), m.end()));
                limit = n;
                limit_found = true;
                break;
            }
        }
    }
    if !limit_found {
        if let Some(caps) = LIMIT_WORD_RE.captures(&text) {
            if let Some(n) = word_number(&caps[1]) {
                let m = caps.get(0).expect("group 0 always present");
                consumed.push((m.start(), m.end()));
                limit = n;
                limit_found = true;
            }
        }
    }
    if !limit_found
        && noun_singular
        && !matches!(intent, Intent::ListeningStats | Intent::Compare)
    {
        limit = 1;
    }

    // Entity names come from whatever the time grammar did not claim
    let masked = mask_spans(&text, &consumed);
    let mut fragments: Vec<EntityFragment> = Vec::new();

    if intent == Intent::Compare {
        let split = COMPARE_SPLIT_RE
            .captures(&masked)
            .or_else(|| VS_SPLIT_RE.captures(&masked));
        if let Some(caps) = split {
            for group in [1, 2] {
                if let Some(m) = caps.get(group) {
                    let name = trim_fragment(m.as_str());
                    if !name.is_empty() {
                        consumed.push((m.start(), m.end()));
                        fragments.push(EntityFragment {
                            text: name,
                            level_hint: None,
                        });
                    }
                }
            }
        }
    } else {
        for caps in QUOTED_RE.captures_iter(&masked) {
            let m = caps.get(1).expect("group 1 always present in a match");
            let name = trim_fragment(m.as_str());
            if !name.is_empty() {
                consumed.push((m.start().saturating_sub(1), m.end() + 1));
                fragments.push(EntityFragment {
                    text: name,
                    level_hint: None,
                });
            }
        }
        if fragments.is_empty() {
            if let Some(caps) = BY_FRAGMENT_RE.captures(&masked) {
                let m = caps.get(1).expect("group 1 always present in a match");
                let name = trim_fragment(m.as_str());
                if !name.is_empty() {
                    let whole = caps.get(0).expect("group 0 always present");
                    consumed.push((whole.start(), whole.end()));
                    fragments.push(EntityFragment {
                        text: name,
                        level_hint: Some(EntityLevel::Artist),
                    });
                }
            }
        }
    }

    if let Some(span) = intent_span {
        consumed.push(span);
    }

    // Confidence: the share of words accounted for by grammar or filler,
    // with a penalty for each hour value that had to be guessed
    let mut covered = 0usize;
    let mut total = 0usize;
    for m in WORD_RE.find_iter(&text) {
        total += 1;
        let inside_span = consumed
            .iter()
            .any(|&(s, e)| m.start() < e && m.end() > s);
        if inside_span || STOPWORDS.contains(&m.as_str()) {
            covered += 1;
        }
    }
    let mut confidence = if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    };
    confidence -= 0.15 * time_scan.ambiguous_hours as f64;
    if !intent_recognized {
        confidence *= 0.5;
    }
    confidence = confidence.clamp(0.0, 1.0);

    QuerySpec {
        intent,
        level,
        limit,
        time_filters: time_scan.constraints,
        entity_name_fragments: fragments,
        sort,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::spec::{TimeConstraint, TimeUnit};
    use chrono::{TimeZone, Utc};

    fn parse_text(text: &str) -> QuerySpec {
        let ctx = UserContext::new(0, TimeUnit::Hours)
            .with_now(Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap());
        parse(text, &ctx, &PipelineConfig::default())
    }

    #[test]
    fn test_top_n_tracks_this_year() {
        let spec = parse_text("top 5 tracks this year");
        assert_eq!(spec.intent, Intent::TopTracks);
        assert_eq!(spec.limit, 5);
        assert_eq!(spec.time_filters.len(), 1);
        assert!(matches!(
            spec.time_filters[0],
            TimeConstraint::AbsoluteRange { .. }
        ));
        assert!(spec.confidence > 0.9);
    }

    #[test]
    fn test_which_artists_on_sundays() {
        let spec = parse_text("which artists do I listen to most on Sundays");
        assert_eq!(spec.intent, Intent::TopArtists);
        assert_eq!(spec.limit, 10);
        assert_eq!(
            spec.time_filters,
            vec![TimeConstraint::WeekdaySet([0].into_iter().collect())]
        );
    }

    #[test]
    fn test_compound_time_expressions() {
        let spec = parse_text("top tracks on Fridays in the Summer of 2022 after 6PM");
        assert_eq!(spec.intent, Intent::TopTracks);
        assert_eq!(spec.time_filters.len(), 4);
        assert!(spec.confidence > 0.9);
    }

    #[test]
    fn test_gibberish_falls_back_with_low_confidence() {
        let spec = parse_text("asdkjf qweoiru");
        assert_eq!(spec.intent, Intent::TopTracks);
        assert_eq!(spec.limit, 10);
        assert!(spec.time_filters.is_empty());
        assert!(spec.confidence < 0.1);
    }

    #[test]
    fn test_compare_extracts_both_names() {
        let spec = parse_text("compare radiohead and muse");
        assert_eq!(spec.intent, Intent::Compare);
        let names: Vec<&str> = spec
            .entity_name_fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect();
        assert_eq!(names, vec!["radiohead", "muse"]);
    }

    #[test]
    fn test_compare_ignores_time_phrases_in_names() {
        let spec = parse_text("compare radiohead and muse on fridays");
        let names: Vec<&str> = spec
            .entity_name_fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect();
        assert_eq!(names, vec!["radiohead", "muse"]);
        assert_eq!(spec.time_filters.len(), 1);
    }

    #[test]
    fn test_by_artist_fragment_gets_artist_hint() {
        let spec = parse_text("top tracks by radiohead");
        assert_eq!(spec.entity_name_fragments.len(), 1);
        assert_eq!(spec.entity_name_fragments[0].text, "radiohead");
        assert_eq!(
            spec.entity_name_fragments[0].level_hint,
            Some(EntityLevel::Artist)
        );
    }

    #[test]
    fn test_fragment_extraction_with_trailing_time_span() {
        // The masked span ends exactly at the end of the text
        let spec = parse_text("top tracks by muse on sundays");
        assert_eq!(spec.entity_name_fragments.len(), 1);
        assert_eq!(spec.entity_name_fragments[0].text, "muse");
        assert_eq!(spec.time_filters.len(), 1);
    }

    #[test]
    fn test_number_word_limit() {
        let spec = parse_text("top five albums");
        assert_eq!(spec.intent, Intent::TopAlbums);
        assert_eq!(spec.limit, 5);
    }

    #[test]
    fn test_singular_noun_implies_one() {
        let spec = parse_text("my favorite song");
        assert_eq!(spec.intent, Intent::TopTracks);
        assert_eq!(spec.limit, 1);
    }

    #[test]
    fn test_plural_noun_keeps_default_limit() {
        let spec = parse_text("my favorite songs");
        assert_eq!(spec.limit, 10);
    }

    #[test]
    fn test_stats_intent() {
        let spec = parse_text("how much music did I listen to this year");
        assert_eq!(spec.intent, Intent::ListeningStats);
    }

    #[test]
    fn test_duration_sort() {
        let spec = parse_text("which artists did I spend the most time on");
        assert_eq!(spec.sort, SortKey::TotalDuration);
    }

    #[test]
    fn test_zero_limit_is_preserved_for_validation() {
        let spec = parse_text("top 0 tracks");
        assert_eq!(spec.limit, 0);
    }

    #[test]
    fn test_ambiguous_hour_penalizes_confidence() {
        let with_marker = parse_text("top tracks after 6pm");
        let without_marker = parse_text("top tracks after 6");
        assert!(without_marker.confidence < with_marker.confidence);
    }
}
