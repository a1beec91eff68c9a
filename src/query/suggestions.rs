//! Canned example questions surfaced to clients as starting points.
//! Every entry is guaranteed to parse with full confidence.

use super::parser;
use super::spec::{QuerySpec, UserContext};
use crate::config::PipelineConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SuggestedQuery {
    pub text: &'static str,
    pub category: &'static str,
}

impl SuggestedQuery {
    /// The spec this suggestion runs as, for callers that want to execute
    /// it without going back through free text.
    pub fn to_spec(&self, ctx: &UserContext, config: &PipelineConfig) -> QuerySpec {
        parser::parse(self.text, ctx, config)
    }
}

pub const SUGGESTED_QUERIES: &[SuggestedQuery] = &[
    SuggestedQuery {
        text: "What are my top 10 tracks this year?",
        category: "ranking",
    },
    SuggestedQuery {
        text: "Which artists do I listen to most on Sundays?",
        category: "ranking",
    },
    SuggestedQuery {
        text: "Top albums in the summer of 2022",
        category: "ranking",
    },
    SuggestedQuery {
        text: "What do I play after 10PM?",
        category: "ranking",
    },
    SuggestedQuery {
        text: "How much music did I listen to this month?",
        category: "stats",
    },
    SuggestedQuery {
        text: "Compare Radiohead and Muse",
        category: "compare",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::spec::TimeUnit;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_every_suggestion_parses_confidently() {
        let ctx = UserContext::new(0, TimeUnit::Hours)
            .with_now(Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap());
        let config = PipelineConfig::default();
        for suggestion in SUGGESTED_QUERIES {
            let spec = suggestion.to_spec(&ctx, &config);
            assert!(
                spec.confidence >= config.low_confidence_threshold,
                "suggestion parsed poorly: {} ({:.2})",
                suggestion.text,
                spec.confidence
            );
        }
    }
}
