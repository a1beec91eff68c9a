//! Natural-language query pipeline: Parser, Analyzer, Executor, Formatter.
//!
//! `answer_query` is the one free-text entry point and never panics on user
//! input: every failure comes back as a clarification message in the
//! response text. `answer_structured` skips parsing for callers that build
//! a resolved spec themselves.

pub mod analyzer;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod parser;
pub mod spec;
pub mod suggestions;
pub mod time;

pub use error::{ExecutionError, QueryError, ResolutionError, ValidationError, Warning};
pub use spec::{
    EntityFragment, Intent, QuerySpec, ResolvedEntity, ResolvedQuerySpec, ResultRow, ResultSet,
    SortKey, TimeConstraint, TimeFilter, TimeUnit, UserContext,
};
pub use suggestions::{SuggestedQuery, SUGGESTED_QUERIES};

use crate::config::PipelineConfig;
use crate::history_store::HistoryStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

/// Final pipeline output: narrative text plus the structured rows behind it.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub text: String,
    pub rows: Vec<ResultRow>,
    pub warnings: Vec<Warning>,
    pub confidence: f64,
}

/// Answer a free-text question about a user's listening history.
///
/// An explicit range from the caller (a UI date picker, say) is applied on
/// top of whatever time expressions the question itself contains.
pub fn answer_query(
    store: &dyn HistoryStore,
    user_id: i64,
    question: &str,
    ctx: &UserContext,
    explicit_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    config: &PipelineConfig,
) -> QueryResponse {
    info!("Answering query for user {}: {}", user_id, question);

    let mut spec = parser::parse(question, ctx, config);
    if let Some((start, end)) = explicit_range {
        spec.time_filters
            .push(TimeConstraint::AbsoluteRange { start, end });
    }

    let mut warnings = Vec::new();
    if spec.confidence < config.low_confidence_threshold {
        warnings.push(Warning::LowConfidence);
    }

    let resolved = match analyzer::analyze(&spec, store, config) {
        Ok(resolved) => resolved,
        Err(err) => {
            return QueryResponse {
                text: formatter::format_error(&err),
                rows: vec![],
                warnings,
                confidence: spec.confidence,
            };
        }
    };

    let result = match executor::execute(store, user_id, &resolved, ctx, config) {
        Ok(result) => result,
        Err(err) => {
            // Log the shape of the failed query, not the user's text
            error!(
                "Query execution failed ({:?} at {:?} level): {}",
                resolved.intent, resolved.level, err
            );
            return QueryResponse {
                text: formatter::format_error(&err.into()),
                rows: vec![],
                warnings,
                confidence: spec.confidence,
            };
        }
    };

    if result.rows.is_empty() {
        warnings.push(Warning::EmptyResult);
    }

    let text = formatter::format_response(&resolved, &result, ctx, config, &warnings);
    QueryResponse {
        text,
        rows: result.rows,
        warnings,
        confidence: spec.confidence,
    }
}

/// Run an already-resolved query, bypassing the parser and analyzer.
pub fn answer_structured(
    store: &dyn HistoryStore,
    user_id: i64,
    spec: &ResolvedQuerySpec,
    ctx: &UserContext,
    config: &PipelineConfig,
) -> Result<ResultSet, ExecutionError> {
    executor::execute(store, user_id, spec, ctx, config)
}
