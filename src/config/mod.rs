//! Pipeline tunables.
//!
//! Thresholds and limits that are deliberately configuration, not behavioral
//! contracts: the fuzzy-match threshold, the low-confidence cutoff, the query
//! deadline, and formatting caps. Defaults apply when no config file is
//! given; TOML values override defaults field by field.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Optional TOML file contents. Every field is optional; missing fields fall
/// back to the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub fuzzy_match_threshold: Option<f64>,
    pub low_confidence_threshold: Option<f64>,
    pub query_timeout_ms: Option<u64>,
    pub default_limit: Option<u32>,
    pub narrative_rows: Option<usize>,
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {:?}", path.as_ref()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }
}

/// Resolved pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum similarity for a fuzzy catalog-name match.
    pub fuzzy_match_threshold: f64,
    /// Confidence below which the response carries a clarification warning.
    pub low_confidence_threshold: f64,
    /// Deadline for the aggregation query.
    pub query_timeout_ms: u64,
    /// Result rows when the question names no number.
    pub default_limit: u32,
    /// Rows listed in the narrative text (structured rows carry the full
    /// limited set).
    pub narrative_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fuzzy_match_threshold: 0.7,
            low_confidence_threshold: 0.4,
            query_timeout_ms: 5_000,
            default_limit: 10,
            narrative_rows: 10,
        }
    }
}

impl PipelineConfig {
    /// Resolve configuration from an optional file config. File values
    /// override defaults where present.
    pub fn resolve(file: Option<FileConfig>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            fuzzy_match_threshold: file
                .fuzzy_match_threshold
                .unwrap_or(defaults.fuzzy_match_threshold),
            low_confidence_threshold: file
                .low_confidence_threshold
                .unwrap_or(defaults.low_confidence_threshold),
            query_timeout_ms: file.query_timeout_ms.unwrap_or(defaults.query_timeout_ms),
            default_limit: file.default_limit.unwrap_or(defaults.default_limit),
            narrative_rows: file.narrative_rows.unwrap_or(defaults.narrative_rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = PipelineConfig::resolve(None);
        assert_eq!(config.fuzzy_match_threshold, 0.7);
        assert_eq!(config.default_limit, 10);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            fuzzy_match_threshold = 0.85
            query_timeout_ms = 1000
            "#,
        )
        .unwrap();
        let config = PipelineConfig::resolve(Some(file));
        assert_eq!(config.fuzzy_match_threshold, 0.85);
        assert_eq!(config.query_timeout_ms, 1000);
        // Untouched fields keep their defaults
        assert_eq!(config.default_limit, 10);
    }
}
