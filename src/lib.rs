//! MusicMuse Query Library
//!
//! Answers natural-language questions about a user's listening history.
//! The pipeline runs Parser, Analyzer, Executor and Formatter in sequence
//! over a SQLite-backed catalog/history store.

pub mod config;
pub mod history_store;
pub mod matching;
pub mod query;

// Re-export commonly used types for convenience
pub use config::{FileConfig, PipelineConfig};
pub use history_store::{EntityLevel, HistoryStore, SqliteHistoryStore};
pub use query::{
    answer_query, answer_structured, QueryResponse, TimeUnit, UserContext, SUGGESTED_QUERIES,
};
