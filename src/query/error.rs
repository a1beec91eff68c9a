//! Error taxonomy for the query pipeline.
//!
//! Validation and resolution failures are recoverable: the boundary turns
//! them into clarification messages. Execution failures are the only class
//! the caller may treat as transient. Low confidence and empty results are
//! warnings, not errors.

use serde::Serialize;
use thiserror::Error;

/// Contradictory or malformed filters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("the question names two different years, {0} and {1}; pick one")]
    ConflictingYears(i32, i32),

    #[error("the number of results must be at least 1")]
    InvalidLimit,

    #[error("the date range ends before it starts")]
    InvalidRange,

    #[error("the hour range ends before it starts ({start}:00 to {end}:00)")]
    InvalidHourRange { start: u8, end: u8 },
}

/// An entity name that could not be pinned to a single catalog row.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("nothing in your library matches the {level} \"{fragment}\"")]
    Unknown {
        fragment: String,
        level: &'static str,
    },

    #[error("\"{fragment}\" could be either {first} or {second}; which did you mean?")]
    Ambiguous {
        fragment: String,
        first: String,
        second: String,
    },
}

/// Data-store failure or deadline overrun.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("the query exceeded its deadline")]
    Timeout,

    #[error("data store failure: {0}")]
    Store(String),
}

impl From<crate::history_store::StoreError> for ExecutionError {
    fn from(e: crate::history_store::StoreError) -> Self {
        match e {
            crate::history_store::StoreError::Timeout => ExecutionError::Timeout,
            crate::history_store::StoreError::Database(msg) => ExecutionError::Store(msg),
        }
    }
}

/// Any terminal pipeline failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Non-fatal conditions attached to an otherwise well-formed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    /// Little of the question mapped to known grammar; the answer is a
    /// best-effort guess.
    LowConfidence,
    /// The query was well-formed but matched no listening history.
    EmptyResult,
}
