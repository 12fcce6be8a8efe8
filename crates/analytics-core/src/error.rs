//! Error types for the analytics core

use thiserror::Error;

/// Errors produced by the event store, recorder, and engine.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Caller supplied an out-of-range or malformed parameter.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// An event referenced a call the store has never seen. Indicates an
    /// upstream ordering bug; the offending write is rejected without
    /// touching the store.
    #[error("unknown call: {0}")]
    UnknownCall(String),

    /// The persistence layer could not be reached or failed mid-query.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
