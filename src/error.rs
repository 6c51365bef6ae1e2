//! Error types for DB.Coach
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for DB.Coach operations
///
/// Covers configuration loading, conversation storage (local and hosted),
/// record validation, text generation and session lifecycle failures.
#[derive(Error, Debug)]
pub enum DbCoachError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Conversation storage errors (local store or hosted table)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The requested conversation does not exist in the backend
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// A shortened id matches more than one conversation
    #[error("Ambiguous conversation id: {0}")]
    AmbiguousId(String),

    /// A record violates the conversation invariants
    #[error("Invalid conversation record: {0}")]
    InvalidRecord(String),

    /// Text generation API errors, surfaced verbatim
    #[error("Generation error: {0}")]
    Generation(String),

    /// Illegal session or task state transition
    #[error("Session error: {0}")]
    Session(String),

    /// The session was cancelled before it completed
    #[error("Session cancelled")]
    Cancelled,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DbCoachError {
    /// Returns true when the error (possibly wrapped in `anyhow`) is a
    /// [`DbCoachError::NotFound`].
    ///
    /// # Examples
    ///
    /// ```
    /// use dbcoach::error::DbCoachError;
    ///
    /// let err: anyhow::Error = DbCoachError::NotFound("abc".to_string()).into();
    /// assert!(DbCoachError::is_not_found(&err));
    /// ```
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<DbCoachError>(),
            Some(DbCoachError::NotFound(_))
        )
    }
}

/// Result type alias for DB.Coach operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
