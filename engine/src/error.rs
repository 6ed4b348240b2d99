//! Error types for wax-engine.

use thiserror::Error;

/// Result type alias using the engine's error.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The run cannot start at all (no owner, remote account not linked).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Missing or invalid environment configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Non-sqlx storage failure (used by alternative store implementations).
    #[error("storage error: {0}")]
    Storage(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status} for {url}")]
    Provider { status: u16, url: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
