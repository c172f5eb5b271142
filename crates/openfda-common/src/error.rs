//! Error types for openFDA sync
//!
//! One error taxonomy covers the whole connector: configuration problems
//! abort before any network activity, transient fetch failures are retried
//! and only surface here once the retry budget is exhausted, and everything
//! that reaches the caller of a sync run is one of these variants.

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for the sync connector
#[derive(Error, Debug)]
pub enum SyncError {
    /// A required setting is absent or empty at startup
    #[error("Configuration error: {0}. Check your configuration file or environment variables.")]
    Config(String),

    /// All retry attempts for a fetch were exhausted
    #[error("Fetch failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// The API responded but the body could not be used (not retried)
    #[error("Unusable API response: {0}")]
    Response(String),

    /// Sync state could not be loaded or checkpointed
    #[error("Sync state error: {0}")]
    State(String),

    /// The destination rejected an upsert batch
    #[error("Destination error: {0}")]
    Destination(String),

    /// File system operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding failed
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state persistence error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create a destination error
    pub fn destination(msg: impl Into<String>) -> Self {
        Self::Destination(msg.into())
    }

    /// Create a non-retried response error
    pub fn response(msg: impl Into<String>) -> Self {
        Self::Response(msg.into())
    }
}
