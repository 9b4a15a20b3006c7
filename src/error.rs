//! AgriVoice Error Types
//!
//! Centralized error handling for the storage, sync and voice services.

use std::fmt;
use thiserror::Error;

/// Platform capability negotiated once at service construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Synthesis,
    Recognition,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Synthesis => write!(f, "speech synthesis"),
            Capability::Recognition => write!(f, "speech recognition"),
        }
    }
}

/// Central error type for AgriVoice
#[derive(Error, Debug)]
pub enum AgriError {
    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("{0} not supported on this platform")]
    UnsupportedCapability(Capability),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Speech recognition error: {0}")]
    Recognition(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0} session already active")]
    Busy(Capability),

    #[error("Sync drain failure: {0}")]
    SyncDrain(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for AgriVoice operations
pub type AgriResult<T> = Result<T, AgriError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for AgriError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        AgriError::Lock(err.to_string())
    }
}
