//! Error types for ShardKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for ShardKV operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    /// Key (or prefix) absent. An ordinary outcome, not a fault.
    #[error("Not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Durability Errors
    // -------------------------------------------------------------------------
    /// The WAL append or fsync failed. The write is not visible.
    #[error("Durability failure: {0}")]
    Durability(String),

    /// Snapshot or WAL could not be decoded during recovery.
    #[error("Corrupt state in {path}:{line}: {reason}")]
    CorruptState {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error status reported by a remote server
    #[error("Server error: {0}")]
    Remote(String),

    /// The server has not finished recovering
    #[error("Service unavailable: recovery in progress")]
    Unavailable,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl KvError {
    /// Build a `CorruptState` error for a file location
    pub fn corrupt(path: impl Into<PathBuf>, line: u64, reason: impl Into<String>) -> Self {
        KvError::CorruptState {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Whether this error is the benign "absent" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::NotFound(_))
    }
}
