//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::ledger::JobStatus;

/// Errors from ledger and database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// No job record exists for the fingerprint.
    #[error("No job with fingerprint '{fingerprint}'")]
    NotFound { fingerprint: String },

    /// The requested status change is not a forward edge of the lifecycle.
    #[error("Job '{fingerprint}' cannot move from {from} to {to}")]
    InvalidTransition {
        fingerprint: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// A stored value could not be decoded.
    #[error("Corrupt value in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },

    /// A form snapshot could not be encoded.
    #[error("Failed to encode form snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}
