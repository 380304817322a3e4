use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::sessions::SessionError;
use crate::vault::VaultError;

#[derive(Error, Debug)]
pub enum SwarmError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Session store error: {0}")]
    Session(#[from] SessionError),

    #[error("Ledger error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("No portal workers could be initialized; check session setup with `jobswarm session list`")]
    NoWorkers,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Could not determine a data directory (set JOBSWARM_HOME)")]
    NoDataDirectory,
}

/// Failure raised inside a portal adapter or its automation session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Navigation to '{url}' failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Form submission failed: {0}")]
    Submission(String),

    #[error("Automation session error: {0}")]
    Session(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Portal '{portal}' requires login but has no saved session")]
    MissingSession { portal: String },

    #[error("Saved session for portal '{portal}' has expired")]
    SessionExpired { portal: String },

    #[error("Login check failed for portal '{portal}'")]
    LoginFailed { portal: String },

    #[error("Worker for portal '{portal}' has not been started")]
    NotStarted { portal: String },

    #[error("Unknown portal: {0}")]
    UnknownPortal(String),

    #[error("Adapter error on '{portal}': {source}")]
    Adapter {
        portal: String,
        #[source]
        source: AdapterError,
    },

    #[error(transparent)]
    Ledger(#[from] DatabaseError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl WorkerError {
    /// True for errors that mean the operator has to fix setup before the
    /// worker can run (missing or stale session artifacts).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WorkerError::MissingSession { .. } | WorkerError::SessionExpired { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SwarmError>;
