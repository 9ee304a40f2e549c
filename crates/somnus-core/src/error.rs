//! Core error types for somnus-core.
//!
//! Nothing in the alarm domain is fatal to the process: persistence and
//! scheduling failures degrade to "the alarm may not fire". The variants
//! here exist so callers can log or display them, not to abort.

use std::path::PathBuf;
use thiserror::Error;

use crate::alarm::AlarmId;

/// Core error type for somnus-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persisted alarm collection could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Notification sink refused a registration
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SinkError),

    /// Malformed user input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Alarm {0} not found")]
    AlarmNotFound(AlarmId),

    #[error("Alarm {0} is not firing")]
    NotFiring(AlarmId),

    /// Dismissal attempted before the quiz was solved
    #[error("Alarm {0} cannot be dismissed until its challenge is solved")]
    ChallengeIncomplete(AlarmId),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from an [`AlarmPersistence`](crate::store::AlarmPersistence) backend.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("storage backend failed: {0}")]
    Database(#[from] DatabaseError),

    /// Stored blob is not a valid alarm collection
    #[error("stored alarms are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors from a [`NotificationSink`](crate::sink::NotificationSink).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("notification sink rejected '{key}': {reason}")]
    Rejected { key: String, reason: String },

    #[error("notification sink is closed")]
    Closed,
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    #[error("Database location unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Data directory could not be determined or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors raised at the UI boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid time '{input}': expected HH:MM")]
    InvalidTime { input: String },

    #[error("Invalid day '{input}': expected sun..sat or 0..6")]
    InvalidDay { input: String },

    #[error("Weekday index {0} out of range 0..=6")]
    DayOutOfRange(u8),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
