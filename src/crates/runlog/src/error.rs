//! Error types for run store operations
//!
//! One taxonomy shared by the writer, the read-only handles and the query
//! layer built on top of them. `kind()` is the stable identifier that ends
//! up on the wire.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for run store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Main error type for run store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file or its directory cannot be created, opened or locked
    #[error("Storage unavailable at {path}: {reason}")]
    StorageUnavailable { path: PathBuf, reason: String },

    /// A logged value cannot be coerced to its required type
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Write attempted after finalize
    #[error("Store is closed")]
    StoreClosed,

    /// No backing file for the requested run
    #[error("Run not found: {project}/{run}")]
    RunNotFound { project: String, run: String },

    /// A run file exists but cannot be read as a run store
    #[error("Malformed run file {path}: {reason}")]
    MalformedRun { path: PathBuf, reason: String },

    /// SQLite stayed busy or locked past the busy timeout
    #[error("Storage busy: {0}")]
    StorageBusy(String),

    /// Query execution error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Migration error
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a StorageUnavailable error for a path
    pub fn unavailable(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        StoreError::StorageUnavailable {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Create an InvalidValue error
    pub fn invalid(msg: impl Into<String>) -> Self {
        StoreError::InvalidValue(msg.into())
    }

    /// Create a RunNotFound error
    pub fn run_not_found(project: impl Into<String>, run: impl Into<String>) -> Self {
        StoreError::RunNotFound {
            project: project.into(),
            run: run.into(),
        }
    }

    /// Create a MalformedRun error
    pub fn malformed(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        StoreError::MalformedRun {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Stable error kind identifier
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::StorageUnavailable { .. } => "StorageUnavailable",
            StoreError::InvalidValue(_) => "InvalidValue",
            StoreError::StoreClosed => "StoreClosed",
            StoreError::RunNotFound { .. } => "RunNotFound",
            StoreError::MalformedRun { .. } => "MalformedRun",
            StoreError::StorageBusy(_) => "StorageBusy",
            StoreError::Database(_) => "DatabaseError",
            StoreError::Migration(_) => "MigrationError",
            StoreError::Io(_) => "IoError",
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::RunNotFound { .. })
    }

    /// Check if this error is transient and the call may be retried
    pub fn is_busy(&self) -> bool {
        matches!(self, StoreError::StorageBusy(_))
    }
}

/// SQLite primary result codes for SQLITE_BUSY and SQLITE_LOCKED.
/// Extended codes keep the primary code in the low byte.
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

fn is_busy_code(code: &str) -> bool {
    code.parse::<i64>()
        .map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

/// Convert sqlx::Error to StoreError
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let busy = db_err.code().map(|c| is_busy_code(&c)).unwrap_or(false);
                if busy {
                    StoreError::StorageBusy(db_err.message().to_string())
                } else {
                    StoreError::Database(sqlx::Error::Database(db_err))
                }
            }
            sqlx::Error::PoolTimedOut => {
                StoreError::StorageBusy("Connection pool timed out".to_string())
            }
            sqlx::Error::PoolClosed => StoreError::StoreClosed,
            sqlx::Error::Migrate(err) => StoreError::Migration(*err),
            err => StoreError::Database(err),
        }
    }
}
