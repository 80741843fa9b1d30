//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Table creation or upgrade failed. Fatal at startup.
    #[error("schema error: {0}")]
    Schema(String),

    /// Insert, update or delete failed at the storage layer.
    #[error("write failed: {0}")]
    Write(#[source] rusqlite::Error),

    /// Read-side database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A row could not be decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Lock(String),

    /// The blocking task running a SQLite operation failed to complete.
    #[error("storage task failed: {0}")]
    Task(String),

    /// I/O error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for failures of a mutating operation.
    pub fn is_write(&self) -> bool {
        matches!(self, StoreError::Write(_))
    }

    /// True for schema creation/upgrade failures.
    pub fn is_schema(&self) -> bool {
        matches!(self, StoreError::Schema(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
