//! Error types for the store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error while preparing the database location.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A license with this key is already provisioned.
    #[error("license already exists: {0}")]
    AlreadyExists(String),

    /// The trial length puts its end outside the representable range.
    #[error("invalid trial length: {0} days")]
    InvalidTrialLength(u32),

    /// A previous holder of the connection panicked.
    #[error("store lock poisoned")]
    LockPoisoned,
}
