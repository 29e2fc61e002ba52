//! Error types shared by the PocketLedger crates.

use thiserror::Error;

/// Result type alias used across the sync core.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for sync core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Local storage failure (cache or queue transaction).
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Secret store failure
    #[error("Secret store error: {0}")]
    Secret(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Storage-layer failures. Raised by the persistent store and propagated to
/// callers; the sync core has no recovery for them.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create connection pool: {0}")]
    PoolCreationFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a secret store error
    pub fn secret(message: impl Into<String>) -> Self {
        Self::Secret(message.into())
    }
}
