//! Error taxonomy shared across the workspace.

use thiserror::Error;

/// Result type alias used throughout the core and storage crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Local storage failures. Always surfaced synchronously to the caller;
/// a failed transaction leaves no partial row or queue state behind.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum Error {
    /// A local transaction could not complete.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Lookup by local or remote id matched nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Sync-engine internal failure that is not attributable to a single
    /// queue entry (e.g. a port returned an unexpected state).
    #[error("Sync error: {0}")]
    Sync(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}
