//! Storage error types and their conversion into the core taxonomy.

use ledgerly_core::errors::{DatabaseError, Error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database query failed: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Writer unavailable: {0}")]
    WriterUnavailable(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Diesel(e) => Error::Database(DatabaseError::QueryFailed(e.to_string())),
            StorageError::Pool(e) => Error::Database(DatabaseError::Pool(e.to_string())),
            StorageError::WriterUnavailable(msg) => {
                Error::Database(DatabaseError::Internal(msg))
            }
            StorageError::Migration(msg) => Error::Database(DatabaseError::Migration(msg)),
        }
    }
}
