//! Storage-layer error type and its mapping into the core error.

use pocketledger_core::errors::{DatabaseError, Error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        let database_error = match err {
            StorageError::Query(diesel::result::Error::NotFound) => {
                DatabaseError::NotFound("Record not found".to_string())
            }
            StorageError::Query(e) => DatabaseError::QueryFailed(e.to_string()),
            StorageError::Pool(e) => DatabaseError::PoolCreationFailed(e.to_string()),
            StorageError::Connection(e) => DatabaseError::ConnectionFailed(e.to_string()),
            StorageError::Io(e) => DatabaseError::Internal(e.to_string()),
        };
        Error::Database(database_error)
    }
}
