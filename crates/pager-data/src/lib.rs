//! Data sources and state stores for the pagination engine

pub mod sources;
pub mod store;

use tokio::task::JoinError;
use thiserror::Error;

// Re-exports
pub use sources::{CsvSource, LocalSource, SqliteSource};
pub use store::FileStore;

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("SQLite error: {0}")]
    Sqlite(String),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("Unknown column: {0}")]
    InvalidColumn(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}

impl From<rusqlite::Error> for DataError {
    fn from(error: rusqlite::Error) -> Self {
        DataError::Sqlite(error.to_string())
    }
}

impl From<DataError> for pager_core::PagerError {
    fn from(error: DataError) -> Self {
        match error {
            DataError::Serialization(e) => pager_core::PagerError::Serialization(e.to_string()),
            other => pager_core::PagerError::Storage(other.to_string()),
        }
    }
}
