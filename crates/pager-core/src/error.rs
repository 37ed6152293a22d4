//! Error types for the pagination engine

use thiserror::Error;

/// Errors surfaced by pagination, selection and persistence operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PagerError {
    #[error("failed to fetch page {page}: {message}")]
    Fetch { page: usize, message: String },

    #[error("page size must be greater than zero")]
    InvalidPageSize,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl PagerError {
    /// Build a fetch error from whatever the data source rejected with
    pub fn fetch(page: usize, error: &anyhow::Error) -> Self {
        PagerError::Fetch {
            page,
            message: format!("{:#}", error),
        }
    }
}

impl From<serde_json::Error> for PagerError {
    fn from(error: serde_json::Error) -> Self {
        PagerError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for PagerError {
    fn from(error: std::io::Error) -> Self {
        PagerError::Storage(error.to_string())
    }
}

pub type Result<T, E = PagerError> = std::result::Result<T, E>;
