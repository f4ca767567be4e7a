use thiserror::Error;

use memgrid_engine::error::{GridError, StoreError};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("bad pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("table {index} does not exist ({count} tables)")]
    NoSuchTable { index: usize, count: usize },
}

impl From<IoError> for StoreError {
    fn from(e: IoError) -> Self {
        match e {
            IoError::Io(e) => StoreError::Io(e),
            IoError::Json(e) => StoreError::Encode(e),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
