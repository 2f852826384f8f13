//! Error types for the store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading or writing persisted scan results.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A value could not be encoded or decoded.
    #[error("Invalid stored value: {0}")]
    Serde(#[from] serde_json::Error),

    /// File system failure around the database or timestamp files.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Table names are restricted to ASCII letters, digits and underscores.
    #[error("Invalid table name: {name:?}")]
    InvalidTable { name: String },

    /// A timestamp file did not hold a unix time.
    #[error("Invalid timestamp in {path}")]
    InvalidTimestamp { path: PathBuf },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
