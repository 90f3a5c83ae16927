use std::path::PathBuf;

use thiserror::Error;

/// Failures from a session-store backend.
///
/// Store errors are fatal for the current request only; callers surface a
/// generic message and never crash the process.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create data directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored value could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store lock poisoned by a panicked writer")]
    LockPoisoned,
}
