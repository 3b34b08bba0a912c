//! Checkpoint DB error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker thread unavailable: {0}")]
    WorkerGone(String),

    #[error("another process holds the lock at {0}")]
    LockHeld(String),
}
