use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] pipeline_checkpoint::CheckpointError),

    #[error("queue error: {0}")]
    Queue(#[from] pipeline_queue::QueueError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cursor file parse error: {0}")]
    Cursor(#[from] serde_json::Error),

    #[error("another scraper instance holds the lock at {0}")]
    LockHeld(String),

    #[error("NSE session warm-up failed: {0}")]
    SessionWarmup(String),

    #[error("exchange feed returned an unparseable response: {0}")]
    BadResponse(String),
}
