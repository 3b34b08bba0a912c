use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("queue error: {0}")]
    Queue(#[from] pipeline_queue::QueueError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
