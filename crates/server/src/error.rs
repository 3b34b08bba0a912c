use thiserror::Error;

/// Startup-boundary error type — HTTP handlers report failures inline as
/// `(StatusCode, Json<_>)` tuples per the teacher's `api::require_ready`
/// convention instead of funneling through here.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("queue error: {0}")]
    Queue(#[from] pipeline_queue::QueueError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
