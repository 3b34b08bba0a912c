use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayerError {
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] pipeline_checkpoint::CheckpointError),

    #[error("store error: {0}")]
    Store(#[from] pipeline_store::StoreError),

    #[error("classifier error: {0}")]
    Classifier(#[from] pipeline_llm::ClassifierError),

    #[error("core error: {0}")]
    Core(#[from] pipeline_core::CoreError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF extraction failed: {0}")]
    PdfExtract(String),
}
