use thiserror::Error;

/// Errors raised by shared domain logic (corp_id derivation, category parsing).
/// Per-crate errors (`QueueError`, `CheckpointError`, ...) wrap this at their
/// boundary rather than re-deriving the same variants.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unrecognized category: {0}")]
    UnknownCategory(String),

    #[error("invalid exchange identifier: {0}")]
    UnknownExchange(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
