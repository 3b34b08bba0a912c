use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("parent filing {0} does not exist — refusing insert")]
    MissingParentFiling(uuid::Uuid),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Map a PostgreSQL unique violation (`23505`) to `None` rather than an
/// error — per §4.10/§7, a duplicate-key error on an idempotent insert is
/// treated as success, not failure.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}
