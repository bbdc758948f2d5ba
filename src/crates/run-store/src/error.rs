//! Errors raised by a `RunStateStore` implementation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run state store error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("run {0} not found")]
    NotFound(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, StoreError>;
