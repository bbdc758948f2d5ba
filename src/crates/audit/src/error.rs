//! Errors raised by an `AuditSink` implementation.
//!
//! Per spec §4.8, `log_event` itself never fails the caller — these errors
//! are only ever seen by `AuditLog`, which swallows them into a counter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
