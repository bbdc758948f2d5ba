//! Error type for the sandbox crate itself.
//!
//! Per spec §4.2 the sandbox never raises on behalf of the *script* it
//! runs — those failures are reported in-band as `ExecutionResult::failure`.
//! This error type is only for failures of the sandbox's own plumbing
//! (unable to spawn the CAD engine at all, working directory unusable).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SandboxError>;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to prepare working directory: {0}")]
    WorkingDir(String),

    #[error("failed to spawn CAD engine process: {0}")]
    Spawn(#[from] std::io::Error),
}
