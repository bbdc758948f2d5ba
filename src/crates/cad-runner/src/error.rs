//! Error type for the CAD runner's own plumbing (not script failures — those
//! are carried in-band on `ExecutionResult`, same discipline as `sandbox`).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RunnerError>;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to prepare scratch directory: {0}")]
    ScratchDir(String),

    #[error("failed to read script file: {0}")]
    ReadScript(String),

    #[error("export conversion failed: {0}")]
    Export(String),
}
