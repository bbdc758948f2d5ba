//! Error taxonomy shared across the design pipeline.
//!
//! Mirrors the error categories a `RunState` can terminate with (spec §7).
//! Subsystem crates define their own `thiserror` enums for internal detail;
//! at the orchestrator boundary every failure collapses into one of these
//! categories so callers only ever observe a single typed shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for domain-level operations (graph validation, state transitions).
pub type Result<T> = std::result::Result<T, DomainError>;

/// The closed set of ways a run can fail, per spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid user prompt (empty, too long, malformed config). Not retried.
    InputError,
    /// Planner failed to emit a valid DAG after one retry. Terminal.
    PlanningError,
    /// Generator failed to emit a script that passes validation. Terminal.
    GenerationError,
    /// Sandbox ran but the script exited non-zero or timed out.
    ExecutionError,
    /// Validator's LLM call failed after fallback exhaustion. Terminal.
    ValidationError,
    /// Every model in an LLM fallback chain was exhausted.
    LlmUnavailable,
    /// Bug in the sandbox/runner/store, not the user's fault. Terminal.
    InternalError,
    /// Caller requested cancellation. Terminal.
    Cancelled,
    /// REFINE loop hit `max_iterations`. Terminal (FAILED).
    IterationExhausted,
}

impl ErrorCategory {
    /// Whether a caller could reasonably retry the whole run after this error.
    pub fn is_retriable_hint(&self) -> bool {
        matches!(
            self,
            ErrorCategory::ExecutionError | ErrorCategory::LlmUnavailable
        )
    }
}

/// Structured error attached to a terminal `RunState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub category: ErrorCategory,
    pub message: String,
    pub retriable_hint: bool,
}

impl RunError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        let retriable_hint = category.is_retriable_hint();
        Self {
            category,
            message: message.into(),
            retriable_hint,
        }
    }
}

/// Errors raised by domain-level validation (graph shape, state transitions).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("task graph contains a cycle")]
    CyclicGraph,

    #[error("task node {0:?} depends on unknown node {1:?}")]
    DanglingDependency(String, String),

    #[error("task graph has no nodes")]
    EmptyGraph,

    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: String, to: String },

    #[error("run is already in a terminal state: {0:?}")]
    AlreadyTerminal(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("schema version mismatch: expected major {expected}, found {found}")]
    SchemaVersionMismatch { expected: u16, found: u16 },
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
