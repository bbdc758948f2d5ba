//! Errors raised by the Planner/Generator/Validator agents.
//!
//! Per spec §7: each agent gets a single structured-output retry; a second
//! failure propagates to the orchestrator as one of these typed errors,
//! which the orchestrator maps 1:1 onto `domain::ErrorCategory`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no model configured for role {0:?}")]
    NoModelConfigured(llm::AgentRole),

    #[error("llm call failed: {0}")]
    Llm(#[from] llm::LlmError),

    #[error("planner produced an invalid task graph after correction retry: {0}")]
    PlanningError(String),

    #[error("generator failed to produce a script that passes static validation: {0}")]
    GenerationError(String),

    #[error("validator's llm review call failed: {0}")]
    ValidationError(String),

    #[error("malformed json response from model: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
