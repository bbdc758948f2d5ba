//! Orchestrator-level error types (spec §7).
//!
//! Every subsystem failure that can reach a pipeline node is mapped onto
//! `domain::ErrorCategory` right there in the node body — that mapping is
//! the orchestrator's whole job per the §9 redesign flag ("in-band sandbox
//! errors plus a single typed orchestrator error that wraps everything
//! else"). `OrchestratorError` below covers failures in the orchestrator's
//! *own* plumbing (config, graph construction, persistence) rather than
//! agent/sandbox failures, which are folded into `RunState.error` instead
//! of ever reaching a caller as an `Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("graph construction failed: {0}")]
    Graph(#[from] langgraph_core::error::GraphError),

    #[error("run store error: {0}")]
    Store(#[from] run_store::StoreError),

    #[error("audit log error: {0}")]
    Audit(#[from] audit::AuditError),

    #[error("run state invariant violated: {0}")]
    Domain(#[from] domain::DomainError),

    #[error("no such run: {0}")]
    RunNotFound(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Maps an agent failure onto the closed error taxonomy of spec §7. Each
/// agent already tells us which stage failed; this just picks the matching
/// category for `RunState::fail`.
pub fn category_for_agent_error(stage: Stage, error: &agents::AgentError) -> domain::ErrorCategory {
    use domain::ErrorCategory;
    match (stage, error) {
        (_, agents::AgentError::NoModelConfigured(_)) => ErrorCategory::LlmUnavailable,
        (_, agents::AgentError::Llm(_)) => ErrorCategory::LlmUnavailable,
        (Stage::Plan, _) => ErrorCategory::PlanningError,
        (Stage::Generate, _) => ErrorCategory::GenerationError,
        (Stage::Validate, _) => ErrorCategory::ValidationError,
    }
}

/// Which pipeline stage was running when an agent error occurred; used only
/// to pick the right `ErrorCategory` (the agent's own error variant already
/// carries the message).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Generate,
    Validate,
}
