//! Planner, Generator, and Validator: the three LLM-backed agents of the
//! design pipeline (spec §4.5-§4.7).
//!
//! Redesign flag applied (spec §9): agents are a closed set of concrete
//! structs, not an open-ended trait-object hierarchy meant for third-party
//! extension. `Agent` below is the uniform shape the orchestrator drives
//! them through; it is not meant to be implemented outside this crate.

pub mod common;
pub mod error;
pub mod generator;
pub mod planner;
pub mod resolver;
pub mod validator;

pub use error::{AgentError, Result};
pub use generator::Generator;
pub use planner::Planner;
pub use resolver::{ModelResolver, StaticModelResolver};
pub use validator::Validator;

use async_trait::async_trait;
use domain::RunState;

/// What an agent invocation produced, distinct per agent since each writes
/// a different field of `RunState`. The orchestrator pattern-matches on
/// this to decide which field to update and which status transition to take.
#[derive(Debug)]
pub enum AgentOutcome {
    Planned(domain::TaskGraph),
    Generated(domain::Script),
    Validated(domain::ValidationResult),
}

/// Uniform entry point the orchestrator's graph nodes call through. Each
/// agent already knows from `RunState.iteration`/`validation_result`
/// whether it is running fresh or in a replan/refine loop, so the
/// orchestrator does not need a separate "mode" parameter.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, state: &RunState) -> Result<AgentOutcome>;
}

#[async_trait]
impl Agent for Planner {
    async fn run(&self, state: &RunState) -> Result<AgentOutcome> {
        let graph = if state.iteration == 0 {
            self.plan(state).await?
        } else {
            self.replan(state).await?
        };
        Ok(AgentOutcome::Planned(graph))
    }
}

#[async_trait]
impl Agent for Generator {
    async fn run(&self, state: &RunState) -> Result<AgentOutcome> {
        Ok(AgentOutcome::Generated(self.generate(state).await?))
    }
}

#[async_trait]
impl Agent for Validator {
    async fn run(&self, state: &RunState) -> Result<AgentOutcome> {
        Ok(AgentOutcome::Validated(self.validate(state).await?))
    }
}
