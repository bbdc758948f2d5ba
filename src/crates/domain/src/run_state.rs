//! `RunState`: the typed record that flows through the pipeline (spec §3).
//!
//! Redesign flag applied (spec §9): this is a closed, explicit-field record,
//! not an open-ended attribute map. Serialization carries a `schema_version`
//! tag so future fields can be added without breaking old persisted runs.

use crate::error::{DomainError, ErrorCategory, Result, RunError};
use crate::graph::TaskGraph;
use crate::execution::ExecutionResult;
use crate::script::Script;
use crate::validation::ValidationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema major version. Bump when a field is removed or its
/// meaning changes; additive fields do not require a bump.
pub const SCHEMA_VERSION: u16 = 1;

/// Default iteration cap (spec §3).
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Planning,
    Generating,
    Executing,
    Validating,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Terminal statuses are monotone: once entered, a run never leaves them
    /// (spec §3 invariant).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// Valid (from, to) edges of the state machine in spec §4.10, independent
/// of the *reason* for the transition (the orchestrator decides that).
pub fn is_valid_transition(from: RunStatus, to: RunStatus) -> bool {
    use RunStatus::*;
    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (Pending, Planning)
            | (Planning, Generating)
            | (Planning, Failed)
            | (Generating, Executing)
            | (Generating, Failed)
            | (Executing, Validating)
            | (Validating, Succeeded)
            | (Validating, Generating)
            | (Validating, Planning)
            | (Validating, Failed)
            | (_, Cancelled)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    pub run_id: Uuid,
    pub user_prompt: String,
    pub task_graph: Option<TaskGraph>,
    pub current_script: Option<Script>,
    pub execution_result: Option<ExecutionResult>,
    pub validation_result: Option<ValidationResult>,
    pub iteration: u32,
    pub max_iterations: u32,
    pub status: RunStatus,
    pub error: Option<RunError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub correlation_id: String,
}

fn default_schema_version() -> u16 {
    SCHEMA_VERSION
}

impl RunState {
    pub fn new(user_prompt: impl Into<String>, max_iterations: u32) -> Self {
        let now = Utc::now();
        let run_id = Uuid::new_v4();
        Self {
            schema_version: SCHEMA_VERSION,
            run_id,
            user_prompt: user_prompt.into(),
            task_graph: None,
            current_script: None,
            execution_result: None,
            validation_result: None,
            iteration: 0,
            max_iterations,
            status: RunStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
            correlation_id: run_id.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a new status, enforcing the transition table and the
    /// terminal-monotonicity invariant. Always bumps `updated_at`.
    pub fn transition_to(&mut self, to: RunStatus) -> Result<()> {
        if !is_valid_transition(self.status, to) {
            return Err(DomainError::InvalidTransition {
                from: format!("{:?}", self.status),
                to: format!("{:?}", to),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn fail(&mut self, category: ErrorCategory, message: impl Into<String>) -> Result<()> {
        self.error = Some(RunError::new(category, message));
        self.transition_to(RunStatus::Failed)
    }

    pub fn succeed(&mut self) -> Result<()> {
        self.transition_to(RunStatus::Succeeded)
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.error = Some(RunError::new(ErrorCategory::Cancelled, "run cancelled by caller"));
        self.transition_to(RunStatus::Cancelled)
    }

    /// Check the `iteration <= max_iterations` invariant (spec §3, §8).
    pub fn iteration_within_budget(&self) -> bool {
        self.iteration <= self.max_iterations
    }

    /// Validate basic field invariants after deserialization or construction.
    pub fn check_invariants(&self) -> Result<()> {
        if self.updated_at < self.created_at {
            return Err(DomainError::Serialization(
                "updated_at precedes created_at".into(),
            ));
        }
        if !self.iteration_within_budget() {
            return Err(DomainError::Serialization(
                "iteration exceeds max_iterations".into(),
            ));
        }
        if self.schema_version > SCHEMA_VERSION {
            return Err(DomainError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: self.schema_version,
            });
        }
        Ok(())
    }
}
