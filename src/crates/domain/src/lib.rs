//! Shared value types for the design pipeline: `RunState`, `TaskGraph`,
//! `Script`, `ExecutionResult`, `ValidationResult`, `AuditEvent`, and the
//! error taxonomy they're built from.
//!
//! This crate has no I/O and no async — it is the vocabulary that the
//! `llm`, `sandbox`, `cad-runner`, `agents`, `audit`, `run-store`, and
//! `orchestrator` crates all speak, so that a `RunState` produced by one
//! subsystem deserializes cleanly in any other.

pub mod audit;
pub mod error;
pub mod execution;
pub mod graph;
pub mod run_config;
pub mod run_state;
pub mod script;
pub mod validation;

pub use audit::{AuditEvent, AuditEventType};
pub use error::{DomainError, ErrorCategory, Result, RunError};
pub use execution::{BoundingBox, ExecutionResult, ObjectSummary, RuntimeError};
pub use graph::{ParamValue, TaskGraph, TaskNode};
pub use run_config::{AgentTimeouts, ModelOverride, RunConfig};
pub use run_state::{is_valid_transition, RunState, RunStatus, DEFAULT_MAX_ITERATIONS, SCHEMA_VERSION};
pub use script::Script;
pub use validation::{Issue, Severity, ValidationDecision, ValidationResult};
