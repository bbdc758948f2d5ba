//! Append-only audit event record (spec §3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

/// The enumerated set of event types from spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    RunCreated,
    PlanGenerated,
    ScriptGenerated,
    ExecutionStarted,
    ExecutionCompleted,
    ValidationCompleted,
    RefinementStarted,
    RunSucceeded,
    RunFailed,
    RunCancelled,
    AgentCallStarted,
    AgentCallCompleted,
    LlmCall,
    ExportCompleted,
}

/// One append-only log entry, keyed by `run_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub payload: Json,
    pub correlation_id: String,
    /// Monotonic per-run offset, assigned by the log on append. Supports
    /// resumable tailing (spec §4.8 "storage model").
    #[serde(default)]
    pub offset: u64,
}

impl AuditEvent {
    pub fn new(
        run_id: Uuid,
        event_type: AuditEventType,
        payload: Json,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            run_id,
            timestamp: Utc::now(),
            event_type,
            payload,
            correlation_id: correlation_id.into(),
            offset: 0,
        }
    }
}
