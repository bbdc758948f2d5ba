//! `AuditSink`: the append-only storage seam for audit events (spec §4.8
//! "storage model"). Two implementations live in this crate — in-memory for
//! dev/test and sqlite-backed for durability — mirroring the teacher's
//! checkpoint-saver split between `langgraph-checkpoint::InMemoryCheckpointSaver`
//! and the orchestrator's sqlx repositories.

use crate::error::Result;
use async_trait::async_trait;
use domain::AuditEvent;
use uuid::Uuid;

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one event, assigning it the next monotonic per-run offset.
    async fn append(&self, event: AuditEvent) -> Result<AuditEvent>;

    /// All events for `run_id` in insertion (offset) order.
    async fn history(&self, run_id: Uuid) -> Result<Vec<AuditEvent>>;
}
