//! In-memory `AuditSink`, for development and tests (spec §4.8; grounded on
//! `langgraph-checkpoint::InMemoryCheckpointSaver`'s "no external
//! dependencies, thread-safe, ephemeral" shape — here backed by `DashMap`
//! instead of `Arc<RwLock<HashMap>>` since each run_id's log only ever has
//! one concurrent writer, so per-key locking is enough).

use crate::error::Result;
use crate::sink::AuditSink;
use async_trait::async_trait;
use dashmap::DashMap;
use domain::AuditEvent;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryAuditSink {
    events: DashMap<Uuid, Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, mut event: AuditEvent) -> Result<AuditEvent> {
        let mut entry = self.events.entry(event.run_id).or_default();
        event.offset = entry.len() as u64;
        entry.push(event.clone());
        Ok(event)
    }

    async fn history(&self, run_id: Uuid) -> Result<Vec<AuditEvent>> {
        Ok(self.events.get(&run_id).map(|v| v.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::AuditEventType;
    use serde_json::json;

    #[tokio::test]
    async fn assigns_monotonic_offsets_per_run() {
        let sink = InMemoryAuditSink::new();
        let run_id = Uuid::new_v4();

        let first = sink
            .append(AuditEvent::new(run_id, AuditEventType::RunCreated, json!({}), "c1"))
            .await
            .unwrap();
        let second = sink
            .append(AuditEvent::new(run_id, AuditEventType::PlanGenerated, json!({}), "c1"))
            .await
            .unwrap();

        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);

        let history = sink.history(run_id).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn unknown_run_id_has_empty_history() {
        let sink = InMemoryAuditSink::new();
        let history = sink.history(Uuid::new_v4()).await.unwrap();
        assert!(history.is_empty());
    }
}
