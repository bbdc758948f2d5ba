//! `AuditLog`: the public entry point agents and the orchestrator call
//! through (spec §4.8's `log_event`/`stream_events`/`subscribe` contract),
//! composing a pluggable `AuditSink` with the in-process pub/sub registry.

use crate::registry::SubscriberRegistry;
use crate::sink::AuditSink;
use domain::{AuditEvent, AuditEventType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Event types that close out a run; `stream_events` stops tailing once one
/// of these is observed (spec §4.8: "tails new [events] until the run
/// reaches a terminal status").
fn is_terminal_event(event_type: AuditEventType) -> bool {
    matches!(
        event_type,
        AuditEventType::RunSucceeded | AuditEventType::RunFailed | AuditEventType::RunCancelled
    )
}

pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
    registry: SubscriberRegistry,
    swallowed_errors: AtomicU64,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            registry: SubscriberRegistry::new(),
            swallowed_errors: AtomicU64::new(0),
        }
    }

    /// spec §4.8: append-only write that never fails the caller. A sink
    /// error is logged, counted, and otherwise swallowed; the event is
    /// still published to subscribers with a locally synthesized offset so
    /// live tailers aren't blocked by a transient store failure.
    pub async fn log_event(
        &self,
        run_id: Uuid,
        event_type: AuditEventType,
        payload: serde_json::Value,
        correlation_id: impl Into<String>,
    ) -> Uuid {
        let event = AuditEvent::new(run_id, event_type, payload, correlation_id);
        let event_id = event.event_id;

        match self.sink.append(event.clone()).await {
            Ok(persisted) => self.registry.publish(persisted),
            Err(err) => {
                self.swallowed_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %err, %run_id, ?event_type, "audit event write failed, swallowing");
                self.registry.publish(event);
            }
        }

        event_id
    }

    pub fn subscribe(&self, run_id: Uuid) -> tokio::sync::broadcast::Receiver<AuditEvent> {
        self.registry.subscribe(run_id)
    }

    /// spec §4.8: historical events for `run_id`, then live-tailed new
    /// events, until a terminal event type is seen or the channel closes.
    pub fn stream_events(&self, run_id: Uuid) -> impl futures::Stream<Item = AuditEvent> + '_ {
        let sink = self.sink.clone();
        let mut receiver = self.subscribe(run_id);

        async_stream::stream! {
            let history = sink.history(run_id).await.unwrap_or_default();
            let mut last_offset = None;
            for event in history {
                last_offset = Some(event.offset);
                let terminal = is_terminal_event(event.event_type);
                yield event;
                if terminal {
                    return;
                }
            }

            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if let Some(seen) = last_offset {
                            if event.offset <= seen {
                                continue;
                            }
                        }
                        let terminal = is_terminal_event(event.event_type);
                        last_offset = Some(event.offset);
                        yield event;
                        if terminal {
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }

    pub fn swallowed_error_count(&self) -> u64 {
        self.swallowed_errors.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryAuditSink;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn stream_events_replays_history_then_terminates_on_terminal_event() {
        let log = AuditLog::new(Arc::new(InMemoryAuditSink::new()));
        let run_id = Uuid::new_v4();

        log.log_event(run_id, AuditEventType::RunCreated, json!({}), "c1").await;
        log.log_event(run_id, AuditEventType::PlanGenerated, json!({}), "c1").await;
        log.log_event(run_id, AuditEventType::RunSucceeded, json!({}), "c1").await;

        let events: Vec<_> = log.stream_events(run_id).collect().await;
        assert_eq!(events.len(), 3);
        assert_eq!(events.last().unwrap().event_type, AuditEventType::RunSucceeded);
    }

    #[tokio::test]
    async fn log_event_returns_distinct_ids() {
        let log = AuditLog::new(Arc::new(InMemoryAuditSink::new()));
        let run_id = Uuid::new_v4();
        let a = log.log_event(run_id, AuditEventType::RunCreated, json!({}), "c1").await;
        let b = log.log_event(run_id, AuditEventType::PlanGenerated, json!({}), "c1").await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn no_sink_errors_means_zero_swallowed_count() {
        let log = AuditLog::new(Arc::new(InMemoryAuditSink::new()));
        log.log_event(Uuid::new_v4(), AuditEventType::RunCreated, json!({}), "c1").await;
        assert_eq!(log.swallowed_error_count(), 0);
    }
}
