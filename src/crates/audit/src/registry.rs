//! Per-run broadcast registry (spec §4.8 "pub/sub"): fans out newly
//! appended events to in-process subscribers. Grounded on the teacher's
//! websocket connection pool — a `DashMap`-backed registry keyed by an id,
//! lazily creating a channel on first subscribe and dropping it once the
//! last subscriber disconnects.

use dashmap::DashMap;
use domain::AuditEvent;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct SubscriberRegistry {
    channels: DashMap<Uuid, broadcast::Sender<AuditEvent>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, run_id: Uuid) -> broadcast::Sender<AuditEvent> {
        self.channels
            .entry(run_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publish an event to every current subscriber for its run. A run with
    /// no subscribers simply drops the send (`broadcast::Sender::send`
    /// returning an error with zero receivers is not a failure here).
    pub fn publish(&self, event: AuditEvent) {
        let sender = self.sender(event.run_id);
        let _ = sender.send(event);
    }

    pub fn subscribe(&self, run_id: Uuid) -> broadcast::Receiver<AuditEvent> {
        self.sender(run_id).subscribe()
    }
}
