//! In-memory, TTL-aware `RunStateStore` for development and tests.
//!
//! Grounded on `langgraph_checkpoint::InMemoryCheckpointSaver`'s
//! "no external dependencies, thread-safe, ephemeral" shape; `DashMap`
//! replaces `Arc<RwLock<HashMap>>` since each run_id has exactly one
//! concurrent writer (spec §4.9's consistency note).

use crate::error::Result;
use crate::store::RunStateStore;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use domain::RunState;
use uuid::Uuid;

struct Entry {
    state: RunState,
    saved_at: chrono::DateTime<Utc>,
}

/// In-memory store. TTL expiry (spec §4.9's "terminal retained 24h") is
/// enforced lazily on `load`/`list_active` rather than by a background
/// sweep in this type itself — the reaper task (`crate::reaper`) is the
/// one piece that needs to run proactively, since it must *act* (cancel a
/// stale run), not merely hide an expired read.
#[derive(Default)]
pub struct InMemoryRunStateStore {
    runs: DashMap<Uuid, Entry>,
}

impl InMemoryRunStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_expired(entry: &Entry, ttl_seconds: i64) -> bool {
        entry.state.is_terminal()
            && Utc::now().signed_duration_since(entry.saved_at).num_seconds() >= ttl_seconds
    }

    /// Drop terminal entries whose TTL has elapsed. Exposed so the reaper
    /// (or a test) can trigger a sweep deterministically instead of
    /// waiting on lazy per-read expiry.
    pub fn sweep_expired(&self, ttl_seconds: i64) {
        self.runs.retain(|_, entry| !Self::is_expired(entry, ttl_seconds));
    }
}

#[async_trait]
impl RunStateStore for InMemoryRunStateStore {
    async fn save(&self, state: &RunState) -> Result<()> {
        self.runs.insert(
            state.run_id,
            Entry {
                state: state.clone(),
                saved_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<RunState>> {
        Ok(self.runs.get(&run_id).map(|e| e.state.clone()))
    }

    async fn delete(&self, run_id: Uuid) -> Result<()> {
        self.runs.remove(&run_id);
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Uuid>> {
        Ok(self
            .runs
            .iter()
            .filter(|e| !e.state.is_terminal())
            .map(|e| *e.key())
            .collect())
    }
}
