//! `RunStateStore`: the persistence seam for `RunState` (spec §4.9, C9).
//!
//! Two implementations live in this crate, mirroring the split between
//! `langgraph_checkpoint::InMemoryCheckpointSaver` and the sqlx-backed
//! checkpoint repositories the teacher built on top of it: an in-memory,
//! TTL-aware store for dev/test, and a sqlite-backed store for durability
//! across process restarts.

use crate::error::Result;
use async_trait::async_trait;
use domain::RunState;
use uuid::Uuid;

#[async_trait]
pub trait RunStateStore: Send + Sync {
    /// Persist (insert or overwrite) a run's current snapshot. Per spec
    /// §4.9, the orchestrator is the only writer for a given `run_id` and
    /// writes serially, so this never needs to resolve write conflicts.
    async fn save(&self, state: &RunState) -> Result<()>;

    /// Load the most recently saved snapshot for `run_id`, if any.
    async fn load(&self, run_id: Uuid) -> Result<Option<RunState>>;

    /// Remove a run's snapshot entirely (used by TTL/staleness cleanup).
    async fn delete(&self, run_id: Uuid) -> Result<()>;

    /// All run ids whose last-saved status was non-terminal.
    async fn list_active(&self) -> Result<Vec<Uuid>>;
}
