//! `RunState` persistence (spec §4.9, C9).
//!
//! `RunStateStore` is the storage seam; `InMemoryRunStateStore` and
//! `SqliteRunStateStore` are its two implementations, mirroring the split
//! between `langgraph_checkpoint::InMemoryCheckpointSaver` and the
//! orchestrator's sqlx-backed checkpoint repositories. `reaper` implements
//! the staleness sweep that cancels non-terminal runs idle past
//! `stale_threshold_seconds`.

pub mod error;
pub mod memory;
pub mod reaper;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryRunStateStore;
pub use reaper::{reap_once, spawn_reaper};
pub use sqlite::SqliteRunStateStore;
pub use store::RunStateStore;

/// Default TTL for terminal runs (spec §4.9, §6 `store.run_ttl_seconds`).
pub const DEFAULT_RUN_TTL_SECONDS: i64 = 86_400;

/// Default idle threshold before a non-terminal run is considered stale
/// (spec §4.9, §6 `store.stale_threshold_seconds`).
pub const DEFAULT_STALE_THRESHOLD_SECONDS: i64 = 600;
