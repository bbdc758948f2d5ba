//! Staleness reaper (spec §4.9): non-terminal runs with no update for
//! `stale_threshold_seconds` are cancelled. Runs as a periodic background
//! task at half the staleness threshold, per the spec's scan-cadence note.

use crate::store::RunStateStore;
use chrono::Utc;
use domain::{ErrorCategory, RunState};
use std::sync::Arc;
use std::time::Duration;

/// One sweep: loads every active run, cancels any whose `updated_at` is
/// older than `stale_threshold_seconds`, and returns the cancelled ids.
pub async fn reap_once(
    store: &dyn RunStateStore,
    stale_threshold_seconds: i64,
) -> crate::error::Result<Vec<uuid::Uuid>> {
    let mut cancelled = Vec::new();
    for run_id in store.list_active().await? {
        let Some(mut state) = store.load(run_id).await? else {
            continue;
        };
        let idle = Utc::now().signed_duration_since(state.updated_at).num_seconds();
        if idle >= stale_threshold_seconds {
            mark_stale_cancelled(&mut state);
            store.save(&state).await?;
            cancelled.push(run_id);
        }
    }
    Ok(cancelled)
}

fn mark_stale_cancelled(state: &mut RunState) {
    state.error = Some(domain::RunError::new(
        ErrorCategory::Cancelled,
        "run marked stale by reaper: no update within stale_threshold_seconds",
    ));
    // Cancellation is a valid transition from every non-terminal status
    // (spec §4.10's `any non-terminal -> cancel -> CANCELLED` row), so this
    // only fails if the run already reached a terminal status between the
    // `list_active` scan and this load — a race the caller can safely
    // ignore by skipping that run on the next sweep.
    let _ = state.transition_to(domain::RunStatus::Cancelled);
}

/// Spawns a background task that sweeps every `stale_threshold_seconds / 2`
/// until `shutdown` fires, per spec §4.9.
pub fn spawn_reaper(
    store: Arc<dyn RunStateStore>,
    stale_threshold_seconds: i64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs((stale_threshold_seconds.max(2) / 2) as u64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match reap_once(store.as_ref(), stale_threshold_seconds).await {
                        Ok(cancelled) if !cancelled.is_empty() => {
                            tracing::info!(count = cancelled.len(), "reaper cancelled stale runs");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "reaper sweep failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRunStateStore;
    use domain::RunState;

    #[tokio::test]
    async fn reaps_idle_non_terminal_runs() {
        let store = InMemoryRunStateStore::new();
        let mut stale = RunState::new("a", 5);
        stale.updated_at = Utc::now() - chrono::Duration::seconds(700);
        store.save(&stale).await.unwrap();

        let fresh = RunState::new("b", 5);
        store.save(&fresh).await.unwrap();

        let cancelled = reap_once(&store, 600).await.unwrap();
        assert_eq!(cancelled, vec![stale.run_id]);

        let reloaded = store.load(stale.run_id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, domain::RunStatus::Cancelled);

        let untouched = store.load(fresh.run_id).await.unwrap().unwrap();
        assert_eq!(untouched.status, domain::RunStatus::Pending);
    }

    #[tokio::test]
    async fn leaves_fresh_runs_untouched() {
        let store = InMemoryRunStateStore::new();
        let fresh = RunState::new("a", 5);
        store.save(&fresh).await.unwrap();

        let cancelled = reap_once(&store, 600).await.unwrap();
        assert!(cancelled.is_empty());
    }
}
