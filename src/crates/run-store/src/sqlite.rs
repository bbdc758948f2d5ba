//! Sqlite-backed `RunStateStore` for durability across process restarts
//! (spec §4.9). Grounded on the orchestrator's `TaskRepository`/
//! `CheckpointRepository` style: plain `sqlx::query`/`query_as`, no ORM,
//! one row per run holding the latest serialized snapshot.

use crate::error::Result;
use crate::store::RunStateStore;
use async_trait::async_trait;
use domain::RunState;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use uuid::Uuid;

pub struct SqliteRunStateStore {
    pool: SqlitePool,
}

impl SqliteRunStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `run_states` table if it does not already exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS run_states (
                run_id TEXT PRIMARY KEY NOT NULL,
                status TEXT NOT NULL,
                saved_at TEXT NOT NULL,
                snapshot TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RunStateStore for SqliteRunStateStore {
    async fn save(&self, state: &RunState) -> Result<()> {
        let snapshot = serde_json::to_string(state)?;
        let status = format!("{:?}", state.status);

        sqlx::query(
            "INSERT INTO run_states (run_id, status, saved_at, snapshot)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(run_id) DO UPDATE SET
                status = excluded.status,
                saved_at = excluded.saved_at,
                snapshot = excluded.snapshot",
        )
        .bind(state.run_id.to_string())
        .bind(&status)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&snapshot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<RunState>> {
        let row = sqlx::query("SELECT snapshot FROM run_states WHERE run_id = ?")
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let snapshot: String = row.try_get("snapshot")?;
                Ok(Some(serde_json::from_str(&snapshot)?))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, run_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM run_states WHERE run_id = ?")
            .bind(run_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT run_id FROM run_states
             WHERE status NOT IN ('Succeeded', 'Failed', 'Cancelled')",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let run_id: String = row.try_get("run_id")?;
                Uuid::parse_str(&run_id).map_err(|_| {
                    crate::error::StoreError::NotFound(Uuid::nil())
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::RunState;

    async fn pool() -> SqlitePool {
        SqlitePool::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = SqliteRunStateStore::new(pool().await);
        store.migrate().await.unwrap();
        let state = RunState::new("make a box", 5);

        store.save(&state).await.unwrap();
        let loaded = store.load(state.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.run_id, state.run_id);
        assert_eq!(loaded.status, state.status);
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let store = SqliteRunStateStore::new(pool().await);
        store.migrate().await.unwrap();
        let mut state = RunState::new("make a box", 5);
        store.save(&state).await.unwrap();

        state.transition_to(domain::RunStatus::Planning).unwrap();
        store.save(&state).await.unwrap();

        let loaded = store.load(state.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, domain::RunStatus::Planning);
    }

    #[tokio::test]
    async fn list_active_excludes_terminal_statuses() {
        let store = SqliteRunStateStore::new(pool().await);
        store.migrate().await.unwrap();

        let active = RunState::new("a", 5);
        let mut done = RunState::new("b", 5);
        done.transition_to(domain::RunStatus::Planning).unwrap();
        done.transition_to(domain::RunStatus::Generating).unwrap();
        done.transition_to(domain::RunStatus::Executing).unwrap();
        done.transition_to(domain::RunStatus::Validating).unwrap();
        done.succeed().unwrap();

        store.save(&active).await.unwrap();
        store.save(&done).await.unwrap();

        let active_ids = store.list_active().await.unwrap();
        assert_eq!(active_ids, vec![active.run_id]);
    }
}
