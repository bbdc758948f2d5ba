//! Sqlite-backed `AuditSink` for durability across process restarts (spec
//! §4.8). Grounded on the orchestrator's `TaskRepository`: plain
//! `sqlx::query`/`query_as` calls over a shared `SqlitePool`, no ORM.

use crate::error::Result;
use crate::sink::AuditSink;
use async_trait::async_trait;
use domain::{AuditEvent, AuditEventType};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use uuid::Uuid;

pub struct SqliteAuditSink {
    pool: SqlitePool,
}

impl SqliteAuditSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `audit_events` table if it does not already exist. Called
    /// once at startup by whatever wires the pool together; not run
    /// automatically on `new` so callers control migration ordering
    /// alongside the run-store's own schema.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS audit_events (
                event_id TEXT PRIMARY KEY NOT NULL,
                run_id TEXT NOT NULL,
                offset INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                correlation_id TEXT NOT NULL,
                UNIQUE(run_id, offset)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn append(&self, mut event: AuditEvent) -> Result<AuditEvent> {
        let next_offset: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(offset), -1) + 1 FROM audit_events WHERE run_id = ?",
        )
        .bind(event.run_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        event.offset = next_offset as u64;

        let event_type = serde_json::to_value(event.event_type)?
            .as_str()
            .unwrap_or_default()
            .to_string();
        let payload = serde_json::to_string(&event.payload)?;

        sqlx::query(
            "INSERT INTO audit_events
                (event_id, run_id, offset, timestamp, event_type, payload, correlation_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.event_id.to_string())
        .bind(event.run_id.to_string())
        .bind(event.offset as i64)
        .bind(event.timestamp.to_rfc3339())
        .bind(&event_type)
        .bind(&payload)
        .bind(&event.correlation_id)
        .execute(&self.pool)
        .await?;

        Ok(event)
    }

    async fn history(&self, run_id: Uuid) -> Result<Vec<AuditEvent>> {
        let rows = sqlx::query(
            "SELECT event_id, run_id, offset, timestamp, event_type, payload, correlation_id
             FROM audit_events WHERE run_id = ? ORDER BY offset ASC",
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_id: String = row.try_get("event_id")?;
            let run_id: String = row.try_get("run_id")?;
            let offset: i64 = row.try_get("offset")?;
            let timestamp: String = row.try_get("timestamp")?;
            let event_type: String = row.try_get("event_type")?;
            let payload: String = row.try_get("payload")?;
            let correlation_id: String = row.try_get("correlation_id")?;

            events.push(AuditEvent {
                event_id: Uuid::parse_str(&event_id).unwrap_or_default(),
                run_id: Uuid::parse_str(&run_id).unwrap_or_default(),
                offset: offset as u64,
                timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .unwrap_or_else(|_| chrono::Utc::now()),
                event_type: serde_json::from_value(serde_json::Value::String(event_type))
                    .unwrap_or(AuditEventType::RunCreated),
                payload: serde_json::from_str(&payload)?,
                correlation_id,
            });
        }
        Ok(events)
    }
}
