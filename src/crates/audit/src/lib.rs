//! Append-only audit log + pub/sub (spec §4.8, C8).
//!
//! `AuditSink` is the storage seam; `InMemoryAuditSink` and
//! `SqliteAuditSink` are its two implementations. `AuditLog` is the public
//! surface every other crate calls through: `log_event` (never fails the
//! caller), `subscribe` (raw broadcast receiver), and `stream_events`
//! (history replay + live tail, terminating at the run's terminal event).

pub mod error;
pub mod log;
pub mod memory;
pub mod registry;
pub mod sink;
pub mod sqlite;

pub use error::{AuditError, Result};
pub use log::AuditLog;
pub use memory::InMemoryAuditSink;
pub use registry::SubscriberRegistry;
pub use sink::AuditSink;
pub use sqlite::SqliteAuditSink;
