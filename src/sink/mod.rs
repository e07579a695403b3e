//! Durable output for coalesced updates and event rows.
//!
//! Both streams are append-only; nothing in the pipeline reads them back.

mod memory;
mod sqlite;

pub use memory::MemorySink;
pub use sqlite::SqliteSink;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded session (one replay file)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// UUIDv7, generated when the pipeline starts
    pub id: String,
    pub title: String,
    pub level: String,
    pub game: String,
    /// Serialized recording header
    pub data: String,
    pub tickrate: u32,
    pub created_at: DateTime<Utc>,
}

/// Coalesced property update row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub session_id: String,
    pub index: u32,
    pub tick: u32,
    pub property: String,
    /// `{"value": ...}` JSON text
    pub value: String,
}

/// Derived event row; role maps are `None` when no role resolved
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub session_id: String,
    pub tick: u32,
    pub name: String,
    pub data: String,
    pub locations: Option<String>,
    pub entities: Option<String>,
}

/// Bulk-insert style sink shared by the ingestion path and flush tasks.
///
/// Implementations must accept interleaved writes from concurrent flush
/// generations in any order. Update rows for the same
/// (session, entity, tick, property) may arrive more than once and should
/// overwrite.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<()>;

    async fn write_update(&self, record: &UpdateRecord) -> Result<()>;

    async fn write_event(&self, record: &EventRecord) -> Result<()>;

    async fn set_tickrate(&self, session_id: &str, tickrate: u32) -> Result<()>;

    /// Makes everything written so far durable. Called once, last.
    async fn commit(&self) -> Result<()>;
}
