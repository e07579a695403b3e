//! Session storage in SQLite.
//!
//! Everything one run writes lives in a single transaction opened with the
//! store and committed by [`Sink::commit`], so an aborted run leaves no
//! partial session behind.

use super::{EventRecord, Session, Sink, UpdateRecord};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed sink.
///
/// # Schema
/// ```sql
/// CREATE TABLE sessions (
///     id TEXT PRIMARY KEY, title TEXT, level TEXT, game TEXT NOT NULL,
///     data TEXT, tickrate INTEGER NOT NULL, created_at TEXT NOT NULL
/// );
/// CREATE TABLE entity_props (
///     session_id TEXT NOT NULL, entity_index INTEGER NOT NULL,
///     tick INTEGER NOT NULL, prop TEXT NOT NULL, value TEXT,
///     PRIMARY KEY (session_id, entity_index, tick, prop)
/// );
/// CREATE TABLE events (
///     session_id TEXT NOT NULL, tick INTEGER NOT NULL, name TEXT NOT NULL,
///     data TEXT, locations TEXT, entities TEXT
/// );
/// ```
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Opens (or creates) the database, ensures the schema and begins the
    /// run's transaction.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open session DB at {}", db_path))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables()?;
        store
            .lock()?
            .execute_batch("BEGIN")
            .context("Failed to begin transaction")?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("session DB connection mutex poisoned"))
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id         TEXT PRIMARY KEY,
                title      TEXT,
                level      TEXT,
                game       TEXT NOT NULL,
                data       TEXT,
                tickrate   INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS entity_props (
                session_id   TEXT NOT NULL,
                entity_index INTEGER NOT NULL,
                tick         INTEGER NOT NULL,
                prop         TEXT NOT NULL,
                value        TEXT,
                PRIMARY KEY (session_id, entity_index, tick, prop)
            );
            CREATE TABLE IF NOT EXISTS events (
                session_id TEXT NOT NULL,
                tick       INTEGER NOT NULL,
                name       TEXT NOT NULL,
                data       TEXT,
                locations  TEXT,
                entities   TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_events_session_tick ON events(session_id, tick);",
        )
        .context("Failed to create session tables")?;
        Ok(())
    }

    /// Loads a session row by id.
    pub fn load_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, title, level, game, data, tickrate, created_at
                 FROM sessions WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, u32>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query session")?;

        match row {
            None => Ok(None),
            Some((id, title, level, game, data, tickrate, created_at)) => {
                let created_at = created_at
                    .parse()
                    .with_context(|| format!("Failed to parse created_at for session {}", id))?;
                Ok(Some(Session {
                    id,
                    title,
                    level,
                    game,
                    data,
                    tickrate,
                    created_at,
                }))
            }
        }
    }

    /// All update rows of a session, ordered by entity, tick and property.
    pub fn load_updates(&self, session_id: &str) -> Result<Vec<UpdateRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT session_id, entity_index, tick, prop, value FROM entity_props
                 WHERE session_id = ?1 ORDER BY entity_index, tick, prop",
            )
            .context("Failed to prepare load_updates query")?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(UpdateRecord {
                    session_id: row.get(0)?,
                    index: row.get(1)?,
                    tick: row.get(2)?,
                    property: row.get(3)?,
                    value: row.get(4)?,
                })
            })
            .context("Failed to query entity_props")?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.context("Failed to read entity_props row")?);
        }
        Ok(records)
    }

    /// All event rows of a session in insertion order.
    pub fn load_events(&self, session_id: &str) -> Result<Vec<EventRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT session_id, tick, name, data, locations, entities FROM events
                 WHERE session_id = ?1 ORDER BY rowid",
            )
            .context("Failed to prepare load_events query")?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(EventRecord {
                    session_id: row.get(0)?,
                    tick: row.get(1)?,
                    name: row.get(2)?,
                    data: row.get(3)?,
                    locations: row.get(4)?,
                    entities: row.get(5)?,
                })
            })
            .context("Failed to query events")?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.context("Failed to read events row")?);
        }
        Ok(records)
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (id, title, level, game, data, tickrate, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id,
                session.title,
                session.level,
                session.game,
                session.data,
                session.tickrate,
                session.created_at.to_rfc3339()
            ],
        )
        .context("Failed to insert session")?;
        Ok(())
    }

    async fn write_update(&self, record: &UpdateRecord) -> Result<()> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                "INSERT OR REPLACE INTO entity_props (session_id, entity_index, tick, prop, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .context("Failed to prepare entity_props insert")?;
        stmt.execute(params![
            record.session_id,
            record.index,
            record.tick,
            record.property,
            record.value
        ])
        .context("Failed to insert entity prop")?;
        Ok(())
    }

    async fn write_event(&self, record: &EventRecord) -> Result<()> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                "INSERT INTO events (session_id, tick, name, data, locations, entities)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .context("Failed to prepare events insert")?;
        stmt.execute(params![
            record.session_id,
            record.tick,
            record.name,
            record.data,
            record.locations,
            record.entities
        ])
        .context("Failed to insert event")?;
        Ok(())
    }

    async fn set_tickrate(&self, session_id: &str, tickrate: u32) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE sessions SET tickrate = ?1 WHERE id = ?2",
            params![tickrate, session_id],
        )
        .context("Failed to update tickrate")?;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.lock()?
            .execute_batch("COMMIT")
            .context("Failed to commit session transaction")?;
        Ok(())
    }
}
