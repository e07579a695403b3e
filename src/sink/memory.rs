use super::{EventRecord, Session, Sink, UpdateRecord};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    sessions: Vec<Session>,
    updates: Vec<UpdateRecord>,
    events: Vec<EventRecord>,
    committed: bool,
}

/// In-process sink used for dry runs and tests.
///
/// `fail_updates(n)` makes the next `n` update writes fail, to exercise
/// the flush retry path.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<Tables>,
    failing_updates: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| anyhow!("memory sink mutex poisoned"))
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.lock().map(|t| t.sessions.clone()).unwrap_or_default()
    }

    pub fn updates(&self) -> Vec<UpdateRecord> {
        self.lock().map(|t| t.updates.clone()).unwrap_or_default()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.lock().map(|t| t.events.clone()).unwrap_or_default()
    }

    pub fn is_committed(&self) -> bool {
        self.lock().map(|t| t.committed).unwrap_or(false)
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.sessions.iter().any(|s| s.id == session.id) {
            bail!("session {} already exists", session.id);
        }
        tables.sessions.push(session.clone());
        Ok(())
    }

    async fn write_update(&self, record: &UpdateRecord) -> Result<()> {
        let fail = self
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            bail!("injected write failure for entity {}", record.index);
        }

        let mut tables = self.lock()?;
        tables.updates.push(record.clone());
        Ok(())
    }

    async fn write_event(&self, record: &EventRecord) -> Result<()> {
        self.lock()?.events.push(record.clone());
        Ok(())
    }

    async fn set_tickrate(&self, session_id: &str, tickrate: u32) -> Result<()> {
        let mut tables = self.lock()?;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| anyhow!("unknown session {}", session_id))?;
        session.tickrate = tickrate;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.committed {
            bail!("memory sink already committed");
        }
        tables.committed = true;
        Ok(())
    }
}
