// Write-coalescing update cache and its flush machinery

mod flusher;
mod scheduler;

pub use flusher::{FlushError, FlushExecutor, FlushReport, FlushSummary, RetryPolicy};
pub use scheduler::{FlushScheduler, DEFAULT_WINDOW_TICKS};

pub(crate) use flusher::with_retry;

use crate::value::PropValue;
use std::collections::HashMap;


/// Most recent value seen for one (entity, property) pair in a window
#[derive(Clone, Debug, PartialEq)]
pub struct BufferedUpdate {
    pub tick: u32,
    pub value: PropValue,
}

/// entity index -> property -> latest update
pub type EntityPropMap = HashMap<u32, HashMap<String, BufferedUpdate>>;

/// Last-write-wins cache of property updates between flushes.
///
/// A drain hands the whole current generation to the caller and leaves an
/// empty map behind, so ingestion continues while the detached generation
/// is written out.
#[derive(Debug, Default)]
pub struct BufferedUpdates {
    entities: EntityPropMap,
}

impl BufferedUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the update for (index, property).
    pub fn buffer(&mut self, index: u32, property: impl Into<String>, tick: u32, value: PropValue) {
        self.entities
            .entry(index)
            .or_default()
            .insert(property.into(), BufferedUpdate { tick, value });
    }

    /// Detaches the current generation, leaving the cache empty.
    pub fn drain(&mut self) -> EntityPropMap {
        std::mem::take(&mut self.entities)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Read access for flush-boundary inspection (before the drain)
    pub fn entities(&self) -> &EntityPropMap {
        &self.entities
    }

    pub fn get(&self, index: u32, property: &str) -> Option<&BufferedUpdate> {
        self.entities.get(&index).and_then(|props| props.get(property))
    }

    /// Total buffered (entity, property) pairs
    pub fn len(&self) -> usize {
        self.entities.values().map(HashMap::len).sum()
    }
}
