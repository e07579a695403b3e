use crate::value::PropValue;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Properties that change nearly every tick and never carry an event-worthy
/// signal.
pub const DEFAULT_IGNORED_PROPERTIES: [&str; 9] = [
    "m_iCursor.0000",
    "m_iCursor.0001",
    "m_anglediff",
    "m_NetworkActivity",
    "CBodyComponentBaseAnimatingOverlay.m_nNewSequenceParity",
    "CBodyComponentBaseAnimatingOverlay.m_nResetEventsParity",
    "m_NetworkSequenceIndex",
    "CBodyComponentBaseAnimatingOverlay.m_flPlaybackRate",
    "CDOTAGamerules.m_iFoWFrameNumber",
];

/// Last-known raw value per (entity, property)
pub struct ChangeDetector {
    snapshots: HashMap<u32, HashMap<String, PropValue>>,
    ignored: HashSet<String>,
}

impl ChangeDetector {
    /// Detector with the built-in denylist plus `extra_ignored`.
    pub fn new<I, S>(extra_ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ignored: HashSet<String> = DEFAULT_IGNORED_PROPERTIES
            .iter()
            .map(|p| p.to_string())
            .collect();
        ignored.extend(extra_ignored.into_iter().map(Into::into));

        Self {
            snapshots: HashMap::new(),
            ignored,
        }
    }

    /// Starts a fresh, empty snapshot for a newly created entity.
    pub fn track(&mut self, index: u32) {
        self.snapshots.insert(index, HashMap::new());
    }

    /// Drops the snapshot of a destroyed entity.
    pub fn forget(&mut self, index: u32) {
        if self.snapshots.remove(&index).is_some() {
            debug!(entity = index, "Dropped property snapshot");
        }
    }

    pub fn is_ignored(&self, property: &str) -> bool {
        self.ignored.contains(property)
    }

    /// Returns true if `value` should be forwarded.
    ///
    /// The raw value is recorded whenever it is forwarded, so later
    /// comparisons stay correct even when the forwarded form is derived.
    pub fn observe(&mut self, index: u32, property: &str, value: &PropValue) -> bool {
        if self.is_ignored(property) {
            return false;
        }

        let snapshot = self.snapshots.entry(index).or_default();
        if snapshot.get(property) == Some(value) {
            return false;
        }

        snapshot.insert(property.to_string(), value.clone());
        true
    }

    /// Number of entities with a live snapshot
    pub fn tracked_entities(&self) -> usize {
        self.snapshots.len()
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}
