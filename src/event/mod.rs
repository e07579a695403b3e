use crate::coords::Vector3;
use crate::sink::EventRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

mod builder;
mod movement;

pub use builder::RoleResolver;
pub use movement::synthesize_hero_moves;

/// Name of the derived movement event
pub const HERO_MOVE: &str = "hero_move";

/// A derived domain event, ready for delivery to the sink.
///
/// Rows are immutable once built. Role maps that resolved nothing are
/// `None` rather than empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    /// Tick the event happened at
    pub tick: u32,

    /// Lower-case event name (e.g. "chat_message_hero_kill", "hero_move")
    pub name: String,

    /// Event payload (opaque to the pipeline)
    pub data: Value,

    /// Role name -> reconstructed world position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<BTreeMap<String, Vector3>>,

    /// Role name -> entity index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<BTreeMap<String, u32>>,
}

impl EventRow {
    pub fn new(tick: u32, name: impl Into<String>, data: Value) -> Self {
        Self {
            tick,
            name: name.into(),
            data,
            locations: None,
            entities: None,
        }
    }

    pub fn with_locations(mut self, locations: BTreeMap<String, Vector3>) -> Self {
        self.locations = if locations.is_empty() {
            None
        } else {
            Some(locations)
        };
        self
    }

    pub fn with_entities(mut self, entities: BTreeMap<String, u32>) -> Self {
        self.entities = if entities.is_empty() {
            None
        } else {
            Some(entities)
        };
        self
    }

    /// Serializes payload and role maps into the sink's row form.
    pub fn to_record(&self, session_id: &str) -> serde_json::Result<EventRecord> {
        Ok(EventRecord {
            session_id: session_id.to_string(),
            tick: self.tick,
            name: self.name.clone(),
            data: serde_json::to_string(&self.data)?,
            locations: self
                .locations
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            entities: self
                .entities
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        })
    }
}
