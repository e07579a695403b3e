//! Live entity table mirrored from the replay stream.

use crate::value::PropValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(test)]
mod tests;

/// Lifecycle notification kind delivered by the producer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityEventKind {
    Create,
    Update,
    Delete,
}

/// A replay entity with its complete current property store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity-table index (reused once the entity is destroyed)
    pub index: u32,

    /// Network class name (e.g. "CDOTA_Unit_Hero_Axe")
    pub class_name: String,

    /// Key-value properties
    pub properties: HashMap<String, PropValue>,
}

impl Entity {
    pub fn new(index: u32, class_name: impl Into<String>) -> Self {
        Self {
            index,
            class_name: class_name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn get(&self, property: &str) -> Option<&PropValue> {
        self.properties.get(property)
    }
}

/// All entities currently alive in the replay, keyed by index.
#[derive(Debug, Default)]
pub struct World {
    entities: HashMap<u32, Entity>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one notification and returns the entity as the pipeline should
    /// see it.
    ///
    /// `Create` replaces whatever occupied the index before. `Update` merges
    /// `changed` into the existing store (creating the entity if the producer
    /// skipped the create). `Delete` removes the entity and returns its final
    /// state.
    pub fn apply(
        &mut self,
        kind: EntityEventKind,
        index: u32,
        class_name: &str,
        changed: HashMap<String, PropValue>,
    ) -> Option<Entity> {
        match kind {
            EntityEventKind::Create => {
                let mut entity = Entity::new(index, class_name);
                entity.properties = changed;
                self.entities.insert(index, entity.clone());
                Some(entity)
            }
            EntityEventKind::Update => {
                let entity = self
                    .entities
                    .entry(index)
                    .or_insert_with(|| Entity::new(index, class_name));
                entity.properties.extend(changed);
                Some(entity.clone())
            }
            EntityEventKind::Delete => self.entities.remove(&index),
        }
    }

    pub fn get(&self, index: u32) -> Option<&Entity> {
        self.entities.get(&index)
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.index, entity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
