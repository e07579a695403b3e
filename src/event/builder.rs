use super::EventRow;
use crate::changes::position_of;
use crate::coords::Vector3;
use crate::correlate::{find_pawn, HeroMap};
use crate::entity::World;
use crate::messages::{ChatEvent, CombatLogEntry};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Resolves player ids in protocol messages to pawn and hero entities.
pub struct RoleResolver<'a> {
    pub world: &'a World,
    pub heroes: &'a HeroMap,
    pub player_id_property: &'a str,
}

impl<'a> RoleResolver<'a> {
    pub fn new(world: &'a World, heroes: &'a HeroMap, player_id_property: &'a str) -> Self {
        Self {
            world,
            heroes,
            player_id_property,
        }
    }

    fn pawn(&self, tick: u32, slot: u32) -> Option<u32> {
        match find_pawn(self.world, self.player_id_property, slot) {
            Ok(pawn) => Some(pawn.index),
            Err(e) => {
                warn!(tick = tick, error = %e, "Unable to resolve player entity");
                None
            }
        }
    }

    /// Current world position of `hero`, if it can be reconstructed.
    fn hero_position(&self, tick: u32, hero: u32) -> Option<Vector3> {
        let entity = match self.world.get(hero) {
            Some(e) => e,
            None => {
                warn!(tick = tick, entity = hero, "Hero entity no longer exists");
                return None;
            }
        };
        match position_of(entity) {
            Ok(position) => Some(position),
            Err(e) => {
                warn!(tick = tick, entity = hero, error = %e, "Hero position unavailable");
                None
            }
        }
    }

    /// Builds the row for a chat event.
    ///
    /// Each present player id (other than -1) contributes `player N` and
    /// `hero N` entity roles and a `hero N` location role, as far as they
    /// resolve.
    pub fn chat_event(&self, tick: u32, event: &ChatEvent) -> serde_json::Result<EventRow> {
        let mut locations = BTreeMap::new();
        let mut entities = BTreeMap::new();

        for (suffix, player_id) in event.player_ids() {
            let slot = match player_id.and_then(|id| u32::try_from(id).ok()) {
                Some(s) => s,
                None => continue,
            };

            if let Some(pawn) = self.pawn(tick, slot) {
                entities.insert(format!("player {}", suffix), pawn);
            }

            match self.heroes.hero_of(slot) {
                Some(hero) => {
                    entities.insert(format!("hero {}", suffix), hero);
                    if let Some(position) = self.hero_position(tick, hero) {
                        locations.insert(format!("hero {}", suffix), position);
                    }
                }
                None => debug!(tick = tick, slot = slot, "Chat event player has no hero"),
            }
        }

        Ok(
            EventRow::new(tick, event.kind.to_lowercase(), serde_json::to_value(event)?)
                .with_locations(locations)
                .with_entities(entities),
        )
    }

    /// Builds the row for a combat log entry.
    ///
    /// `event` location comes from the entry's own x/y; `event_location`
    /// names a player whose pawn and hero position are attached.
    pub fn combat_log_event(
        &self,
        tick: u32,
        entry: &CombatLogEntry,
    ) -> serde_json::Result<EventRow> {
        let mut locations = BTreeMap::new();
        let mut entities = BTreeMap::new();

        if let (Some(x), Some(y)) = (entry.location_x, entry.location_y) {
            locations.insert("event".to_string(), Vector3::new(x, y, 0.0));
        }

        if let Some(slot) = entry.event_location {
            if let Some(pawn) = self.pawn(tick, slot) {
                entities.insert("player".to_string(), pawn);
            }

            match self.heroes.hero_of(slot) {
                Some(hero) => {
                    if let Some(position) = self.hero_position(tick, hero) {
                        locations.insert("hero".to_string(), position);
                    }
                }
                None => debug!(tick = tick, slot = slot, "Combat log player has no hero"),
            }
        }

        Ok(
            EventRow::new(tick, entry.kind.to_lowercase(), serde_json::to_value(entry)?)
                .with_locations(locations)
                .with_entities(entities),
        )
    }
}
