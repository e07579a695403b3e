//! Player slot to hero correlation.
//!
//! The player-resource singleton carries one selected-hero handle per
//! player slot. Handles encode an entity-table index in their low bits.

use crate::entity::{Entity, World};
use crate::value::PropValue;
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_MAX_PLAYERS: u32 = 64;
pub const DEFAULT_HANDLE_INDEX_BITS: u32 = 14;

/// Correlation failures: a reference points at an entity that is not there
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationError {
    /// A selected-hero handle names an index with no live entity
    DanglingHeroHandle { slot: u32, index: u32 },
    /// No live entity carries this player id
    MissingPawn { slot: u32 },
}

impl fmt::Display for CorrelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationError::DanglingHeroHandle { slot, index } => write!(
                f,
                "player {} selected hero handle points at missing entity {}",
                slot, index
            ),
            CorrelationError::MissingPawn { slot } => {
                write!(f, "no player entity found for player id {}", slot)
            }
        }
    }
}

impl std::error::Error for CorrelationError {}

pub fn selected_hero_property(slot: u32) -> String {
    format!("m_vecPlayerTeamData.{:04}.m_hSelectedHero", slot)
}

/// Player slot -> hero entity index.
///
/// Slots are only ever overwritten. A slot with no selected hero this tick
/// keeps whatever hero it mapped to before.
#[derive(Debug, Clone)]
pub struct HeroMap {
    heroes: BTreeMap<u32, u32>,
    max_players: u32,
    index_mask: u32,
}

impl HeroMap {
    pub fn new(max_players: u32, handle_index_bits: u32) -> Self {
        let index_mask = match handle_index_bits {
            0 => 0,
            bits if bits >= 32 => u32::MAX,
            bits => (1u32 << bits) - 1,
        };
        Self {
            heroes: BTreeMap::new(),
            max_players,
            index_mask,
        }
    }

    /// Entity index a handle refers to; `None` for the "no hero" sentinel.
    pub fn handle_index(&self, handle: u32) -> Option<u32> {
        let index = handle & self.index_mask;
        if index == self.index_mask {
            None
        } else {
            Some(index)
        }
    }

    /// Re-reads every slot's selected-hero handle from `resource`.
    ///
    /// Slots without a handle or with the sentinel are left alone. Handles
    /// pointing at entities missing from `world` are skipped and reported.
    pub fn refresh(&mut self, world: &World, resource: &Entity) -> Vec<CorrelationError> {
        let mut errors = Vec::new();

        for slot in 0..self.max_players {
            let handle = match resource
                .get(&selected_hero_property(slot))
                .and_then(PropValue::as_u32)
            {
                Some(h) => h,
                None => continue,
            };

            let index = match self.handle_index(handle) {
                Some(i) => i,
                None => continue,
            };

            if world.get(index).is_none() {
                errors.push(CorrelationError::DanglingHeroHandle { slot, index });
                continue;
            }

            self.heroes.insert(slot, index);
        }

        errors
    }

    pub fn hero_of(&self, slot: u32) -> Option<u32> {
        self.heroes.get(&slot).copied()
    }

    /// Player slot controlling `index`; lowest slot wins if several match.
    pub fn slot_of(&self, index: u32) -> Option<u32> {
        self.heroes
            .iter()
            .find(|&(_, &hero)| hero == index)
            .map(|(&slot, _)| slot)
    }

    pub fn len(&self) -> usize {
        self.heroes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heroes.is_empty()
    }
}

impl Default for HeroMap {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PLAYERS, DEFAULT_HANDLE_INDEX_BITS)
    }
}

/// Finds the entity whose `property` equals `needle`. Linear scan, uncached.
pub fn find_by_property<'w>(world: &'w World, property: &str, needle: &PropValue) -> Option<&'w Entity> {
    world.iter().find(|e| e.get(property) == Some(needle))
}

/// The player pawn entity for `slot`.
pub fn find_pawn<'w>(
    world: &'w World,
    player_id_property: &str,
    slot: u32,
) -> Result<&'w Entity, CorrelationError> {
    find_by_property(world, player_id_property, &PropValue::Int(slot as i64))
        .ok_or(CorrelationError::MissingPawn { slot })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: i64 = (1 << 14) - 1;

    fn resource(handles: &[(u32, i64)]) -> Entity {
        let mut entity = Entity::new(1, "CDOTA_PlayerResource");
        for &(slot, handle) in handles {
            entity
                .properties
                .insert(selected_hero_property(slot), PropValue::Int(handle));
        }
        entity
    }

    fn world_with(indices: &[u32]) -> World {
        let mut world = World::new();
        for &index in indices {
            world.insert(Entity::new(index, "CDOTA_Unit_Hero_Axe"));
        }
        world
    }

    #[test]
    fn test_property_name_format() {
        assert_eq!(
            selected_hero_property(3),
            "m_vecPlayerTeamData.0003.m_hSelectedHero"
        );
    }

    #[test]
    fn test_handle_low_bits_select_index() {
        let map = HeroMap::default();
        // serial number bits above the index are ignored
        assert_eq!(map.handle_index((5 << 14) | 300), Some(300));
        assert_eq!(map.handle_index(SENTINEL as u32), None);
        assert_eq!(map.handle_index(u32::MAX), None);
    }

    #[test]
    fn test_refresh_maps_slots() {
        let world = world_with(&[300, 301]);
        let mut map = HeroMap::default();

        let errors = map.refresh(&world, &resource(&[(0, 300), (1, (2 << 14) | 301)]));
        assert!(errors.is_empty());
        assert_eq!(map.hero_of(0), Some(300));
        assert_eq!(map.hero_of(1), Some(301));
        assert_eq!(map.slot_of(301), Some(1));
        assert_eq!(map.slot_of(999), None);
    }

    #[test]
    fn test_sentinel_keeps_last_known_hero() {
        let world = world_with(&[300]);
        let mut map = HeroMap::default();

        map.refresh(&world, &resource(&[(4, 300)]));
        map.refresh(&world, &resource(&[(4, SENTINEL)]));
        assert_eq!(map.hero_of(4), Some(300));

        // a slot missing from the resource is kept as well
        map.refresh(&world, &resource(&[]));
        assert_eq!(map.hero_of(4), Some(300));
    }

    #[test]
    fn test_dangling_handle_is_reported_and_skipped() {
        let world = world_with(&[300]);
        let mut map = HeroMap::default();

        let errors = map.refresh(&world, &resource(&[(0, 300), (1, 777)]));
        assert_eq!(
            errors,
            vec![CorrelationError::DanglingHeroHandle { slot: 1, index: 777 }]
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.hero_of(1), None);
    }

    #[test]
    fn test_slots_beyond_max_players_ignored() {
        let world = world_with(&[300]);
        let mut map = HeroMap::new(2, 14);
        map.refresh(&world, &resource(&[(5, 300)]));
        assert!(map.is_empty());
    }

    #[test]
    fn test_find_pawn_by_player_id() {
        let mut world = World::new();
        let mut pawn = Entity::new(12, "CDOTAPlayer");
        pawn.properties
            .insert("m_iPlayerID".to_string(), PropValue::Int(3));
        world.insert(pawn);

        assert_eq!(find_pawn(&world, "m_iPlayerID", 3).unwrap().index, 12);
        assert_eq!(
            find_pawn(&world, "m_iPlayerID", 4).unwrap_err(),
            CorrelationError::MissingPawn { slot: 4 }
        );
    }
}
