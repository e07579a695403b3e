use super::{EventRow, HERO_MOVE};
use crate::buffer::EntityPropMap;
use crate::changes::POSITION_PROPERTY;
use crate::correlate::{find_pawn, HeroMap};
use crate::entity::World;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::warn;

/// Emits one `hero_move` per tracked hero with a buffered position.
///
/// Must see the cache before it is drained. The event carries the tick of
/// the buffered update, not the flush tick. Order follows the cache's
/// iteration order and is not meaningful.
pub fn synthesize_hero_moves(
    updates: &EntityPropMap,
    heroes: &HeroMap,
    world: &World,
    player_id_property: &str,
) -> Vec<EventRow> {
    let mut rows = Vec::new();

    for (&index, props) in updates {
        let update = match props.get(POSITION_PROPERTY) {
            Some(u) => u,
            None => continue,
        };

        let slot = match heroes.slot_of(index) {
            Some(s) => s,
            None => continue,
        };

        let pawn = match find_pawn(world, player_id_property, slot) {
            Ok(p) => p.index,
            Err(e) => {
                warn!(entity = index, tick = update.tick, error = %e, "Skipping hero_move");
                continue;
            }
        };

        let position = match update.value.as_position() {
            Some(p) => p,
            None => {
                warn!(entity = index, tick = update.tick, "Buffered position has no position value");
                continue;
            }
        };

        rows.push(
            EventRow::new(update.tick, HERO_MOVE, json!({ "playerid": slot }))
                .with_locations(BTreeMap::from([("hero".to_string(), position)]))
                .with_entities(BTreeMap::from([
                    ("hero".to_string(), index),
                    ("player".to_string(), pawn),
                ])),
        );
    }

    rows
}
