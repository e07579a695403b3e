use super::*;
use crate::coords::{self, Vector3};
use crate::entity::Entity;
use crate::value::PropValue;

fn hero_at(cells: [i64; 3], fractions: [f64; 3]) -> Entity {
    let mut entity = Entity::new(7, "CDOTA_Unit_Hero_Axe");
    for (name, cell) in [coords::CELL_X, coords::CELL_Y, coords::CELL_Z]
        .iter()
        .zip(cells)
    {
        entity.properties.insert(name.to_string(), PropValue::Int(cell));
    }
    for (name, frac) in [coords::VEC_X, coords::VEC_Y, coords::VEC_Z]
        .iter()
        .zip(fractions)
    {
        entity.properties.insert(name.to_string(), PropValue::Float(frac));
    }
    entity
}

#[test]
fn test_first_observation_is_forwarded() {
    let mut detector = ChangeDetector::default();
    detector.track(1);
    assert!(detector.observe(1, "m_iHealth", &PropValue::Int(600)));
}

#[test]
fn test_unchanged_value_is_suppressed() {
    let mut detector = ChangeDetector::default();
    detector.track(1);

    assert!(detector.observe(1, "m_iHealth", &PropValue::Int(600)));
    assert!(!detector.observe(1, "m_iHealth", &PropValue::Int(600)));
    assert!(detector.observe(1, "m_iHealth", &PropValue::Int(580)));
    assert!(!detector.observe(1, "m_iHealth", &PropValue::Int(580)));
    // flipping back is a distinct change
    assert!(detector.observe(1, "m_iHealth", &PropValue::Int(600)));
}

#[test]
fn test_snapshots_are_per_entity() {
    let mut detector = ChangeDetector::default();
    assert!(detector.observe(1, "m_iTeamNum", &PropValue::Int(2)));
    assert!(detector.observe(2, "m_iTeamNum", &PropValue::Int(2)));
    assert_eq!(detector.tracked_entities(), 2);
}

#[test]
fn test_ignored_properties_never_forwarded() {
    let mut detector = ChangeDetector::default();
    detector.track(1);

    for name in DEFAULT_IGNORED_PROPERTIES {
        for tick in 0..5 {
            assert!(!detector.observe(1, name, &PropValue::Int(tick)));
        }
    }
}

#[test]
fn test_extra_ignored_properties() {
    let mut detector = ChangeDetector::new(["m_flStartSequenceCycle"]);
    assert!(!detector.observe(1, "m_flStartSequenceCycle", &PropValue::Float(0.1)));
    assert!(!detector.observe(1, "m_anglediff", &PropValue::Int(3)));
    assert!(detector.observe(1, "m_iHealth", &PropValue::Int(3)));
}

#[test]
fn test_forget_resets_snapshot() {
    let mut detector = ChangeDetector::default();
    detector.track(4);
    assert!(detector.observe(4, "m_iHealth", &PropValue::Int(10)));

    detector.forget(4);
    assert_eq!(detector.tracked_entities(), 0);

    // a re-created entity on the same index starts fresh
    detector.track(4);
    assert!(detector.observe(4, "m_iHealth", &PropValue::Int(10)));
}

#[test]
fn test_transform_passes_plain_properties_through() {
    let entity = Entity::new(3, "CDOTA_Unit_Courier");
    let (name, value) = transform(&entity, "m_iHealth", &PropValue::Int(5)).unwrap();
    assert_eq!(name, "m_iHealth");
    assert_eq!(value, PropValue::Int(5));
}

#[test]
fn test_transform_collapses_coordinates_to_position() {
    let entity = hero_at([128, 128, 128], [10.0, 20.0, 0.0]);

    for component in coords::COORDINATE_PROPERTIES {
        // the incoming value is ignored in favour of the entity's full state
        let (name, value) = transform(&entity, component, &PropValue::Int(0)).unwrap();
        assert_eq!(name, POSITION_PROPERTY);
        assert_eq!(value, PropValue::Position(Vector3::new(10.0, 20.0, 0.0)));
    }
}

#[test]
fn test_transform_missing_component() {
    let mut entity = hero_at([128, 128, 128], [1.0, 2.0, 3.0]);
    entity.properties.remove(coords::VEC_Z);

    let err = transform(&entity, coords::CELL_X, &PropValue::Int(128)).unwrap_err();
    assert_eq!(err, PositionError::MissingComponent(coords::VEC_Z));
    assert!(err.to_string().contains("m_vecZ"));
}

#[test]
fn test_position_of_rejects_wrong_type() {
    let mut entity = hero_at([128, 128, 128], [1.0, 2.0, 3.0]);
    entity
        .properties
        .insert(coords::CELL_Y.to_string(), PropValue::String("128".into()));

    assert_eq!(
        position_of(&entity),
        Err(PositionError::InvalidComponent(coords::CELL_Y))
    );
}
