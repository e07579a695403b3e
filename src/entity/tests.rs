use super::*;

fn props(pairs: &[(&str, PropValue)]) -> HashMap<String, PropValue> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_create_then_update_merges_properties() {
    let mut world = World::new();

    world.apply(
        EntityEventKind::Create,
        7,
        "CDOTA_Unit_Hero_Axe",
        props(&[("m_iHealth", PropValue::Int(600)), ("m_iTeamNum", PropValue::Int(2))]),
    );
    let entity = world
        .apply(
            EntityEventKind::Update,
            7,
            "CDOTA_Unit_Hero_Axe",
            props(&[("m_iHealth", PropValue::Int(540))]),
        )
        .unwrap();

    assert_eq!(entity.get("m_iHealth"), Some(&PropValue::Int(540)));
    assert_eq!(entity.get("m_iTeamNum"), Some(&PropValue::Int(2)));
    assert_eq!(world.len(), 1);
}

#[test]
fn test_create_replaces_reused_index() {
    let mut world = World::new();

    world.apply(
        EntityEventKind::Create,
        3,
        "CDOTA_BaseNPC_Creep_Lane",
        props(&[("m_iHealth", PropValue::Int(550))]),
    );
    world.apply(EntityEventKind::Delete, 3, "CDOTA_BaseNPC_Creep_Lane", HashMap::new());
    world.apply(
        EntityEventKind::Create,
        3,
        "CDOTA_Unit_Courier",
        props(&[("m_iTeamNum", PropValue::Int(3))]),
    );

    let entity = world.get(3).unwrap();
    assert_eq!(entity.class_name, "CDOTA_Unit_Courier");
    assert!(entity.get("m_iHealth").is_none());
}

#[test]
fn test_update_without_create_inserts() {
    let mut world = World::new();
    let entity = world
        .apply(
            EntityEventKind::Update,
            12,
            "CDOTAPlayer",
            props(&[("m_iPlayerID", PropValue::Int(0))]),
        )
        .unwrap();

    assert_eq!(entity.index, 12);
    assert!(world.get(12).is_some());
}

#[test]
fn test_delete_returns_final_state() {
    let mut world = World::new();
    world.apply(
        EntityEventKind::Create,
        5,
        "CDOTA_Unit_Hero_Lina",
        props(&[("m_iHealth", PropValue::Int(1))]),
    );

    let removed = world
        .apply(EntityEventKind::Delete, 5, "CDOTA_Unit_Hero_Lina", HashMap::new())
        .unwrap();
    assert_eq!(removed.get("m_iHealth"), Some(&PropValue::Int(1)));
    assert!(world.is_empty());

    assert!(world
        .apply(EntityEventKind::Delete, 5, "CDOTA_Unit_Hero_Lina", HashMap::new())
        .is_none());
}
