use wayfarer_core::{
    AreaId, ChestMode, NavConfig, Position, Timings, TransitionStrategy, TransitionTable,
};

#[test]
fn shipped_transition_table_parses() {
    let table = TransitionTable::from_json(include_str!("../assets/transitions.json")).unwrap();
    assert_eq!(&table, TransitionTable::default_table());
    assert!(!table.rules.is_empty());

    for rule in &table.rules {
        assert_ne!(rule.from, rule.to, "self-transition {rule:?}");
        if let Some(distance) = rule.finish_distance {
            assert!(distance > 0, "non-positive finish distance in {rule:?}");
        }
    }
}

#[test]
fn shipped_table_has_no_duplicate_pairs() {
    let table = TransitionTable::default_table();
    for (i, rule) in table.rules.iter().enumerate() {
        let duplicate = table.rules[i + 1..]
            .iter()
            .any(|other| other.from == rule.from && other.to == rule.to);
        assert!(!duplicate, "duplicate rule {} -> {}", rule.from, rule.to);
    }
}

#[test]
fn shipped_table_covers_the_special_cases() {
    let table = TransitionTable::default_table();
    assert_eq!(
        table.strategy(AreaId(54), AreaId(74)),
        Some(&TransitionStrategy::Portal {
            code: 298,
            activator: None
        })
    );
    assert_eq!(
        table.strategy(AreaId(74), AreaId(46)),
        Some(&TransitionStrategy::Portal {
            code: 60,
            activator: Some(357)
        })
    );
    assert!(matches!(
        table.strategy(AreaId(40), AreaId(41)),
        Some(TransitionStrategy::ProbePath { .. })
    ));
    assert_eq!(
        table.strategy(AreaId(7), AreaId(26)),
        Some(&TransitionStrategy::StaticTarget {
            position: Position::new(15139, 5056)
        })
    );
    assert_eq!(table.finish_distance(AreaId(40), AreaId(50)), Some(7));
    assert_eq!(table.finish_distance(AreaId(1), AreaId(2)), None);
}

#[test]
fn config_json_uses_defaults_for_missing_fields() {
    let config = NavConfig::from_json(r#"{ "chest_mode": "super_only" }"#).unwrap();
    assert_eq!(config.chest_mode, ChestMode::SuperOnly);
    assert_eq!(config.chicken_percent, NavConfig::default().chicken_percent);
    assert_eq!(config.timings, Timings::default());
}

#[test]
fn config_round_trips_through_json() {
    let config = NavConfig {
        chicken_percent: 0,
        interact_with_shrines: false,
        timings: Timings::instant(),
        ..NavConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(NavConfig::from_json(&json).unwrap(), config);
}

#[test]
fn conflicting_area_roles_are_rejected() {
    let err = NavConfig::from_json(r#"{ "teleport_pad_areas": [9], "no_shrine_areas": [9] }"#)
        .unwrap_err();
    assert!(err.to_string().contains('9'), "{err}");
}
