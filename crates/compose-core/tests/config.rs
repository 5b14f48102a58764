use kicker_compose_core::{
    ComposeValue, Composer, ComposerConfig, ConfigError, DEFAULT_PLACEHOLDER_LABEL, encode,
};

#[test]
fn defaults_fill_missing_fields() {
    let config = ComposerConfig::from_json_str(r#"{ "placeholder_label": "Loading..." }"#).unwrap();
    assert_eq!(config.placeholder_label, "Loading...");
    assert_eq!(config.max_undo, 200);
    assert_eq!(config.mention_result_limit, 8);

    let config = ComposerConfig::from_json_str(r#"{ "placeholder_label": "", "max_undo": 0 }"#)
        .unwrap();
    assert_eq!(config.placeholder_label, DEFAULT_PLACEHOLDER_LABEL);
    assert_eq!(config.max_undo, 200);
}

#[test]
fn invalid_patterns_are_rejected() {
    let err = ComposerConfig::from_json_str(r#"{ "match_url_pattern": "(" }"#).unwrap_err();
    assert!(matches!(err, ConfigError::MatchUrlPattern(_)));

    let config = ComposerConfig {
        match_url_pattern: r"/m/([0-9]+)".to_string(),
        ..ComposerConfig::default()
    };
    assert!(matches!(
        Composer::new(config),
        Err(ConfigError::MissingIdGroup)
    ));

    let err = ComposerConfig::from_json_str("not json").unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}

#[test]
fn snapshot_round_trips_through_json() {
    let composer = Composer::with_value("hi @[Anna](42)\n[gif:g]");
    let value = composer.snapshot();
    assert_eq!(value.canonical(), "hi @[Anna](42)\n[gif:g]");

    let json = value.to_json_pretty().unwrap();
    let parsed = ComposeValue::from_json_str(&json).unwrap();
    assert_eq!(parsed, value);
    assert_eq!(parsed.schema, "kicker-compose");
    assert_eq!(parsed.into_document(), encode("hi @[Anna](42)\n[gif:g]"));
}

#[test]
fn snapshot_tree_wins_over_stale_canonical() {
    let parsed = ComposeValue::from_json_str(
        r#"{ "canonical": "stale", "document": { "children": [ { "node": "text", "text": "x" }, { "node": "chip", "kind": "everyone" } ] } }"#,
    )
    .unwrap();
    assert_eq!(parsed.version, 1);
    assert_eq!(parsed.canonical(), "x@everyone");
}

#[test]
fn snapshot_from_canonical_only() {
    let parsed = ComposeValue::from_json_str(r#"{ "canonical": "gg #[Match #1](1)" }"#).unwrap();
    assert_eq!(parsed.document().chips().count(), 1);
    assert_eq!(parsed, ComposeValue::from_canonical("gg #[Match #1](1)"));
}
