use kicker_compose_core::{
    Chip, CommandRegistry, CommandSpec, Composer, EditStatus, MentionTarget, Node, Player, encode,
};

#[test]
fn insert_mention_into_empty_composer() {
    let mut composer = Composer::with_defaults();
    let status = composer.insert_mention(&MentionTarget::Player(Player::new("42", "Anna")));
    assert_eq!(status, EditStatus::Applied);
    assert_eq!(composer.value(), "@[Anna](42) ");
    assert_eq!(composer.cursor(), 12);
}

#[test]
fn insert_mention_replaces_the_open_search() {
    let mut composer = Composer::with_defaults();
    composer.insert_text("hello @an");
    composer.insert_mention(&MentionTarget::Player(Player::new("42", "Anna")));
    assert_eq!(composer.value(), "hello @[Anna](42) ");
    assert_eq!(composer.cursor(), 18);
    assert_eq!(composer.trigger(), None);
}

#[test]
fn insert_everyone_mention() {
    let mut composer = Composer::with_value("hey @ev");
    composer.insert_mention(&MentionTarget::Everyone);
    assert_eq!(composer.value(), "hey @everyone ");
    assert_eq!(composer.doc().children[1], Node::Chip(Chip::Everyone));
}

#[test]
fn insert_match_replaces_the_open_search() {
    let mut composer = Composer::with_value("see #mu");
    composer.insert_match("77", "Match #77: A vs B");
    assert_eq!(composer.value(), "see #[Match #77: A vs B](77) ");
    assert_eq!(composer.cursor(), composer.value().len());
}

#[test]
fn mention_without_trigger_goes_at_the_caret() {
    let mut composer = Composer::with_value("ab");
    composer.set_cursor(1);
    composer.insert_mention(&MentionTarget::Player(Player::new("5", "Li")));
    assert_eq!(composer.value(), "a@[Li](5) b");
    assert_eq!(composer.cursor(), 10);
}

#[test]
fn replace_match_placeholder_updates_the_display() {
    let mut composer = Composer::with_value("check #[Lade...](77)");
    composer.set_cursor(3);
    let status = composer.replace_match_placeholder("77", "Match #77: A vs B");
    assert_eq!(status, EditStatus::Applied);
    assert_eq!(composer.value(), "check #[Match #77: A vs B](77)");
    assert_eq!(composer.cursor(), 3);
}

#[test]
fn replace_match_placeholder_without_placeholder_is_a_no_op() {
    let mut composer = Composer::with_value("check #[Match #77: A vs B](77)");
    assert_eq!(
        composer.replace_match_placeholder("77", "Other"),
        EditStatus::Unchanged
    );
    assert_eq!(
        composer.replace_match_placeholder("78", "Other"),
        EditStatus::Unchanged
    );
    assert_eq!(composer.value(), "check #[Match #77: A vs B](77)");
}

#[test]
fn second_gif_replaces_the_first() {
    let mut composer = Composer::with_value("hi [gif:a]");
    composer.set_cursor(0);
    composer.insert_gif("b");
    assert_eq!(composer.value(), "hi [gif:b]");
    assert_eq!(composer.cursor(), composer.doc().canonical_len());
    let gifs = composer
        .doc()
        .chips()
        .filter(|(_, chip)| matches!(chip, Chip::Gif { .. }))
        .count();
    assert_eq!(gifs, 1);
}

#[test]
fn images_accumulate() {
    let mut composer = Composer::with_value("look");
    composer.insert_image("a.png");
    composer.insert_image("b.png");
    assert_eq!(composer.value(), "look[img:a.png][img:b.png]");
}

#[test]
fn plain_text_keeps_token_syntax_literal() {
    let mut composer = Composer::with_defaults();
    composer.insert_plain_text("@[Anna](42)");
    assert_eq!(composer.doc().chips().count(), 0);
    assert_eq!(composer.value(), "@[Anna](42)");
}

#[test]
fn registry_runs_commands_by_id() {
    let registry = CommandRegistry::core();
    let mut composer = Composer::with_defaults();

    composer
        .run_command(
            &registry,
            "mention.insert",
            Some(serde_json::json!({ "id": 42, "name": "Anna" })),
        )
        .unwrap();
    composer
        .run_command(
            &registry,
            "text.insert",
            Some(serde_json::json!({ "text": "⚽" })),
        )
        .unwrap();
    composer
        .run_command(
            &registry,
            "gif.insert",
            Some(serde_json::json!({ "url": "g.gif" })),
        )
        .unwrap();
    assert_eq!(composer.value(), "@[Anna](42) ⚽[gif:g.gif]");

    let status = composer
        .run_command(&registry, "history.undo", None)
        .unwrap();
    assert_eq!(status, EditStatus::Applied);
    assert_eq!(composer.value(), "@[Anna](42) ⚽");
}

#[test]
fn registry_rejects_unknown_ids_and_bad_args() {
    let registry = CommandRegistry::core();
    let mut composer = Composer::with_defaults();

    let err = composer.run_command(&registry, "nope", None).unwrap_err();
    assert_eq!(err.message(), "Unknown command: nope");

    assert!(
        composer
            .run_command(
                &registry,
                "match.insert",
                Some(serde_json::json!({ "id": "7a", "display": "x" })),
            )
            .is_err()
    );
    assert!(
        composer
            .run_command(&registry, "gif.insert", Some(serde_json::json!({})))
            .is_err()
    );
    assert_eq!(composer.value(), "");
}

#[test]
fn registry_rejects_duplicate_ids() {
    let mut registry = CommandRegistry::core();
    let err = registry
        .register(CommandSpec::new("history.undo", "Undo", |composer, _| {
            Ok(composer.undo())
        }))
        .unwrap_err();
    assert!(err.contains("history.undo"));
}

#[test]
fn command_list_hides_hidden_commands() {
    let registry = CommandRegistry::core();
    let ids: Vec<&str> = registry
        .command_list()
        .into_iter()
        .map(|spec| spec.id.as_str())
        .collect();
    assert!(ids.contains(&"mention.insert"));
    assert!(!ids.contains(&"match.replace_placeholder"));
    assert!(registry.command("match.replace_placeholder").is_some());
}

#[test]
fn inserted_chips_survive_a_reload() {
    let mut composer = Composer::with_defaults();
    composer.insert_mention(&MentionTarget::Player(Player::new("42", "Anna")));
    composer.insert_mention(&MentionTarget::Everyone);
    composer.insert_match("7", "Match #7: A (B) vs C");
    composer.insert_gif("https://g.example/x.gif");
    composer.insert_image("https://c.example/a.png");
    assert_eq!(composer.doc().chips().count(), 5);
    assert_eq!(encode(&composer.value()), *composer.doc());
}

#[test]
fn chips_that_would_not_reload_are_refused() {
    let mut composer = Composer::with_value("hi ");

    let refused = [
        composer.insert_mention(&MentionTarget::Player(Player::new("a1b2-c3", "Anna"))),
        composer.insert_mention(&MentionTarget::Player(Player::new("42", "An]na"))),
        composer.insert_mention(&MentionTarget::Player(Player::new("42", "@everyone fan"))),
        composer.insert_match("7", "Final [Cup]"),
        composer.insert_match("", "Final"),
        composer.insert_match("7", "line\nbreak"),
        composer.insert_gif("https://g.example/a b.gif"),
        composer.insert_gif(""),
        composer.insert_image("https://c.example/a].png"),
    ];

    assert!(refused.iter().all(|status| *status == EditStatus::Unchanged));
    assert_eq!(composer.value(), "hi ");
    assert!(!composer.can_undo());
    assert_eq!(encode(&composer.value()), *composer.doc());
}

#[test]
fn unreloadable_placeholder_resolution_keeps_the_placeholder() {
    let mut composer = Composer::with_value("#[Lade...](55)");
    let status = composer.replace_match_placeholder("55", "Cup ]final");
    assert_eq!(status, EditStatus::Unchanged);
    assert_eq!(composer.value(), "#[Lade...](55)");
}

#[test]
fn registry_refuses_unreloadable_urls() {
    let registry = CommandRegistry::core();
    let mut composer = Composer::with_defaults();
    let status = composer
        .run_command(
            &registry,
            "gif.insert",
            Some(serde_json::json!({ "url": "https://g.example/a b.gif" })),
        )
        .expect("gif.insert accepts a url");
    assert_eq!(status, EditStatus::Unchanged);
    assert_eq!(composer.value(), "");
}
