use kicker_compose_core::{Chip, Document, Node, decode, encode};

#[test]
fn plain_text_stays_one_text_node() {
    let doc = encode("hello there");
    assert_eq!(doc.children, vec![Node::text("hello there")]);
    assert_eq!(decode(&doc), "hello there");
}

#[test]
fn every_token_kind_becomes_a_chip() {
    let canonical = "hi @[Anna](42) @everyone see #[Match #7: A vs B](7) [gif:https://g.example/x.gif][img:https://c.example/a.png]";
    let doc = encode(canonical);
    assert_eq!(
        doc.children,
        vec![
            Node::text("hi "),
            Node::Chip(Chip::mention("42", "Anna")),
            Node::text(" "),
            Node::Chip(Chip::Everyone),
            Node::text(" see "),
            Node::Chip(Chip::match_link("7", "Match #7: A vs B")),
            Node::text(" "),
            Node::Chip(Chip::gif("https://g.example/x.gif")),
            Node::Chip(Chip::image("https://c.example/a.png")),
        ]
    );
    assert_eq!(decode(&doc), canonical);
}

#[test]
fn newlines_become_line_breaks() {
    let doc = encode("a\n\nb");
    assert_eq!(
        doc.children,
        vec![
            Node::text("a"),
            Node::LineBreak,
            Node::LineBreak,
            Node::text("b")
        ]
    );
    assert_eq!(decode(&doc), "a\n\nb");
}

#[test]
fn malformed_tokens_stay_literal() {
    for canonical in [
        "@[Anna](4x2)",
        "@[Anna]42",
        "@[](42)",
        "#[Match](abc)",
        "[gif:]",
        "[img:has space]",
        "@[Anna\nB](1)",
        "@every one",
    ] {
        let doc = encode(canonical);
        assert_eq!(doc.chips().count(), 0, "{canonical}");
        assert_eq!(decode(&doc), canonical);
    }
}

#[test]
fn everyone_wins_over_later_passes() {
    let doc = encode("#[@everyone fans](3)");
    assert!(doc.chips().any(|(_, chip)| *chip == Chip::Everyone));
    assert!(
        !doc.chips()
            .any(|(_, chip)| matches!(chip, Chip::MatchLink { .. }))
    );
    assert_eq!(decode(&doc), "#[@everyone fans](3)");
}

#[test]
fn decode_concatenates_tokens_not_labels() {
    let doc = Document::new(vec![
        Node::Chip(Chip::mention("1", "Bo")),
        Node::LineBreak,
        Node::text("ok"),
    ]);
    assert_eq!(doc.to_canonical(), "@[Bo](1)\nok");
    assert_eq!(Document::from_canonical("@[Bo](1)\nok"), doc);
}

#[test]
fn round_trip_is_lossless_for_mixed_content() {
    let canonical = "Tor! 😀 @[Jürgen](9)\n#[Lade...](55) und [img:a][img:b]";
    assert_eq!(decode(&encode(canonical)), canonical);
}
