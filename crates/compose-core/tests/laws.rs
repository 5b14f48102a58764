use kicker_compose_core::{
    Chip, Composer, Document, EditStatus, MentionTarget, Node, Player, decode, encode,
    offset_from_point, point_from_offset,
};
use proptest::prelude::*;

fn arb_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z äö⚽😀]{1,6}",
        1 => Just("\n".to_string()),
        1 => Just("@everyone".to_string()),
        2 => ("[A-Za-z ]{1,8}", "[0-9]{1,4}").prop_map(|(name, id)| format!("@[{name}]({id})")),
        2 => ("[A-Za-z #:]{1,8}", "[0-9]{1,4}")
            .prop_map(|(display, id)| format!("#[{display}]({id})")),
        1 => "[a-z./:]{1,12}".prop_map(|url| format!("[gif:{url}]")),
        1 => "[a-z./:]{1,12}".prop_map(|url| format!("[img:{url}]")),
        1 => prop_oneof![
            Just("@[".to_string()),
            Just("#[".to_string()),
            Just("](".to_string()),
            Just("]".to_string()),
            Just("[gif:".to_string()),
            Just("@every".to_string()),
        ],
    ]
}

fn arb_canonical() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_fragment(), 0..8).prop_map(|parts| parts.concat())
}

/// Offsets a caret can occupy: character boundaries inside text and both
/// edges of every atomic node.
fn caret_offsets(doc: &Document) -> Vec<usize> {
    let mut out = vec![0];
    for (node, span) in doc.children.iter().zip(doc.spans()) {
        match node {
            Node::Text(t) => {
                let mut at = span.start;
                for ch in t.text.chars() {
                    at += ch.len_utf16();
                    out.push(at);
                }
            }
            _ => out.push(span.end),
        }
    }
    out
}

fn chips(doc: &Document) -> Vec<Chip> {
    doc.chips().map(|(_, chip)| chip.clone()).collect()
}

fn is_subsequence(needle: &[Chip], haystack: &[Chip]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|chip| rest.any(|other| other == chip))
}

#[derive(Debug, Clone)]
enum Action {
    Gif(String),
    Image(String),
    Text(String),
    Undo,
    Redo,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => "[a-z./:]{1,10}".prop_map(Action::Gif),
        1 => "[a-z./:]{1,10}".prop_map(Action::Image),
        1 => "[a-z ]{1,4}".prop_map(Action::Text),
        1 => Just(Action::Undo),
        1 => Just(Action::Redo),
    ]
}

#[test]
fn empty_string_is_an_empty_tree() {
    let doc = encode("");
    assert!(doc.children.is_empty());
    assert_eq!(decode(&doc), "");
    assert_eq!(offset_from_point(&doc, point_from_offset(&doc, 0)), 0);

    let mut composer = Composer::with_value("");
    assert_eq!(composer.value(), "");
    assert_eq!(composer.cursor(), 0);
    assert_eq!(composer.delete_backward(), EditStatus::Unchanged);
    assert_eq!(composer.delete_forward(), EditStatus::Unchanged);
}

proptest! {
    #[test]
    fn grammar_strings_round_trip(s in arb_canonical()) {
        prop_assert_eq!(decode(&encode(&s)), s);
    }

    #[test]
    fn arbitrary_strings_round_trip(s in any::<String>()) {
        prop_assert_eq!(decode(&encode(&s)), s);
    }

    #[test]
    fn inserted_chips_reload_or_are_refused(
        id in "[0-9a-z-]{0,6}",
        label in any::<String>(),
        url in any::<String>(),
    ) {
        let mut composer = Composer::with_defaults();
        let player = Player::new(id.as_str(), label.as_str());
        composer.insert_mention(&MentionTarget::Player(player));
        composer.insert_match(&id, &label);
        composer.insert_gif(&url);
        composer.insert_image(&url);
        prop_assert_eq!(&encode(&composer.value()), composer.doc());
    }

    #[test]
    fn caret_offsets_round_trip(s in arb_canonical()) {
        let doc = encode(&s);
        for k in caret_offsets(&doc) {
            prop_assert_eq!(offset_from_point(&doc, point_from_offset(&doc, k)), k);
        }
        for (node, span) in doc.children.iter().zip(doc.spans()) {
            if matches!(node, Node::Chip(_)) {
                for k in span.start + 1..span.end {
                    let snapped = offset_from_point(&doc, point_from_offset(&doc, k));
                    prop_assert_eq!(snapped, span.end);
                }
            }
        }
    }

    #[test]
    fn deletion_removes_one_unit_or_one_whole_chip(
        s in arb_canonical(),
        at in 0usize..64,
        forward in any::<bool>(),
    ) {
        let mut composer = Composer::with_value(&s);
        composer.set_cursor(at);
        let before_chips = chips(composer.doc());
        let before_len = composer.doc().canonical_len();

        if forward {
            composer.delete_forward();
        } else {
            composer.delete_backward();
        }

        let after_chips = chips(composer.doc());
        let removed = before_len - composer.doc().canonical_len();
        if after_chips == before_chips {
            prop_assert!(removed <= 2, "removed {} units without touching a chip", removed);
        } else {
            prop_assert_eq!(after_chips.len() + 1, before_chips.len());
            let gone = (0..before_chips.len())
                .find(|&ix| {
                    let mut rest = before_chips.clone();
                    let chip = rest.remove(ix);
                    rest == after_chips && chip.canonical_len() == removed
                });
            prop_assert!(gone.is_some(), "a chip was cut instead of removed whole");
        }

        let reencoded = chips(&encode(&composer.value()));
        prop_assert!(is_subsequence(&after_chips, &reencoded));
    }

    #[test]
    fn insert_gif_keeps_at_most_one_gif(
        start in "[a-z ]{0,8}",
        actions in prop::collection::vec(arb_action(), 0..12),
    ) {
        let mut composer = Composer::with_value(&start);
        for action in actions {
            match action {
                Action::Gif(url) => { composer.insert_gif(&url); }
                Action::Image(url) => { composer.insert_image(&url); }
                Action::Text(text) => { composer.insert_text(&text); }
                Action::Undo => { composer.undo(); }
                Action::Redo => { composer.redo(); }
            }
            let gifs = composer.value().matches("[gif:").count();
            prop_assert!(gifs <= 1, "{} gif tokens in {:?}", gifs, composer.value());
        }
    }
}
