use kicker_compose_core::{
    Point, clamp_offset, encode, normalize_point, offset_from_point, point_from_offset,
};

#[test]
fn offsets_in_text_map_into_text_nodes() {
    let doc = encode("hi @[Anna](42) x");
    assert_eq!(point_from_offset(&doc, 0), Point::Text { node: 0, offset: 0 });
    assert_eq!(point_from_offset(&doc, 3), Point::Text { node: 0, offset: 3 });
    assert_eq!(point_from_offset(&doc, 14), Point::Text { node: 2, offset: 0 });
    assert_eq!(point_from_offset(&doc, 16), Point::Text { node: 2, offset: 2 });
}

#[test]
fn offsets_inside_a_chip_snap_after_it() {
    let doc = encode("hi @[Anna](42) x");
    for offset in 4..14 {
        assert_eq!(point_from_offset(&doc, offset), Point::Boundary { index: 2 });
        assert_eq!(clamp_offset(&doc, offset), 14);
    }
}

#[test]
fn offset_before_a_leading_chip_is_a_boundary() {
    let doc = encode("@everyone hi");
    assert_eq!(point_from_offset(&doc, 0), Point::Boundary { index: 0 });
    assert_eq!(offset_from_point(&doc, Point::Boundary { index: 0 }), 0);
    assert_eq!(offset_from_point(&doc, Point::Boundary { index: 1 }), 9);
}

#[test]
fn offsets_past_the_end_clamp() {
    let doc = encode("ab[gif:x]");
    assert_eq!(point_from_offset(&doc, 100), Point::Boundary { index: 2 });
    assert_eq!(clamp_offset(&doc, 100), doc.canonical_len());
}

#[test]
fn round_trip_holds_outside_chips() {
    let doc = encode("a😀 @[Anna](42)\n#[M](7)b");
    let spans = doc.spans();
    for offset in 0..=doc.canonical_len() {
        let inside_chip = doc
            .children
            .iter()
            .zip(&spans)
            .any(|(node, span)| node.is_atomic() && span.start < offset && offset < span.end);
        let inside_pair = offset == 2;
        if inside_chip || inside_pair {
            continue;
        }
        let point = point_from_offset(&doc, offset);
        assert_eq!(offset_from_point(&doc, point), offset, "offset {offset}");
    }
}

#[test]
fn surrogate_pairs_count_two_units() {
    let doc = encode("a😀b");
    assert_eq!(doc.canonical_len(), 4);
    assert_eq!(point_from_offset(&doc, 3), Point::Text { node: 0, offset: 3 });
    assert_eq!(point_from_offset(&doc, 2), Point::Text { node: 0, offset: 1 });
}

#[test]
fn stale_points_normalize_to_the_end() {
    let doc = encode("ab @everyone");
    assert_eq!(
        normalize_point(&doc, Point::Text { node: 1, offset: 0 }),
        Point::Boundary { index: 2 }
    );
    assert_eq!(
        normalize_point(&doc, Point::Text { node: 0, offset: 99 }),
        Point::Text { node: 0, offset: 3 }
    );
    assert_eq!(offset_from_point(&doc, Point::Text { node: 7, offset: 0 }), 12);
}
