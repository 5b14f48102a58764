use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{Document, Node};
use crate::text::Utf16Ext;

/// A caret position inside the fragment tree.
///
/// `Text` sits inside a text node at a UTF-16 offset. `Boundary` sits between
/// children, before the child at `index` (`index == len` is the very end).
/// There is no way to address the inside of a chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum Point {
    Text { node: usize, offset: usize },
    Boundary { index: usize },
}

impl Point {
    pub fn start() -> Self {
        Point::Boundary { index: 0 }
    }

    pub fn end_of(doc: &Document) -> Self {
        Point::Boundary {
            index: doc.children.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Ordered canonical range covered by the selection.
    pub fn canonical_range(&self, doc: &Document) -> Range<usize> {
        let a = offset_from_point(doc, self.anchor);
        let b = offset_from_point(doc, self.focus);
        a.min(b)..a.max(b)
    }
}

/// Canonical offset of `point`.
///
/// Text nodes before the point count their literal length, chips count the
/// length of their token. Points that no longer resolve fall back to the end.
pub fn offset_from_point(doc: &Document, point: Point) -> usize {
    match point {
        Point::Text { node, offset } => {
            let Some(Node::Text(t)) = doc.children.get(node) else {
                return doc.canonical_len();
            };
            let before: usize = doc.children[..node].iter().map(Node::canonical_len).sum();
            before + t.text.clamp_utf16(offset)
        }
        Point::Boundary { index } => {
            let index = index.min(doc.children.len());
            doc.children[..index].iter().map(Node::canonical_len).sum()
        }
    }
}

/// Tree position for canonical `offset`.
///
/// An offset inside a chip's token lands right after the chip. Offsets past
/// the end collapse to the end of content.
pub fn point_from_offset(doc: &Document, offset: usize) -> Point {
    let mut acc = 0usize;
    for (ix, node) in doc.children.iter().enumerate() {
        let len = node.canonical_len();
        match node {
            Node::Text(t) => {
                if offset <= acc + len {
                    return Point::Text {
                        node: ix,
                        offset: t.text.clamp_utf16(offset - acc),
                    };
                }
            }
            Node::Chip(_) | Node::LineBreak => {
                if offset == acc {
                    return Point::Boundary { index: ix };
                }
                if offset < acc + len {
                    return Point::Boundary { index: ix + 1 };
                }
            }
        }
        acc += len;
    }
    Point::end_of(doc)
}

/// Snap a canonical offset to the nearest valid caret position at or after
/// it, clamped to the document length.
pub fn clamp_offset(doc: &Document, offset: usize) -> usize {
    offset_from_point(doc, point_from_offset(doc, offset))
}

/// Replace a point that no longer addresses anything with the end of content.
pub fn normalize_point(doc: &Document, point: Point) -> Point {
    match point {
        Point::Text { node, offset } => match doc.children.get(node) {
            Some(Node::Text(t)) => Point::Text {
                node,
                offset: t.text.clamp_utf16(offset),
            },
            _ => Point::end_of(doc),
        },
        Point::Boundary { index } if index <= doc.children.len() => point,
        Point::Boundary { .. } => Point::end_of(doc),
    }
}
