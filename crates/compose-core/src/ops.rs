use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{Chip, Document, Node};
use crate::cursor::{Point, Selection, point_from_offset};
use crate::error::ApplyError;
use crate::text::Utf16Ext;

/// A primitive edit on the flat fragment tree. Text offsets are UTF-16 units
/// relative to the text node at `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        index: usize,
        offset: usize,
        text: String,
    },
    RemoveText {
        index: usize,
        range: Range<usize>,
    },
    InsertNode {
        index: usize,
        node: Node,
    },
    RemoveNode {
        index: usize,
    },
    SetChip {
        index: usize,
        chip: Chip,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    /// Canonical offset the caret moves to once the ops and normalization ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_after: Option<usize>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            cursor_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn cursor_after(mut self, offset: usize) -> Self {
        self.cursor_after = Some(offset);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Apply `op` to `doc`, moving the selection along, and return its inverse.
pub fn apply_op_to(
    doc: &mut Document,
    selection: &mut Selection,
    op: Op,
) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText {
            index,
            offset,
            text,
        } => {
            let node_text = text_mut(doc, index)?;
            let offset = node_text.clamp_utf16(offset);
            let byte = node_text.utf16_to_byte(offset);
            node_text.insert_str(byte, &text);
            let len = text.len_utf16();
            for point in [&mut selection.anchor, &mut selection.focus] {
                transform_point_insert_text(point, index, offset, len);
            }
            Ok(Op::RemoveText {
                index,
                range: offset..offset + len,
            })
        }
        Op::RemoveText { index, range } => {
            let node_text = text_mut(doc, index)?;
            let start = node_text.clamp_utf16(range.start);
            let end = node_text.clamp_utf16(range.end);
            if start >= end {
                return Ok(Op::InsertText {
                    index,
                    offset: start,
                    text: String::new(),
                });
            }
            let bytes = node_text.utf16_to_byte(start)..node_text.utf16_to_byte(end);
            let removed = node_text[bytes.clone()].to_string();
            node_text.replace_range(bytes, "");
            for point in [&mut selection.anchor, &mut selection.focus] {
                transform_point_remove_text(point, index, start..end);
            }
            Ok(Op::InsertText {
                index,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { index, node } => {
            let len = doc.children.len();
            if index > len {
                return Err(ApplyError::IndexOutOfBounds { index, len });
            }
            doc.children.insert(index, node);
            for point in [&mut selection.anchor, &mut selection.focus] {
                transform_point_insert_node(point, index);
            }
            Ok(Op::RemoveNode { index })
        }
        Op::RemoveNode { index } => {
            let len = doc.children.len();
            if index >= len {
                return Err(ApplyError::IndexOutOfBounds { index, len });
            }
            let removed = doc.children.remove(index);
            for point in [&mut selection.anchor, &mut selection.focus] {
                transform_point_remove_node(point, index, &removed, doc);
            }
            Ok(Op::InsertNode {
                index,
                node: removed,
            })
        }
        Op::SetChip { index, chip } => match doc.children.get_mut(index) {
            Some(Node::Chip(current)) => {
                let old = std::mem::replace(current, chip);
                Ok(Op::SetChip { index, chip: old })
            }
            Some(_) => Err(ApplyError::NotChip(index)),
            None => Err(ApplyError::IndexOutOfBounds {
                index,
                len: doc.children.len(),
            }),
        },
    }
}

fn text_mut(doc: &mut Document, index: usize) -> Result<&mut String, ApplyError> {
    let len = doc.children.len();
    match doc.children.get_mut(index) {
        Some(Node::Text(t)) => Ok(&mut t.text),
        Some(_) => Err(ApplyError::NotText(index)),
        None => Err(ApplyError::IndexOutOfBounds { index, len }),
    }
}

fn transform_point_insert_text(point: &mut Point, index: usize, offset: usize, len: usize) {
    if let Point::Text { node, offset: o } = point {
        if *node == index && *o >= offset {
            *o += len;
        }
    }
}

fn transform_point_remove_text(point: &mut Point, index: usize, range: Range<usize>) {
    let Point::Text { node, offset } = point else {
        return;
    };
    if *node != index || *offset <= range.start {
        return;
    }
    if *offset >= range.end {
        *offset -= range.end - range.start;
    } else {
        *offset = range.start;
    }
}

fn transform_point_insert_node(point: &mut Point, index: usize) {
    match point {
        Point::Text { node, .. } if *node >= index => *node += 1,
        Point::Boundary { index: ix } if *ix >= index => *ix += 1,
        _ => {}
    }
}

fn transform_point_remove_node(
    point: &mut Point,
    index: usize,
    removed: &Node,
    doc_after_remove: &Document,
) {
    match *point {
        Point::Text { node, offset } if node > index => {
            *point = Point::Text {
                node: node - 1,
                offset,
            }
        }
        Point::Boundary { index: ix } if ix > index => *point = Point::Boundary { index: ix - 1 },
        Point::Text { node, offset } if node == index => {
            // A text node removed right after its content was appended to the
            // left neighbour is a merge: keep the caret on the same character.
            let merged_into = match (removed, index.checked_sub(1)) {
                (Node::Text(removed_text), Some(left)) => match doc_after_remove.children.get(left) {
                    Some(Node::Text(left_text)) if left_text.text.ends_with(&removed_text.text) => {
                        let prefix = left_text.text.len_utf16() - removed_text.text.len_utf16();
                        Some((left, prefix + offset.min(removed_text.text.len_utf16())))
                    }
                    _ => None,
                },
                _ => None,
            };
            *point = match merged_into {
                Some((node, offset)) => Point::Text { node, offset },
                None => Point::Boundary { index },
            };
        }
        _ => {}
    }
}

/// Ops that fix the first normalization issue found: an empty text node or
/// two adjacent text nodes. Empty when the document is normalized.
pub fn next_normalize_ops(doc: &Document) -> Vec<Op> {
    for (ix, node) in doc.children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if t.text.is_empty() {
            return vec![Op::RemoveNode { index: ix }];
        }
        if let Some(Node::Text(next)) = doc.children.get(ix + 1) {
            return vec![
                Op::InsertText {
                    index: ix,
                    offset: t.text.len_utf16(),
                    text: next.text.clone(),
                },
                Op::RemoveNode { index: ix + 1 },
            ];
        }
    }
    Vec::new()
}

/// Records ops while applying each to a scratch copy, so every op is computed
/// against the document the previous one produced.
pub struct TransactionBuilder {
    doc: Document,
    selection: Selection,
    ops: Vec<Op>,
}

impl TransactionBuilder {
    pub fn new(doc: &Document) -> Self {
        Self {
            doc: doc.clone(),
            selection: Selection::collapsed(Point::start()),
            ops: Vec::new(),
        }
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn push(&mut self, op: Op) -> Result<(), ApplyError> {
        apply_op_to(&mut self.doc, &mut self.selection, op.clone())?;
        self.ops.push(op);
        Ok(())
    }

    /// Remove the canonical `range`, widened so chips go as a whole. Returns
    /// the range that was actually removed.
    pub fn remove_range(&mut self, range: Range<usize>) -> Result<Range<usize>, ApplyError> {
        let total = self.doc.canonical_len();
        let range = range.start.min(total)..range.end.min(total);
        let range = self.doc.expand_to_atoms(range);
        if range.is_empty() {
            return Ok(range);
        }

        let spans = self.doc.spans();
        for ix in (0..spans.len()).rev() {
            let span = spans[ix].clone();
            if span.end <= range.start || span.start >= range.end {
                continue;
            }
            let op = match &self.doc.children[ix] {
                Node::Text(t) => {
                    let len = t.text.len_utf16();
                    let from = range.start.saturating_sub(span.start);
                    let to = (range.end - span.start).min(len);
                    if from == 0 && to >= len {
                        Op::RemoveNode { index: ix }
                    } else {
                        Op::RemoveText {
                            index: ix,
                            range: from..to,
                        }
                    }
                }
                Node::Chip(_) | Node::LineBreak => Op::RemoveNode { index: ix },
            };
            self.push(op)?;
        }
        Ok(range)
    }

    /// Insert `nodes` at canonical offset `at` and return the inserted length.
    pub fn insert_nodes(&mut self, at: usize, nodes: Vec<Node>) -> Result<usize, ApplyError> {
        if nodes.is_empty() {
            return Ok(0);
        }
        let inserted_len: usize = nodes.iter().map(Node::canonical_len).sum();
        let all_text = nodes.iter().all(|node| matches!(node, Node::Text(_)));

        let index = match point_from_offset(&self.doc, at) {
            Point::Text { node, offset } if all_text => {
                let text: String = nodes.iter().filter_map(Node::as_text).collect();
                self.push(Op::InsertText {
                    index: node,
                    offset,
                    text,
                })?;
                return Ok(inserted_len);
            }
            Point::Text { node, offset } => {
                let current = self.doc.children[node].as_text().unwrap_or_default();
                let len = current.len_utf16();
                if offset == 0 {
                    node
                } else if offset >= len {
                    node + 1
                } else {
                    let tail = current.slice_utf16(offset..len).to_string();
                    self.push(Op::RemoveText {
                        index: node,
                        range: offset..len,
                    })?;
                    self.push(Op::InsertNode {
                        index: node + 1,
                        node: Node::text(tail),
                    })?;
                    node + 1
                }
            }
            Point::Boundary { index } => index,
        };

        for (k, node) in nodes.into_iter().enumerate() {
            self.push(Op::InsertNode {
                index: index + k,
                node,
            })?;
        }
        Ok(inserted_len)
    }

    /// Replace `range` with `nodes`; returns the canonical offset right after
    /// the inserted content.
    pub fn splice(&mut self, range: Range<usize>, nodes: Vec<Node>) -> Result<usize, ApplyError> {
        let removed = self.remove_range(range)?;
        let inserted = self.insert_nodes(removed.start, nodes)?;
        Ok(removed.start + inserted)
    }

    pub fn finish(self) -> Transaction {
        Transaction::new(self.ops)
    }
}
