use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::text::Utf16Ext;

/// The editable surface: a flat run of text, chips and line breaks.
///
/// Chips never nest, so the tree is a single level deep. Concatenating the
/// canonical form of every child yields the canonical string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Text(TextNode),
    Chip(Chip),
    LineBreak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
}

/// An atomic, non-editable inline node that serializes to one canonical token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chip {
    Mention { id: String, name: String },
    Everyone,
    MatchLink { id: String, display: String },
    Gif { url: String },
    Image { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChipKind {
    Mention,
    Everyone,
    MatchLink,
    Gif,
    Image,
}

impl ChipKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChipKind::Mention => "mention",
            ChipKind::Everyone => "everyone",
            ChipKind::MatchLink => "match_link",
            ChipKind::Gif => "gif",
            ChipKind::Image => "image",
        }
    }
}

impl Chip {
    pub fn mention(id: impl Into<String>, name: impl Into<String>) -> Self {
        Chip::Mention {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn match_link(id: impl Into<String>, display: impl Into<String>) -> Self {
        Chip::MatchLink {
            id: id.into(),
            display: display.into(),
        }
    }

    pub fn gif(url: impl Into<String>) -> Self {
        Chip::Gif { url: url.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Chip::Image { url: url.into() }
    }

    pub fn kind(&self) -> ChipKind {
        match self {
            Chip::Mention { .. } => ChipKind::Mention,
            Chip::Everyone => ChipKind::Everyone,
            Chip::MatchLink { .. } => ChipKind::MatchLink,
            Chip::Gif { .. } => ChipKind::Gif,
            Chip::Image { .. } => ChipKind::Image,
        }
    }

    pub fn write_token(&self, out: &mut String) {
        match self {
            Chip::Mention { id, name } => {
                out.push_str("@[");
                out.push_str(name);
                out.push_str("](");
                out.push_str(id);
                out.push(')');
            }
            Chip::Everyone => out.push_str("@everyone"),
            Chip::MatchLink { id, display } => {
                out.push_str("#[");
                out.push_str(display);
                out.push_str("](");
                out.push_str(id);
                out.push(')');
            }
            Chip::Gif { url } => {
                out.push_str("[gif:");
                out.push_str(url);
                out.push(']');
            }
            Chip::Image { url } => {
                out.push_str("[img:");
                out.push_str(url);
                out.push(']');
            }
        }
    }

    pub fn token(&self) -> String {
        let mut out = String::new();
        self.write_token(&mut out);
        out
    }

    /// Length of the canonical token, which is what the cursor counts.
    pub fn canonical_len(&self) -> usize {
        match self {
            Chip::Mention { id, name } => 5 + name.len_utf16() + id.len_utf16(),
            Chip::Everyone => 9,
            Chip::MatchLink { id, display } => 5 + display.len_utf16() + id.len_utf16(),
            Chip::Gif { url } | Chip::Image { url } => 6 + url.len_utf16(),
        }
    }

    /// The text a user sees in place of the token.
    pub fn label(&self) -> String {
        match self {
            Chip::Mention { name, .. } => format!("@{name}"),
            Chip::Everyone => "@everyone".to_string(),
            Chip::MatchLink { display, .. } => display.clone(),
            Chip::Gif { .. } => "GIF".to_string(),
            Chip::Image { .. } => "Bild".to_string(),
        }
    }

    pub fn is_match_placeholder(&self, match_id: &str, placeholder_label: &str) -> bool {
        matches!(
            self,
            Chip::MatchLink { id, display } if id == match_id && display == placeholder_label
        )
    }
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode { text: text.into() })
    }

    pub fn chip(chip: Chip) -> Self {
        Node::Chip(chip)
    }

    pub fn canonical_len(&self) -> usize {
        match self {
            Node::Text(t) => t.text.len_utf16(),
            Node::Chip(chip) => chip.canonical_len(),
            Node::LineBreak => 1,
        }
    }

    pub fn write_canonical(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&t.text),
            Node::Chip(chip) => chip.write_token(out),
            Node::LineBreak => out.push('\n'),
        }
    }

    /// Text nodes are the only nodes a cursor can sit inside of.
    pub fn is_atomic(&self) -> bool {
        !matches!(self, Node::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    pub fn as_chip(&self) -> Option<&Chip> {
        match self {
            Node::Chip(chip) => Some(chip),
            _ => None,
        }
    }
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn is_empty(&self) -> bool {
        self.children.iter().all(|node| node.canonical_len() == 0)
    }

    pub fn canonical_len(&self) -> usize {
        self.children.iter().map(Node::canonical_len).sum()
    }

    /// Canonical range covered by each child, in order.
    pub fn spans(&self) -> Vec<Range<usize>> {
        let mut acc = 0usize;
        self.children
            .iter()
            .map(|node| {
                let start = acc;
                acc += node.canonical_len();
                start..acc
            })
            .collect()
    }

    pub fn chips(&self) -> impl Iterator<Item = (usize, &Chip)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(ix, node)| node.as_chip().map(|chip| (ix, chip)))
    }

    /// Widen `range` so that it never cuts through an atomic node.
    pub fn expand_to_atoms(&self, range: Range<usize>) -> Range<usize> {
        let mut start = range.start.min(range.end);
        let mut end = range.end.max(range.start);
        for (node, span) in self.children.iter().zip(self.spans()) {
            if !node.is_atomic() {
                continue;
            }
            if span.start < start && start < span.end {
                start = span.start;
            }
            if span.start < end && end < span.end {
                end = span.end;
            }
        }
        start..end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
        }
    }
}

/// What a mention dropdown entry resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum MentionTarget {
    Player(Player),
    Everyone,
}

impl MentionTarget {
    pub fn chip(&self) -> Chip {
        match self {
            MentionTarget::Player(player) => Chip::mention(&player.id, &player.name),
            MentionTarget::Everyone => Chip::Everyone,
        }
    }
}
