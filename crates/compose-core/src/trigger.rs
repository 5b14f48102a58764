use serde::{Deserialize, Serialize};

use crate::core::{Document, MentionTarget, Node, Player};
use crate::cursor::{Point, offset_from_point, point_from_offset};
use crate::text::Utf16Ext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Mention,
    Match,
}

impl TriggerKind {
    pub fn from_char(ch: char) -> Option<Self> {
        match ch {
            '@' => Some(TriggerKind::Mention),
            '#' => Some(TriggerKind::Match),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            TriggerKind::Mention => '@',
            TriggerKind::Match => '#',
        }
    }
}

/// An open `@`/`#` span the caret is currently typing into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    /// Everything typed between the trigger character and the caret.
    pub search: String,
    /// Canonical offset of the trigger character.
    pub anchor: usize,
}

/// Scan left from `cursor` for the nearest trigger character.
///
/// The scan stops without a result at whitespace, at any chip or line break,
/// and at the start of content.
pub fn detect_trigger(doc: &Document, cursor: usize) -> Option<Trigger> {
    let Point::Text { node, offset } = point_from_offset(doc, cursor) else {
        return None;
    };

    let mut typed = String::new();
    let mut current = Some((node, offset));
    while let Some((ix, end)) = current {
        let Some(Node::Text(t)) = doc.children.get(ix) else {
            return None;
        };
        let before = t.text.slice_utf16(0..end);
        for (byte_ix, ch) in before.char_indices().rev() {
            if ch.is_whitespace() {
                return None;
            }
            if let Some(kind) = TriggerKind::from_char(ch) {
                let node_start = offset_from_point(doc, Point::Text { node: ix, offset: 0 });
                let mut search = before[byte_ix + ch.len_utf8()..].to_string();
                search.push_str(&typed);
                return Some(Trigger {
                    kind,
                    search,
                    anchor: node_start + before[..byte_ix].len_utf16(),
                });
            }
        }
        typed.insert_str(0, before);
        current = match ix.checked_sub(1) {
            Some(prev) if matches!(doc.children.get(prev), Some(Node::Text(_))) => {
                let len = doc.children[prev].canonical_len();
                Some((prev, len))
            }
            _ => None,
        };
    }
    None
}

/// A leading slash command recognised in the composer input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SlashCommand {
    /// `/w <name>` or `/whisper <name>`. `query` is the partially typed
    /// recipient name; `terminated` is set once whitespace follows it.
    Whisper {
        query: String,
        terminated: bool,
        prefix_len: usize,
    },
    /// `/r` or `/reply`, answering the last whisper partner.
    Reply { prefix_len: usize },
}

impl SlashCommand {
    /// Canonical length of the command prefix, including the single
    /// whitespace character that separates it from the message.
    pub fn prefix_len(&self) -> usize {
        match self {
            SlashCommand::Whisper { prefix_len, .. } | SlashCommand::Reply { prefix_len } => {
                *prefix_len
            }
        }
    }
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let rest = input.strip_prefix('/')?;
    let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let word = rest[..word_end].to_lowercase();
    let after_word = &rest[word_end..];

    let mut prefix_len = 1 + rest[..word_end].len_utf16();
    let mut after = after_word;
    if let Some(ws) = after_word.chars().next() {
        prefix_len += ws.len_utf16();
        after = &after_word[ws.len_utf8()..];
    }

    match word.as_str() {
        "w" | "whisper" => {
            let name_end = after.find(char::is_whitespace).unwrap_or(after.len());
            let query = after[..name_end].to_string();
            let terminated = name_end < after.len();
            if query.is_empty() {
                return Some(SlashCommand::Whisper {
                    query,
                    terminated: false,
                    prefix_len,
                });
            }
            prefix_len += query.len_utf16();
            if let Some(ws) = after[name_end..].chars().next() {
                prefix_len += ws.len_utf16();
            }
            Some(SlashCommand::Whisper {
                query,
                terminated,
                prefix_len,
            })
        }
        "r" | "reply" => Some(SlashCommand::Reply { prefix_len }),
        _ => None,
    }
}

/// Mention dropdown candidates for `query`.
///
/// Names starting with the query come before names that merely contain it;
/// `@everyone` is offered first while the query is a prefix of "everyone".
pub fn search_players(directory: &[Player], query: &str, limit: usize) -> Vec<MentionTarget> {
    let query = query.to_lowercase();
    let mut out: Vec<MentionTarget> = Vec::new();
    if "everyone".starts_with(&query) {
        out.push(MentionTarget::Everyone);
    }

    let mut prefix: Vec<&Player> = Vec::new();
    let mut contains: Vec<&Player> = Vec::new();
    for player in directory {
        let name = player.name.to_lowercase();
        if name.starts_with(&query) {
            prefix.push(player);
        } else if name.contains(&query) {
            contains.push(player);
        }
    }

    out.extend(
        prefix
            .into_iter()
            .chain(contains)
            .map(|player| MentionTarget::Player(player.clone())),
    );
    out.truncate(limit);
    out
}
