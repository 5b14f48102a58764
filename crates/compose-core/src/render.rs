use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{Chip, ChipKind, Document, Node};
use crate::text::Utf16Ext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Text,
    Chip(ChipKind),
    LineBreak,
}

/// One child of the fragment tree as the user sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSpan {
    pub kind: SpanKind,
    pub label: String,
    pub canonical: Range<usize>,
    pub visible: Range<usize>,
}

impl RenderSpan {
    pub fn is_atomic(&self) -> bool {
        !matches!(self.kind, SpanKind::Text)
    }
}

/// The fragment tree projected onto a plain text widget: chips show their
/// label, and offsets translate between the widget and canonical coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Projection {
    pub text: String,
    pub spans: Vec<RenderSpan>,
}

impl Projection {
    pub fn of(doc: &Document) -> Self {
        let mut text = String::new();
        let mut spans: Vec<RenderSpan> = Vec::with_capacity(doc.children.len());
        let mut canonical_at = 0usize;
        let mut visible_at = 0usize;

        for node in &doc.children {
            let (kind, label) = match node {
                Node::Text(t) => (SpanKind::Text, t.text.clone()),
                Node::Chip(chip) => (SpanKind::Chip(chip.kind()), chip.label()),
                Node::LineBreak => (SpanKind::LineBreak, "\n".to_string()),
            };
            let canonical_len = node.canonical_len();
            let visible_len = label.len_utf16();
            text.push_str(&label);
            spans.push(RenderSpan {
                kind,
                label,
                canonical: canonical_at..canonical_at + canonical_len,
                visible: visible_at..visible_at + visible_len,
            });
            canonical_at += canonical_len;
            visible_at += visible_len;
        }

        Self { text, spans }
    }

    pub fn visible_len(&self) -> usize {
        self.spans.last().map_or(0, |span| span.visible.end)
    }

    pub fn canonical_len(&self) -> usize {
        self.spans.last().map_or(0, |span| span.canonical.end)
    }

    /// Widget offset for a canonical offset. Offsets inside a chip token map
    /// to the end of the chip label.
    pub fn to_visible(&self, canonical: usize) -> usize {
        for span in &self.spans {
            if canonical > span.canonical.end {
                continue;
            }
            if !span.is_atomic() {
                return span.visible.start + (canonical - span.canonical.start);
            }
            if canonical == span.canonical.start {
                return span.visible.start;
            }
            return span.visible.end;
        }
        self.visible_len()
    }

    /// Canonical offset for a widget offset. Offsets inside a chip label map
    /// to the end of the chip token.
    pub fn to_canonical(&self, visible: usize) -> usize {
        for span in &self.spans {
            if visible > span.visible.end {
                continue;
            }
            if !span.is_atomic() {
                return span.canonical.start + (visible - span.visible.start);
            }
            if visible == span.visible.start {
                return span.canonical.start;
            }
            return span.canonical.end;
        }
        self.canonical_len()
    }

    /// HTML for a `contenteditable` surface. Literal text is escaped; chips are
    /// non-editable spans whose `data-*` attributes carry what is needed to
    /// serialize them back.
    pub fn to_html(doc: &Document) -> String {
        let mut out = String::new();
        for node in &doc.children {
            match node {
                Node::Text(t) => escape_html_into(&t.text, &mut out),
                Node::LineBreak => out.push_str("<br>"),
                Node::Chip(chip) => write_chip_html(chip, &mut out),
            }
        }
        out
    }
}

fn write_chip_html(chip: &Chip, out: &mut String) {
    let kind = chip.kind().as_str();
    out.push_str("<span class=\"chip chip-");
    out.push_str(kind);
    out.push_str("\" contenteditable=\"false\" data-kind=\"");
    out.push_str(kind);
    out.push('"');
    let attrs: Vec<(&str, &str)> = match chip {
        Chip::Mention { id, name } => vec![("id", id.as_str()), ("name", name.as_str())],
        Chip::Everyone => Vec::new(),
        Chip::MatchLink { id, display } => {
            vec![("id", id.as_str()), ("display", display.as_str())]
        }
        Chip::Gif { url } | Chip::Image { url } => vec![("url", url.as_str())],
    };
    for (key, value) in attrs {
        out.push_str(" data-");
        out.push_str(key);
        out.push_str("=\"");
        escape_html_into(value, out);
        out.push('"');
    }
    out.push('>');
    escape_html_into(&chip.label(), out);
    out.push_str("</span>");
}

fn escape_html_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}
