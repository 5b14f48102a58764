use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::core::{Chip, Document, Node};

static EVERYONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@everyone").expect("everyone pattern must compile"));
static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@\[([^\]\n]+)\]\(([0-9]+)\)").expect("mention pattern must compile")
});
static MATCH_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#\[([^\]\n]+)\]\(([0-9]+)\)").expect("match link pattern must compile")
});
static GIF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[gif:([^\]\s]+)\]").expect("gif pattern must compile"));
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[img:([^\]\s]+)\]").expect("image pattern must compile"));

struct TokenPass {
    pattern: &'static LazyLock<Regex>,
    build: fn(&Captures<'_>) -> Chip,
}

// Priority order. Chips produced by an earlier pass are never rescanned.
static PASSES: [TokenPass; 5] = [
    TokenPass {
        pattern: &EVERYONE,
        build: |_| Chip::Everyone,
    },
    TokenPass {
        pattern: &MENTION,
        build: |caps| Chip::mention(&caps[2], &caps[1]),
    },
    TokenPass {
        pattern: &MATCH_LINK,
        build: |caps| Chip::match_link(&caps[2], &caps[1]),
    },
    TokenPass {
        pattern: &GIF,
        build: |caps| Chip::gif(&caps[1]),
    },
    TokenPass {
        pattern: &IMAGE,
        build: |caps| Chip::image(&caps[1]),
    },
];

enum Segment {
    Literal(String),
    Chip(Chip),
}

/// Canonical string to fragment tree.
///
/// Anything that does not match a token grammar exactly stays literal text,
/// so the result always serializes back to `canonical`.
pub fn encode(canonical: &str) -> Document {
    let mut segments = vec![Segment::Literal(canonical.to_string())];

    for pass in &PASSES {
        let mut next: Vec<Segment> = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) => split_literal(&text, pass, &mut next),
                chip @ Segment::Chip(_) => next.push(chip),
            }
        }
        segments = next;
    }

    let mut children: Vec<Node> = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Chip(chip) => children.push(Node::Chip(chip)),
            Segment::Literal(text) => {
                for (ix, line) in text.split('\n').enumerate() {
                    if ix > 0 {
                        children.push(Node::LineBreak);
                    }
                    if !line.is_empty() {
                        children.push(Node::text(line));
                    }
                }
            }
        }
    }

    Document { children }
}

fn split_literal(text: &str, pass: &TokenPass, out: &mut Vec<Segment>) {
    let mut last = 0usize;
    for caps in pass.pattern.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            out.push(Segment::Literal(text[last..whole.start()].to_string()));
        }
        out.push(Segment::Chip((pass.build)(&caps)));
        last = whole.end();
    }
    if last < text.len() {
        out.push(Segment::Literal(text[last..].to_string()));
    }
}

/// Fragment tree to canonical string. Chips contribute their token, never
/// their visible label.
pub fn decode(doc: &Document) -> String {
    let mut out = String::new();
    for node in &doc.children {
        node.write_canonical(&mut out);
    }
    out
}

impl Chip {
    /// Whether this chip's token parses back to the same chip. Ids must be
    /// digits, labels must not hold `]`, a newline or an earlier token kind,
    /// and urls must not hold `]` or whitespace.
    pub fn is_encodable(&self) -> bool {
        matches!(encode(&self.token()).children.as_slice(), [Node::Chip(chip)] if chip == self)
    }
}

impl Document {
    pub fn from_canonical(canonical: &str) -> Self {
        encode(canonical)
    }

    pub fn to_canonical(&self) -> String {
        decode(self)
    }
}
