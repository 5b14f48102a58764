use anyhow::{Context as _, Result, anyhow, bail};
use kicker_compose_core::{MentionTarget, PastedImage, Player};
use serde_json::Value;

/// One line of a story script.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Type(String),
    Paste(String),
    PasteImage { name: String, mime_type: String },
    Backspace,
    Delete,
    Enter,
    Cursor(usize),
    Select(usize, usize),
    SelectAll,
    ComposeBegin,
    ComposeEnd,
    SetValue(String),
    Mention(MentionTarget),
    Match { id: String, display: String },
    Gif(String),
    Image(String),
    Resolve { id: String, display: String },
    Players(Vec<Player>),
    Partner(Option<Player>),
    Whisper(Player),
    Command { id: String, args: Option<Value> },
    Undo,
    Redo,
    Clear,
    Show,
}

/// Parse a script. Blank lines and lines starting with `//` are skipped.
pub fn parse(source: &str) -> Result<Vec<(usize, Step)>> {
    let mut steps = Vec::new();
    for (ix, line) in source.lines().enumerate() {
        let line_no = ix + 1;
        let line = line.trim_end();
        if line.trim().is_empty() || line.trim_start().starts_with("//") {
            continue;
        }
        let step = parse_line(line).with_context(|| format!("line {line_no}: {line}"))?;
        steps.push((line_no, step));
    }
    Ok(steps)
}

fn parse_line(line: &str) -> Result<Step> {
    let (word, rest) = match line.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (line, ""),
    };

    let step = match word {
        "type" => Step::Type(unescape(rest)),
        "paste" => Step::Paste(unescape(rest)),
        "paste-image" => {
            let (name, mime_type) = rest
                .split_once(' ')
                .ok_or_else(|| anyhow!("expected `paste-image <name> <mime>`"))?;
            Step::PasteImage {
                name: name.to_string(),
                mime_type: mime_type.trim().to_string(),
            }
        }
        "backspace" => Step::Backspace,
        "delete" => Step::Delete,
        "enter" => Step::Enter,
        "cursor" => Step::Cursor(rest.trim().parse().context("cursor offset")?),
        "select" => {
            let (a, b) = rest
                .trim()
                .split_once(' ')
                .ok_or_else(|| anyhow!("expected `select <anchor> <focus>`"))?;
            Step::Select(
                a.parse().context("anchor offset")?,
                b.trim().parse().context("focus offset")?,
            )
        }
        "select-all" => Step::SelectAll,
        "compose" => match rest.trim() {
            "begin" => Step::ComposeBegin,
            "end" => Step::ComposeEnd,
            other => bail!("unknown compose phase: {other}"),
        },
        "set" => Step::SetValue(unescape(rest)),
        "mention" => {
            if rest.trim() == "everyone" {
                Step::Mention(MentionTarget::Everyone)
            } else {
                Step::Mention(MentionTarget::Player(player(rest)?))
            }
        }
        "match" => {
            let (id, display) = id_and_text(rest)?;
            Step::Match { id, display }
        }
        "gif" => Step::Gif(rest.trim().to_string()),
        "image" => Step::Image(rest.trim().to_string()),
        "resolve" => {
            let (id, display) = id_and_text(rest)?;
            Step::Resolve { id, display }
        }
        "players" => {
            let players: Vec<Player> =
                serde_json::from_str(rest).context("players must be a JSON array")?;
            Step::Players(players)
        }
        "partner" => match rest.trim() {
            "none" => Step::Partner(None),
            _ => Step::Partner(Some(player(rest)?)),
        },
        "whisper" => Step::Whisper(player(rest)?),
        "cmd" => {
            let (id, args) = match rest.trim().split_once(' ') {
                Some((id, json)) => (
                    id,
                    Some(serde_json::from_str(json).context("command args must be JSON")?),
                ),
                None => (rest.trim(), None),
            };
            Step::Command {
                id: id.to_string(),
                args,
            }
        }
        "undo" => Step::Undo,
        "redo" => Step::Redo,
        "clear" => Step::Clear,
        "show" => Step::Show,
        other => bail!("unknown step: {other}"),
    };
    Ok(step)
}

/// `<id> <rest of line>`
fn id_and_text(rest: &str) -> Result<(String, String)> {
    let (id, text) = rest
        .trim_start()
        .split_once(' ')
        .ok_or_else(|| anyhow!("expected `<id> <text>`"))?;
    Ok((id.to_string(), text.to_string()))
}

fn player(rest: &str) -> Result<Player> {
    let (id, name) = id_and_text(rest)?;
    Ok(Player::new(id, name))
}

pub fn pasted_image(name: &str, mime_type: &str) -> PastedImage {
    PastedImage {
        name: Some(name.to_string()),
        mime_type: mime_type.to_string(),
        data: Vec::new(),
    }
}

/// `\n` and `\\` escapes, so one script line can carry a multi-line value.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
