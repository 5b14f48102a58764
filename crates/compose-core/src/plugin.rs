use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::composer::{Composer, EditStatus};
use crate::core::{MentionTarget, Player};
use crate::error::CommandError;

pub type CommandHandler =
    Arc<dyn Fn(&mut Composer, Option<Value>) -> Result<EditStatus, CommandError> + Send + Sync>;

/// A named composer operation hosts can invoke with JSON arguments.
#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub hidden: bool,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Composer, Option<Value>) -> Result<EditStatus, CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            hidden: false,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandSpec>,
}

impl CommandRegistry {
    pub fn new(specs: impl IntoIterator<Item = CommandSpec>) -> Result<Self, String> {
        let mut registry = Self::default();
        for spec in specs {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    /// Every built-in composer command.
    pub fn core() -> Self {
        Self::new(core_commands()).expect("core command registry must be valid")
    }

    pub fn register(&mut self, spec: CommandSpec) -> Result<(), String> {
        if self.commands.contains_key(&spec.id) {
            return Err(format!("Duplicate command id: {}", spec.id));
        }
        self.commands.insert(spec.id.clone(), spec);
        Ok(())
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    /// Visible commands sorted by id, for command palettes.
    pub fn command_list(&self) -> Vec<&CommandSpec> {
        let mut list: Vec<&CommandSpec> =
            self.commands.values().filter(|spec| !spec.hidden).collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }
}

impl Composer {
    pub fn run_command(
        &mut self,
        registry: &CommandRegistry,
        id: &str,
        args: Option<Value>,
    ) -> Result<EditStatus, CommandError> {
        let Some(command) = registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        debug!(command = id, "running composer command");
        (command.handler)(self, args)
    }
}

fn arg<'a>(args: &'a Option<Value>, key: &str) -> Option<&'a Value> {
    args.as_ref().and_then(|v| v.get(key))
}

fn required_str(args: &Option<Value>, key: &str) -> Result<String, CommandError> {
    arg(args, key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CommandError::new(format!("Missing string argument: {key}")))
}

/// Ids arrive as JSON strings or numbers; either way they must be digits.
fn required_id(args: &Option<Value>, key: &str) -> Result<String, CommandError> {
    let id = match arg(args, key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if n.is_u64() => n.to_string(),
        _ => return Err(CommandError::new(format!("Missing id argument: {key}"))),
    };
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::new(format!("Invalid id for {key}: {id}")));
    }
    Ok(id)
}

fn core_commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("text.insert", "Insert text", |composer, args| {
            let text = required_str(&args, "text")?;
            Ok(composer.insert_plain_text(&text))
        })
        .description("Insert literal text at the caret, e.g. an emoji from a picker.")
        .keywords(["text", "emoji", "insert"])
        .args_example(serde_json::json!({ "text": "⚽" })),
        CommandSpec::new("mention.insert", "Insert mention", |composer, args| {
            let everyone = arg(&args, "everyone")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let target = if everyone {
                MentionTarget::Everyone
            } else {
                let id = required_id(&args, "id")?;
                let name = required_str(&args, "name")?;
                MentionTarget::Player(Player::new(id, name))
            };
            Ok(composer.insert_mention(&target))
        })
        .description("Replace the open @ search with a mention chip.")
        .keywords(["mention", "@", "player", "everyone"])
        .args_example(serde_json::json!({ "id": "42", "name": "Anna" })),
        CommandSpec::new("match.insert", "Insert match link", |composer, args| {
            let id = required_id(&args, "id")?;
            let display = required_str(&args, "display")?;
            Ok(composer.insert_match(&id, &display))
        })
        .description("Replace the open # search with a match link chip.")
        .keywords(["match", "#", "link"])
        .args_example(serde_json::json!({ "id": "77", "display": "Match #77: A vs B" })),
        CommandSpec::new("gif.insert", "Insert GIF", |composer, args| {
            let url = required_str(&args, "url")?;
            Ok(composer.insert_gif(&url))
        })
        .description("Attach a GIF, replacing the one already attached.")
        .keywords(["gif", "media"])
        .args_example(serde_json::json!({ "url": "https://media.example/g.gif" })),
        CommandSpec::new("image.insert", "Insert image", |composer, args| {
            let url = required_str(&args, "url")?;
            Ok(composer.insert_image(&url))
        })
        .description("Attach an uploaded image.")
        .keywords(["image", "bild", "media"])
        .args_example(serde_json::json!({ "url": "https://cdn.example/a.png" })),
        CommandSpec::new(
            "match.replace_placeholder",
            "Resolve match placeholder",
            |composer, args| {
                let id = required_id(&args, "id")?;
                let display = required_str(&args, "display")?;
                Ok(composer.replace_match_placeholder(&id, &display))
            },
        )
        .description("Swap a pasted match link's placeholder for its resolved display.")
        .args_example(serde_json::json!({ "id": "55", "display": "Match #55: A vs B" }))
        .hidden(true),
        CommandSpec::new("history.undo", "Undo", |composer, _args| Ok(composer.undo()))
            .keywords(["undo", "history"]),
        CommandSpec::new("history.redo", "Redo", |composer, _args| Ok(composer.redo()))
            .keywords(["redo", "history"]),
    ]
}
