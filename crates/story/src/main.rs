//! Replays a composer script and prints what a host widget would observe.
//!
//! ```text
//! kicker-compose-story crates/story/scripts/demo.txt
//! RUST_LOG=kicker_compose_core=debug kicker-compose-story < script.txt
//! ```

mod script;

use std::io::Read as _;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use kicker_compose_core::{
    CommandRegistry, Composer, ComposerHost, EditStatus, PastedImage, Player, SlashCommand,
    Trigger,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::script::{Step, pasted_image};

#[derive(Parser, Debug)]
#[command(name = "kicker-compose-story")]
#[command(about = "Replay a composer script and print what the host observes")]
struct Args {
    /// Script to replay (reads stdin if omitted)
    script: Option<PathBuf>,
}

struct PrintHost;

impl ComposerHost for PrintHost {
    fn on_change(&mut self, value: &str) {
        println!("  change        {value:?}");
    }

    fn on_mention_trigger(&mut self, trigger: Option<&Trigger>) {
        match trigger {
            Some(t) => println!("  @ trigger     {:?} at {}", t.search, t.anchor),
            None => println!("  @ trigger     closed"),
        }
    }

    fn on_match_trigger(&mut self, trigger: Option<&Trigger>) {
        match trigger {
            Some(t) => println!("  # trigger     {:?} at {}", t.search, t.anchor),
            None => println!("  # trigger     closed"),
        }
    }

    fn on_slash_command(&mut self, command: Option<&SlashCommand>) {
        println!("  slash         {command:?}");
    }

    fn on_whisper_recipient(&mut self, player: Option<&Player>) {
        match player {
            Some(p) => println!("  whisper to    {} ({})", p.name, p.id),
            None => println!("  whisper       cleared"),
        }
    }

    fn on_image_paste(&mut self, image: PastedImage) {
        println!(
            "  image paste   {} {}",
            image.name.as_deref().unwrap_or("-"),
            image.mime_type
        );
    }

    fn on_match_paste(&mut self, match_ids: Vec<String>) {
        println!("  match paste   {match_ids:?}");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let source = match &args.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read script from stdin")?;
            buf
        }
    };

    let steps = script::parse(&source)?;
    info!(steps = steps.len(), "replaying composer script");

    let registry = CommandRegistry::core();
    let mut composer = Composer::with_defaults();
    let mut host = PrintHost;

    for (line, step) in steps {
        println!("{line:>3}: {step:?}");
        let status = run_step(&mut composer, &registry, step)?;
        if status != EditStatus::Applied {
            println!("  status        {status:?}");
        }
        composer.dispatch_events(&mut host);
    }

    print_state(&composer);
    Ok(())
}

fn run_step(
    composer: &mut Composer,
    registry: &CommandRegistry,
    step: Step,
) -> Result<EditStatus> {
    let status = match step {
        Step::Type(text) => composer.insert_text(&text),
        Step::Paste(text) => composer.paste_text(&text),
        Step::PasteImage { name, mime_type } => {
            composer.paste_image(pasted_image(&name, &mime_type))
        }
        Step::Backspace => composer.delete_backward(),
        Step::Delete => composer.delete_forward(),
        Step::Enter => composer.insert_line_break(),
        Step::Cursor(offset) => composer.set_cursor(offset),
        Step::Select(anchor, focus) => composer.set_selection(anchor, focus),
        Step::SelectAll => composer.select_all(),
        Step::ComposeBegin => {
            composer.begin_composition();
            EditStatus::Applied
        }
        Step::ComposeEnd => composer.end_composition(),
        Step::SetValue(value) => composer.set_value(&value),
        Step::Mention(target) => composer.insert_mention(&target),
        Step::Match { id, display } => composer.insert_match(&id, &display),
        Step::Gif(url) => composer.insert_gif(&url),
        Step::Image(url) => composer.insert_image(&url),
        Step::Resolve { id, display } => composer.replace_match_placeholder(&id, &display),
        Step::Players(players) => {
            composer.set_player_directory(players);
            EditStatus::Applied
        }
        Step::Partner(player) => {
            composer.set_last_whisper_partner(player);
            EditStatus::Applied
        }
        Step::Whisper(player) => composer.bind_whisper_recipient(player),
        Step::Command { id, args } => composer
            .run_command(registry, &id, args)
            .with_context(|| format!("command {id} failed"))?,
        Step::Undo => composer.undo(),
        Step::Redo => composer.redo(),
        Step::Clear => composer.clear(),
        Step::Show => {
            print_state(composer);
            EditStatus::Applied
        }
    };
    Ok(status)
}

fn print_state(composer: &Composer) {
    let projection = composer.projection();
    println!("  value         {:?}", composer.value());
    println!(
        "  visible       {:?} (caret {})",
        projection.text,
        projection.to_visible(composer.cursor())
    );
    println!("  cursor        {}", composer.cursor());
    if let Some(player) = composer.whisper_recipient() {
        println!("  recipient     {} ({})", player.name, player.id);
    }
    let candidates = composer.mention_candidates();
    if !candidates.is_empty() {
        println!("  candidates    {candidates:?}");
    }
}
