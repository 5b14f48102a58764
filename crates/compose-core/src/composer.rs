use std::ops::Range;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::codec::{decode, encode};
use crate::config::ComposerConfig;
use crate::core::{Chip, Document, MentionTarget, Node, Player};
use crate::cursor::{
    Point, Selection, clamp_offset, normalize_point, offset_from_point, point_from_offset,
};
use crate::error::{ApplyError, ConfigError};
use crate::ops::{Op, Transaction, TransactionBuilder, apply_op_to, next_normalize_ops};
use crate::paste::{PastedImage, scan_match_urls};
use crate::render::Projection;
use crate::text::Utf16Ext;
use crate::trigger::{
    SlashCommand, Trigger, TriggerKind, detect_trigger, parse_slash_command, search_players,
};

/// Outcome of a composer operation. Operations never fail outright: an
/// internal error is logged and the caret is parked at the end of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStatus {
    Applied,
    Unchanged,
    Deferred,
    Recovered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ComposerEvent {
    Changed { value: String },
    MentionTrigger { trigger: Option<Trigger> },
    MatchTrigger { trigger: Option<Trigger> },
    SlashCommand { command: Option<SlashCommand> },
    WhisperRecipient { player: Option<Player> },
    ImagePaste { image: PastedImage },
    MatchPaste { match_ids: Vec<String> },
}

/// Callbacks a host input component implements. Every method defaults to a
/// no-op so hosts only handle what they render.
pub trait ComposerHost {
    fn on_change(&mut self, _value: &str) {}
    fn on_mention_trigger(&mut self, _trigger: Option<&Trigger>) {}
    fn on_match_trigger(&mut self, _trigger: Option<&Trigger>) {}
    fn on_slash_command(&mut self, _command: Option<&SlashCommand>) {}
    fn on_whisper_recipient(&mut self, _player: Option<&Player>) {}
    fn on_image_paste(&mut self, _image: PastedImage) {}
    fn on_match_paste(&mut self, _match_ids: Vec<String>) {}
}

#[derive(Debug, Clone)]
struct UndoRecord {
    inverse_ops: Vec<Op>,
    selection_before: Selection,
    selection_after: Selection,
    recipient: Option<RecipientChange>,
}

/// Whisper binding that travels with a history entry.
#[derive(Debug, Clone)]
struct RecipientChange {
    before: Option<Player>,
    after: Option<Player>,
}

/// One editing surface. Owns its fragment tree exclusively; the canonical
/// string is what goes in through [`Composer::set_value`] and comes out
/// through [`ComposerEvent::Changed`].
pub struct Composer {
    doc: Document,
    selection: Selection,
    config: ComposerConfig,
    match_url: Regex,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
    composing: bool,
    composition_dirty: bool,
    deferred_value: Option<String>,
    last_value: String,
    trigger: Option<Trigger>,
    slash: Option<SlashCommand>,
    whisper_recipient: Option<Player>,
    pending_recipient: Option<RecipientChange>,
    last_whisper_partner: Option<Player>,
    directory: Vec<Player>,
    events: Vec<ComposerEvent>,
}

impl Default for Composer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Composer {
    pub fn new(config: ComposerConfig) -> Result<Self, ConfigError> {
        let config = config.with_defaults();
        let match_url = config.match_url_regex()?;
        Ok(Self {
            doc: Document::default(),
            selection: Selection::collapsed(Point::start()),
            config,
            match_url,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            composing: false,
            composition_dirty: false,
            deferred_value: None,
            last_value: String::new(),
            trigger: None,
            slash: None,
            whisper_recipient: None,
            pending_recipient: None,
            last_whisper_partner: None,
            directory: Vec::new(),
            events: Vec::new(),
        })
    }

    pub fn with_defaults() -> Self {
        Self::new(ComposerConfig::default()).expect("default composer config must be valid")
    }

    pub fn with_value(value: &str) -> Self {
        let mut composer = Self::with_defaults();
        composer.set_value(value);
        composer
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// The canonical string for the current fragment tree.
    pub fn value(&self) -> String {
        decode(&self.doc)
    }

    /// Canonical offset of the caret (the selection focus).
    pub fn cursor(&self) -> usize {
        offset_from_point(&self.doc, self.selection.focus)
    }

    pub fn selection_range(&self) -> Range<usize> {
        self.selection.canonical_range(&self.doc)
    }

    pub fn trigger(&self) -> Option<&Trigger> {
        self.trigger.as_ref()
    }

    pub fn slash_command(&self) -> Option<&SlashCommand> {
        self.slash.as_ref()
    }

    pub fn whisper_recipient(&self) -> Option<&Player> {
        self.whisper_recipient.as_ref()
    }

    pub fn last_whisper_partner(&self) -> Option<&Player> {
        self.last_whisper_partner.as_ref()
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn projection(&self) -> Projection {
        Projection::of(&self.doc)
    }

    pub fn html(&self) -> String {
        Projection::to_html(&self.doc)
    }

    pub fn take_events(&mut self) -> Vec<ComposerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drain the event queue into `host`, in the order the events happened.
    pub fn dispatch_events(&mut self, host: &mut dyn ComposerHost) {
        for event in self.take_events() {
            match event {
                ComposerEvent::Changed { value } => host.on_change(&value),
                ComposerEvent::MentionTrigger { trigger } => {
                    host.on_mention_trigger(trigger.as_ref())
                }
                ComposerEvent::MatchTrigger { trigger } => host.on_match_trigger(trigger.as_ref()),
                ComposerEvent::SlashCommand { command } => host.on_slash_command(command.as_ref()),
                ComposerEvent::WhisperRecipient { player } => {
                    host.on_whisper_recipient(player.as_ref())
                }
                ComposerEvent::ImagePaste { image } => host.on_image_paste(image),
                ComposerEvent::MatchPaste { match_ids } => host.on_match_paste(match_ids),
            }
        }
    }

    /// Accept a canonical string from the host.
    ///
    /// The tree is rebuilt only when `value` differs from the current decode.
    /// While an IME composition is running the value is held back.
    pub fn set_value(&mut self, value: &str) -> EditStatus {
        if value == self.value() {
            self.deferred_value = None;
            return EditStatus::Unchanged;
        }
        if self.composing {
            debug!(len = value.len(), "deferring external value until composition ends");
            self.deferred_value = Some(value.to_string());
            return EditStatus::Deferred;
        }

        debug!(len = value.len(), "rebuilding fragment tree from external value");
        self.doc = encode(value);
        self.selection = Selection::collapsed(Point::end_of(&self.doc));
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.last_value = value.to_string();
        self.sync_state(false);
        EditStatus::Applied
    }

    pub fn set_player_directory(&mut self, players: Vec<Player>) {
        self.directory = players;
    }

    pub fn player_directory(&self) -> &[Player] {
        &self.directory
    }

    /// Dropdown candidates for the open `@` trigger, if any.
    pub fn mention_candidates(&self) -> Vec<MentionTarget> {
        match &self.trigger {
            Some(trigger) if trigger.kind == TriggerKind::Mention => search_players(
                &self.directory,
                &trigger.search,
                self.config.mention_result_limit,
            ),
            _ => Vec::new(),
        }
    }

    pub fn set_cursor(&mut self, offset: usize) -> EditStatus {
        self.selection = Selection::collapsed(point_from_offset(&self.doc, offset));
        self.sync_state(false);
        EditStatus::Applied
    }

    pub fn set_selection(&mut self, anchor: usize, focus: usize) -> EditStatus {
        self.selection = Selection {
            anchor: point_from_offset(&self.doc, anchor),
            focus: point_from_offset(&self.doc, focus),
        };
        self.sync_state(false);
        EditStatus::Applied
    }

    pub fn select_all(&mut self) -> EditStatus {
        self.selection = Selection {
            anchor: Point::start(),
            focus: Point::end_of(&self.doc),
        };
        self.sync_state(false);
        EditStatus::Applied
    }

    /// Typed input. Replaces the selection; `\n` becomes a line break.
    pub fn insert_text(&mut self, text: &str) -> EditStatus {
        if text.is_empty() {
            return EditStatus::Unchanged;
        }
        let range = self.selection_range();
        let tx = self.splice_tx(range, literal_nodes(text), "input:text");
        self.commit(tx)
    }

    pub fn insert_line_break(&mut self) -> EditStatus {
        let range = self.selection_range();
        let tx = self.splice_tx(range, vec![Node::LineBreak], "input:line_break");
        self.commit(tx)
    }

    /// Literal text inserted on behalf of the host, e.g. from an emoji picker.
    pub fn insert_plain_text(&mut self, text: &str) -> EditStatus {
        if text.is_empty() {
            return EditStatus::Unchanged;
        }
        let range = self.selection_range();
        let tx = self.splice_tx(range, literal_nodes(text), "command:text.insert");
        self.commit(tx)
    }

    /// Backspace. A chip before the caret goes as a whole.
    pub fn delete_backward(&mut self) -> EditStatus {
        let range = if self.selection.is_collapsed() {
            let cursor = self.cursor();
            let Some(range) = self.unit_before(cursor) else {
                return EditStatus::Unchanged;
            };
            range
        } else {
            self.selection_range()
        };
        let tx = self.splice_tx(range, Vec::new(), "input:delete_backward");
        self.commit(tx)
    }

    /// Forward delete. A chip after the caret goes as a whole.
    pub fn delete_forward(&mut self) -> EditStatus {
        let range = if self.selection.is_collapsed() {
            let cursor = self.cursor();
            let Some(range) = self.unit_after(cursor) else {
                return EditStatus::Unchanged;
            };
            range
        } else {
            self.selection_range()
        };
        let tx = self.splice_tx(range, Vec::new(), "input:delete_forward");
        self.commit(tx)
    }

    /// Remove all content as one undoable edit.
    pub fn clear(&mut self) -> EditStatus {
        let len = self.doc.canonical_len();
        if len == 0 {
            return EditStatus::Unchanged;
        }
        let tx = self.splice_tx(0..len, Vec::new(), "command:clear");
        self.commit(tx)
    }

    pub fn begin_composition(&mut self) {
        self.composing = true;
        self.composition_dirty = false;
    }

    /// Finish an IME composition and run one change cycle for everything
    /// composed. A value the host sent meanwhile is dropped if the
    /// composition edited the content, and applied otherwise.
    pub fn end_composition(&mut self) -> EditStatus {
        if !self.composing {
            return EditStatus::Unchanged;
        }
        self.composing = false;
        let deferred = self.deferred_value.take();

        if self.composition_dirty {
            self.composition_dirty = false;
            if deferred.is_some() {
                debug!("dropping deferred external value superseded by composed input");
            }
            self.sync_state(true);
            return EditStatus::Applied;
        }

        match deferred {
            Some(value) => self.set_value(&value),
            None => EditStatus::Unchanged,
        }
    }

    /// Paste plain text. Match URLs become placeholder match links and the
    /// parsed ids are reported through [`ComposerEvent::MatchPaste`].
    pub fn paste_text(&mut self, text: &str) -> EditStatus {
        if text.is_empty() {
            return EditStatus::Unchanged;
        }
        let scan = scan_match_urls(text, &self.match_url, &self.config.placeholder_label);
        if scan.has_matches() {
            debug!(match_ids = ?scan.match_ids, "pasted text contains match urls");
        }
        let range = self.selection_range();
        let nodes = encode(&scan.text).children;
        let tx = self.splice_tx(range, nodes, "input:paste");
        let status = self.commit(tx);
        if scan.has_matches() {
            self.events.push(ComposerEvent::MatchPaste {
                match_ids: scan.match_ids,
            });
        }
        status
    }

    /// Pasted binary content is not inserted; it is handed to the host,
    /// which uploads it and later calls [`Composer::insert_image`].
    pub fn paste_image(&mut self, image: PastedImage) -> EditStatus {
        if !image.is_image() {
            debug!(mime_type = %image.mime_type, "ignoring non-image paste");
            return EditStatus::Unchanged;
        }
        self.events.push(ComposerEvent::ImagePaste { image });
        EditStatus::Unchanged
    }

    /// Replace the open `@search` span (or the selection) with a mention chip
    /// and one space. The caret lands after the space.
    pub fn insert_mention(&mut self, target: &MentionTarget) -> EditStatus {
        let chip = target.chip();
        if !accepts_chip(&chip) {
            return EditStatus::Unchanged;
        }
        let range = self.trigger_range(TriggerKind::Mention);
        let nodes = vec![Node::Chip(chip), Node::text(" ")];
        let tx = self.splice_tx(range, nodes, "command:mention.insert");
        self.commit(tx)
    }

    /// Replace the open `#search` span (or the selection) with a match link
    /// chip and one space. The caret lands after the space.
    pub fn insert_match(&mut self, match_id: &str, display: &str) -> EditStatus {
        let chip = Chip::match_link(match_id, display);
        if !accepts_chip(&chip) {
            return EditStatus::Unchanged;
        }
        let range = self.trigger_range(TriggerKind::Match);
        let nodes = vec![Node::Chip(chip), Node::text(" ")];
        let tx = self.splice_tx(range, nodes, "command:match.insert");
        self.commit(tx)
    }

    /// Append a GIF, replacing any GIF already present: a message carries at
    /// most one.
    pub fn insert_gif(&mut self, url: &str) -> EditStatus {
        if !accepts_chip(&Chip::gif(url)) {
            return EditStatus::Unchanged;
        }
        let tx = self.gif_tx(url);
        self.commit(tx)
    }

    /// Append an image. Unlike GIFs, any number of images may be attached.
    pub fn insert_image(&mut self, url: &str) -> EditStatus {
        let chip = Chip::image(url);
        if !accepts_chip(&chip) {
            return EditStatus::Unchanged;
        }
        let end = self.doc.canonical_len();
        let tx = self.splice_tx(end..end, vec![Node::Chip(chip)], "command:image.insert");
        self.commit(tx)
    }

    /// Swap the placeholder display of match link `match_id` for `display`
    /// once the host resolved it. A no-op when the placeholder is gone; the
    /// caret stays on the same node even though the token length changes.
    pub fn replace_match_placeholder(&mut self, match_id: &str, display: &str) -> EditStatus {
        let resolved = Chip::match_link(match_id, display);
        if !accepts_chip(&resolved) {
            return EditStatus::Unchanged;
        }
        let placeholder = self.config.placeholder_label.as_str();
        let ops: Vec<Op> = self
            .doc
            .chips()
            .filter(|(_, chip)| chip.is_match_placeholder(match_id, placeholder))
            .map(|(index, _)| Op::SetChip {
                index,
                chip: resolved.clone(),
            })
            .collect();
        if ops.is_empty() {
            debug!(match_id, "no placeholder left to resolve");
            return EditStatus::Unchanged;
        }
        self.commit(Ok(
            Transaction::new(ops).source("command:match.replace_placeholder")
        ))
    }

    /// Bind the whisper recipient out of band and drop the `/w <name>`
    /// prefix from the content.
    pub fn bind_whisper_recipient(&mut self, player: Player) -> EditStatus {
        let prefix_len = match parse_slash_command(&self.value()) {
            Some(command @ SlashCommand::Whisper { .. }) => command.prefix_len(),
            _ => 0,
        };
        self.bind_recipient(player, prefix_len)
    }

    pub fn clear_whisper(&mut self) {
        if self.whisper_recipient.take().is_some() {
            self.events
                .push(ComposerEvent::WhisperRecipient { player: None });
        }
    }

    pub fn set_last_whisper_partner(&mut self, player: Option<Player>) {
        self.last_whisper_partner = player;
    }

    /// Undoing an automatic whisper binding also unbinds the recipient. The
    /// restored `/w <name> ` prefix is left alone until it is edited.
    pub fn undo(&mut self) -> EditStatus {
        let Some(record) = self.undo_stack.pop() else {
            return EditStatus::Unchanged;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
            recipient,
        } = record;

        let mut redo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops {
            match apply_op_to(&mut self.doc, &mut self.selection, op) {
                Ok(inv) => redo_ops.push(inv),
                Err(err) => {
                    warn!(%err, "undo stopped early");
                    break;
                }
            }
        }
        redo_ops.reverse();

        self.selection = self.normalized_selection(selection_before);
        let restored = recipient.as_ref().map(|change| change.before.clone());
        self.redo_stack.push(UndoRecord {
            inverse_ops: redo_ops,
            selection_before,
            selection_after,
            recipient,
        });
        self.after_edit(false);
        if let Some(player) = restored {
            self.set_recipient(player);
        }
        EditStatus::Applied
    }

    pub fn redo(&mut self) -> EditStatus {
        let Some(record) = self.redo_stack.pop() else {
            return EditStatus::Unchanged;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
            recipient,
        } = record;

        let mut undo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops {
            match apply_op_to(&mut self.doc, &mut self.selection, op) {
                Ok(inv) => undo_ops.push(inv),
                Err(err) => {
                    warn!(%err, "redo stopped early");
                    break;
                }
            }
        }
        undo_ops.reverse();

        self.selection = self.normalized_selection(selection_after);
        let restored = recipient.as_ref().map(|change| change.after.clone());
        self.undo_stack.push(UndoRecord {
            inverse_ops: undo_ops,
            selection_before,
            selection_after,
            recipient,
        });
        self.after_edit(false);
        if let Some(player) = restored {
            self.set_recipient(player);
        }
        EditStatus::Applied
    }

    /// Apply a transaction, normalize, place the caret and record history.
    /// On failure the document and selection are left as they were.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let snapshot = (self.doc.clone(), self.selection);
        match self.apply_inner(tx) {
            Ok(()) => Ok(()),
            Err(err) => {
                (self.doc, self.selection) = snapshot;
                Err(err)
            }
        }
    }

    fn apply_inner(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let selection_before = self.selection;

        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in tx.ops {
            inverse_ops.push(apply_op_to(&mut self.doc, &mut self.selection, op)?);
        }

        let mut converged = false;
        for _ in 0..self.config.max_normalize_iterations {
            let ops = next_normalize_ops(&self.doc);
            if ops.is_empty() {
                converged = true;
                break;
            }
            for op in ops {
                inverse_ops.push(apply_op_to(&mut self.doc, &mut self.selection, op)?);
            }
        }
        if !converged {
            return Err(ApplyError::NormalizeDidNotConverge);
        }

        if let Some(offset) = tx.cursor_after {
            self.selection = Selection::collapsed(point_from_offset(&self.doc, offset));
        }
        self.selection = self.normalized_selection(self.selection);

        if inverse_ops.is_empty() {
            return Ok(());
        }
        inverse_ops.reverse();
        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after: self.selection,
            recipient: self.pending_recipient.take(),
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }
        Ok(())
    }

    fn splice_tx(
        &self,
        range: Range<usize>,
        nodes: Vec<Node>,
        source: &str,
    ) -> Result<Transaction, ApplyError> {
        let mut builder = TransactionBuilder::new(&self.doc);
        let cursor = builder.splice(range, nodes)?;
        Ok(builder.finish().cursor_after(cursor).source(source))
    }

    fn gif_tx(&self, url: &str) -> Result<Transaction, ApplyError> {
        let mut builder = TransactionBuilder::new(&self.doc);
        let existing: Vec<usize> = self
            .doc
            .chips()
            .filter(|(_, chip)| matches!(chip, Chip::Gif { .. }))
            .map(|(ix, _)| ix)
            .collect();
        for ix in existing.into_iter().rev() {
            builder.push(Op::RemoveNode { index: ix })?;
        }
        let end = builder.doc().canonical_len();
        let inserted = builder.insert_nodes(end, vec![Node::Chip(Chip::gif(url))])?;
        Ok(builder
            .finish()
            .cursor_after(end + inserted)
            .source("command:gif.insert"))
    }

    fn strip_prefix_tx(&self, prefix_len: usize) -> Result<Transaction, ApplyError> {
        let cursor = self.cursor();
        let mut builder = TransactionBuilder::new(&self.doc);
        let removed = builder.remove_range(0..prefix_len)?;
        Ok(builder
            .finish()
            .cursor_after(cursor.saturating_sub(removed.len()))
            .source("command:whisper.bind"))
    }

    fn commit(&mut self, tx: Result<Transaction, ApplyError>) -> EditStatus {
        let result = tx.and_then(|tx| {
            if tx.is_empty() {
                return Ok(false);
            }
            self.apply(tx).map(|()| true)
        });
        match result {
            Ok(false) => EditStatus::Unchanged,
            Ok(true) => {
                self.after_edit(true);
                EditStatus::Applied
            }
            Err(err) => {
                warn!(%err, "edit failed; moving caret to end of content");
                self.selection = Selection::collapsed(Point::end_of(&self.doc));
                self.after_edit(true);
                EditStatus::Recovered
            }
        }
    }

    fn normalized_selection(&self, selection: Selection) -> Selection {
        Selection {
            anchor: normalize_point(&self.doc, selection.anchor),
            focus: normalize_point(&self.doc, selection.focus),
        }
    }

    /// Range of the open trigger of `kind` through the caret, or the current
    /// selection when no such trigger is open.
    fn trigger_range(&self, kind: TriggerKind) -> Range<usize> {
        if self.selection.is_collapsed() {
            let cursor = self.cursor();
            if let Some(trigger) = detect_trigger(&self.doc, cursor) {
                if trigger.kind == kind {
                    return trigger.anchor..cursor;
                }
            }
        }
        self.selection_range()
    }

    fn unit_before(&self, cursor: usize) -> Option<Range<usize>> {
        let spans = self.doc.spans();
        let ix = spans
            .iter()
            .position(|span| span.start < cursor && cursor <= span.end)?;
        match &self.doc.children[ix] {
            Node::Text(t) => {
                let ch = t.text.char_before_utf16(cursor - spans[ix].start)?;
                Some(cursor - ch.len_utf16()..cursor)
            }
            Node::Chip(_) | Node::LineBreak => Some(spans[ix].clone()),
        }
    }

    fn unit_after(&self, cursor: usize) -> Option<Range<usize>> {
        let spans = self.doc.spans();
        let ix = spans
            .iter()
            .position(|span| span.start <= cursor && cursor < span.end)?;
        match &self.doc.children[ix] {
            Node::Text(t) => {
                let ch = t.text.char_after_utf16(cursor - spans[ix].start)?;
                Some(cursor..cursor + ch.len_utf16())
            }
            Node::Chip(_) | Node::LineBreak => Some(spans[ix].clone()),
        }
    }

    fn bind_recipient(&mut self, player: Player, prefix_len: usize) -> EditStatus {
        debug!(player_id = %player.id, "binding whisper recipient");
        let status = if prefix_len > 0 {
            self.pending_recipient = Some(RecipientChange {
                before: self.whisper_recipient.clone(),
                after: Some(player.clone()),
            });
            let tx = self.strip_prefix_tx(prefix_len);
            let status = self.commit(tx);
            self.pending_recipient = None;
            status
        } else {
            EditStatus::Applied
        };
        self.whisper_recipient = Some(player.clone());
        self.events.push(ComposerEvent::WhisperRecipient {
            player: Some(player),
        });
        status
    }

    fn set_recipient(&mut self, player: Option<Player>) {
        if self.whisper_recipient != player {
            self.whisper_recipient = player.clone();
            self.events.push(ComposerEvent::WhisperRecipient { player });
        }
    }

    /// Bind `/r` to the last whisper partner and `/w <name> ` to a directory
    /// player with exactly that name.
    fn resolve_slash_command(&mut self, value: &str) -> bool {
        let Some(command) = parse_slash_command(value) else {
            return false;
        };
        let prefix_len = command.prefix_len();
        let separated = value
            .slice_utf16(0..prefix_len)
            .ends_with(char::is_whitespace);
        let target = match &command {
            SlashCommand::Reply { .. } if separated => self.last_whisper_partner.clone(),
            SlashCommand::Whisper {
                query,
                terminated: true,
                ..
            } => self
                .directory
                .iter()
                .find(|player| player.name.to_lowercase() == query.to_lowercase())
                .cloned(),
            _ => None,
        };
        let Some(player) = target else {
            return false;
        };
        self.bind_recipient(player, prefix_len);
        true
    }

    fn after_edit(&mut self, resolve_slash: bool) {
        if self.composing {
            self.composition_dirty = true;
            return;
        }
        self.sync_state(resolve_slash);
    }

    /// Re-derive everything the host observes and queue what changed.
    /// Slash prefixes are only consumed after user edits, so undo can bring
    /// a prefix back.
    fn sync_state(&mut self, resolve_slash: bool) {
        let value = self.value();
        let slash = parse_slash_command(&value);
        // A prefix brought back by undo stays until the user edits it.
        if resolve_slash && slash != self.slash && self.resolve_slash_command(&value) {
            // `bind_recipient` committed a transaction, which re-entered here.
            return;
        }

        if value != self.last_value {
            self.last_value = value.clone();
            self.events.push(ComposerEvent::Changed {
                value: value.clone(),
            });
        }

        let trigger = if self.selection.is_collapsed() {
            detect_trigger(&self.doc, clamp_offset(&self.doc, self.cursor()))
        } else {
            None
        };
        self.update_trigger(trigger);

        if slash != self.slash {
            self.slash = slash.clone();
            self.events
                .push(ComposerEvent::SlashCommand { command: slash });
        }
    }

    fn update_trigger(&mut self, next: Option<Trigger>) {
        let of_kind = |trigger: &Option<Trigger>, kind: TriggerKind| {
            trigger.clone().filter(|t| t.kind == kind)
        };
        let prev_mention = of_kind(&self.trigger, TriggerKind::Mention);
        let next_mention = of_kind(&next, TriggerKind::Mention);
        if prev_mention != next_mention {
            trace!(trigger = ?next_mention, "mention trigger changed");
            self.events.push(ComposerEvent::MentionTrigger {
                trigger: next_mention,
            });
        }
        let prev_match = of_kind(&self.trigger, TriggerKind::Match);
        let next_match = of_kind(&next, TriggerKind::Match);
        if prev_match != next_match {
            trace!(trigger = ?next_match, "match trigger changed");
            self.events.push(ComposerEvent::MatchTrigger {
                trigger: next_match,
            });
        }
        self.trigger = next;
    }
}

/// Chips whose token would not parse back to themselves are refused, so a
/// stored message never loses them on reload.
fn accepts_chip(chip: &Chip) -> bool {
    let ok = chip.is_encodable();
    if !ok {
        warn!(
            kind = chip.kind().as_str(),
            token = %chip.token(),
            "refusing chip that does not round-trip"
        );
    }
    ok
}

/// Literal text as nodes: runs of text separated by line breaks. Token
/// syntax inside `text` stays literal.
fn literal_nodes(text: &str) -> Vec<Node> {
    let mut nodes: Vec<Node> = Vec::new();
    for (ix, line) in text.split('\n').enumerate() {
        if ix > 0 {
            nodes.push(Node::LineBreak);
        }
        if !line.is_empty() {
            nodes.push(Node::text(line));
        }
    }
    nodes
}
