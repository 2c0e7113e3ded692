//! The shared document buffer.
//!
//! A [`Document`] owns the text (a [`Rope`]), one style byte per character, per-line fold levels
//! and markers, the undo history, and the list of views attached to it. Positions are character
//! offsets; lines are 0-based and end with whatever line ending the text contains (`"\r\n"`,
//! `'\r'` or `'\n'`).
//!
//! Every primitive change produces [`ModificationEvent`]s. Subscribers registered with
//! [`Document::subscribe`] receive them in order; while an undo group is open they are held back
//! and released when the outermost group closes, with
//! [`ModificationFlags::LAST_STEP_IN_UNDO_REDO`] set on the final one.
//!
//! Carets of attached views are tracked by the document itself and shifted synchronously on
//! every primitive, so code running inside an undo group always sees up-to-date positions.

use crate::encoding::{EncodingError, TextEncoding};
use crate::event::{
    ModificationEvent, ModificationFlags, ModificationKind, ModificationListener, SubscriberId,
};
use crate::fold::{FOLD_LEVEL_BASE, FOLD_LEVEL_HEADER_FLAG, FOLD_LEVEL_WHITE_FLAG};
use crate::line_ending::EolMode;
use crate::styling::{Lexer, StyleTable, Styler};
use crate::undo::{EolSwitch, UndoAction, UndoHistory, UndoStep};
use crate::view::ViewId;
use ropey::Rope;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::time::SystemTime;
use url::Url;

/// Default number of undo groups kept per document.
pub const DEFAULT_MAX_UNDO: usize = 1000;

/// Errors raised by document operations.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// A position or range was outside `0..=len`.
    #[error("position {pos} is out of bounds (document length {len})")]
    InvalidPosition {
        /// Offending position.
        pos: usize,
        /// Document length at the time.
        len: usize,
    },
    /// The document is read-only.
    #[error("document is read-only")]
    ReadOnly,
    /// The text cannot be represented in the document encoding; nothing was written.
    #[error("cannot encode text as {encoding} at position {position}")]
    Encode {
        /// Target encoding name.
        encoding: String,
        /// Character offset of the first unencodable character.
        position: usize,
    },
    /// The bytes could not be decoded.
    #[error("cannot decode content as {encoding}")]
    Decode {
        /// Encoding that failed.
        encoding: String,
    },
    /// Writer failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<EncodingError> for DocumentError {
    fn from(err: EncodingError) -> Self {
        match err {
            EncodingError::Unencodable {
                encoding, position, ..
            } => Self::Encode {
                encoding: encoding.to_string(),
                position,
            },
            EncodingError::Invalid { encoding, .. } => Self::Decode {
                encoding: encoding.to_string(),
            },
            EncodingError::Unknown(name) => Self::Decode { encoding: name },
        }
    }
}

/// Per-view positions tracked by the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewCursor {
    /// Caret offset.
    pub caret: usize,
    /// Selection anchor; equal to `caret` when nothing is selected.
    pub anchor: usize,
    /// Start of the target range used by `replace_target`.
    pub target_start: usize,
    /// End of the target range.
    pub target_end: usize,
}

impl ViewCursor {
    fn shift(&mut self, event: &ModificationEvent) {
        self.caret = event.shift_offset(self.caret);
        self.anchor = event.shift_offset(self.anchor);
        self.target_start = event.shift_offset(self.target_start);
        self.target_end = event.shift_offset(self.target_end);
    }
}

/// Marker glyphs a view may draw in the margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MarkerSymbol {
    /// Filled circle.
    #[default]
    Circle,
    /// Right-pointing arrow.
    Arrow,
    /// Rectangle.
    Rectangle,
    /// Full-line background colour.
    Background,
    /// Nothing drawn; used for bookkeeping markers.
    Empty,
}

/// Number of marker ids available per document.
pub const MARKER_MAX: u8 = 32;

/// Type-keyed scratch storage shared by all views of one major-mode class.
#[derive(Default)]
pub struct SharedInfo {
    values: HashMap<TypeId, Box<dyn Any>>,
}

impl std::fmt::Debug for SharedInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedInfo")
            .field("entries", &self.values.len())
            .finish()
    }
}

impl SharedInfo {
    /// Borrow the value of type `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutably borrow the value of type `T`.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    /// Store a value, returning the previous one of the same type.
    pub fn insert<T: Any>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Get the value of type `T`, creating it with `init` if missing.
    pub fn get_or_insert_with<T: Any>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        self.values
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(init()))
            .downcast_mut::<T>()
            .expect("shared info entries are keyed by their own type")
    }

    /// Remove the value of type `T`.
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    None,
    Undo,
    Redo,
}

/// An in-memory styled text document.
pub struct Document {
    text: Rope,
    styles: Vec<u8>,
    style_bits: u8,
    fold_levels: Vec<u32>,
    fold_expanded: Vec<bool>,
    markers: Vec<u32>,
    marker_symbols: BTreeMap<u8, MarkerSymbol>,

    eol_mode: EolMode,
    encoding: TextEncoding,
    url: Option<Url>,
    read_only: bool,
    permanent: bool,
    saved_timestamp: Option<SystemTime>,

    undo: UndoHistory,
    replay: Replay,

    subscribers: Vec<(SubscriberId, ModificationListener)>,
    next_subscriber: u64,
    pending: Vec<ModificationEvent>,
    journal: Vec<ModificationEvent>,
    views: BTreeMap<ViewId, ViewCursor>,

    shared_info: HashMap<String, SharedInfo>,
    style_table: StyleTable,
    lexer: Option<Box<dyn Lexer>>,
    styling_position: usize,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.length())
            .field("lines", &self.line_count())
            .field("eol_mode", &self.eol_mode)
            .field("encoding", &self.encoding)
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("read_only", &self.read_only)
            .field("modified", &self.is_modified())
            .field("views", &self.views.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document using the platform line ending and UTF-8.
    pub fn new() -> Self {
        Self {
            text: Rope::new(),
            styles: Vec::new(),
            style_bits: 7,
            fold_levels: vec![FOLD_LEVEL_BASE],
            fold_expanded: vec![true],
            markers: vec![0],
            marker_symbols: BTreeMap::new(),
            eol_mode: EolMode::platform_default(),
            encoding: TextEncoding::Utf8,
            url: None,
            read_only: false,
            permanent: false,
            saved_timestamp: None,
            undo: UndoHistory::new(DEFAULT_MAX_UNDO),
            replay: Replay::None,
            subscribers: Vec::new(),
            next_subscriber: 1,
            pending: Vec::new(),
            journal: Vec::new(),
            views: BTreeMap::new(),
            shared_info: HashMap::new(),
            style_table: StyleTable::default(),
            lexer: None,
            styling_position: 0,
        }
    }

    /// Create a document holding `text`, with the line ending mode detected from it.
    pub fn from_text(text: &str) -> Self {
        let mut doc = Self::new();
        doc.install_text(text);
        doc.eol_mode = EolMode::detect(text);
        doc
    }

    // ---------------------------------------------------------------------------------------
    // Properties

    /// Line ending mode used for new lines and when saving.
    pub fn eol_mode(&self) -> EolMode {
        self.eol_mode
    }

    /// Set the line ending mode without touching the text.
    pub fn set_eol_mode(&mut self, mode: EolMode) {
        self.eol_mode = mode;
    }

    /// The separator string of the current line ending mode.
    pub fn linesep(&self) -> &'static str {
        self.eol_mode.as_str()
    }

    /// Encoding used when saving.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Set the encoding used when saving.
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    /// Returns `true` if the document was loaded verbatim as binary.
    pub fn is_binary(&self) -> bool {
        self.encoding == TextEncoding::Binary
    }

    /// The resource this document was loaded from.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Set the resource URL.
    pub fn set_url(&mut self, url: Option<Url>) {
        self.url = url;
    }

    /// Returns `true` if edits are rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Allow or reject edits.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Permanent documents are excluded from close prompts and document listings.
    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// Mark the document permanent.
    pub fn set_permanent(&mut self, permanent: bool) {
        self.permanent = permanent;
    }

    /// Modification time of the resource when last loaded or saved.
    pub fn saved_timestamp(&self) -> Option<SystemTime> {
        self.saved_timestamp
    }

    /// Record the resource modification time.
    pub fn set_saved_timestamp(&mut self, timestamp: Option<SystemTime>) {
        self.saved_timestamp = timestamp;
    }

    /// Returns `true` if the text differs from the last save point.
    pub fn is_modified(&self) -> bool {
        !self.undo.is_clean()
    }

    /// Mark the current state as saved.
    pub fn set_save_point(&mut self) {
        self.undo.mark_clean();
    }

    /// Number of style bits (5 or 7).
    pub fn style_bits(&self) -> u8 {
        self.style_bits
    }

    /// Set the number of style bits; values other than 5 are treated as 7.
    pub fn set_style_bits(&mut self, bits: u8) {
        self.style_bits = if bits == 5 { 5 } else { 7 };
    }

    fn style_mask(&self) -> u8 {
        ((1u16 << self.style_bits) - 1) as u8
    }

    /// Style id to category mapping of the current major mode.
    pub fn style_table(&self) -> &StyleTable {
        &self.style_table
    }

    /// Replace the style table.
    pub fn set_style_table(&mut self, table: StyleTable) {
        self.style_table = table;
    }

    /// Scratch storage for the given major-mode class.
    pub fn shared_info(&self, class: &str) -> Option<&SharedInfo> {
        self.shared_info.get(class)
    }

    /// Mutable scratch storage for the given major-mode class, created on demand.
    pub fn shared_info_mut(&mut self, class: &str) -> &mut SharedInfo {
        self.shared_info.entry(class.to_string()).or_default()
    }

    // ---------------------------------------------------------------------------------------
    // Text access

    /// Length in characters.
    pub fn length(&self) -> usize {
        self.text.len_chars()
    }

    /// Returns `true` if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// The whole text.
    pub fn text(&self) -> String {
        self.text.to_string()
    }

    /// The underlying rope.
    pub fn rope(&self) -> &Rope {
        &self.text
    }

    fn check_range(&self, start: usize, end: usize) -> Result<(), DocumentError> {
        let len = self.length();
        if start > len || end > len {
            return Err(DocumentError::InvalidPosition {
                pos: start.max(end),
                len,
            });
        }
        Ok(())
    }

    /// Text of `[start, end)`; the bounds may be given in either order.
    pub fn get_text_range(&self, start: usize, end: usize) -> Result<String, DocumentError> {
        self.check_range(start, end)?;
        let (start, end) = (start.min(end), start.max(end));
        Ok(self.text.slice(start..end).to_string())
    }

    /// Text and style bytes of `[start, end)`.
    pub fn get_styled_range(
        &self,
        start: usize,
        end: usize,
    ) -> Result<(String, Vec<u8>), DocumentError> {
        let text = self.get_text_range(start, end)?;
        let (start, end) = (start.min(end), start.max(end));
        Ok((text, self.styles[start..end].to_vec()))
    }

    /// Character at `pos`.
    pub fn char_at(&self, pos: usize) -> Option<char> {
        (pos < self.length()).then(|| self.text.char(pos))
    }

    /// Style byte at `pos` (0 past the end).
    pub fn style_at(&self, pos: usize) -> u8 {
        self.styles.get(pos).copied().unwrap_or(0)
    }

    /// Number of lines; a trailing line ending starts a final empty line.
    pub fn line_count(&self) -> usize {
        self.text.len_lines()
    }

    /// Line containing `pos` (clamped to the document).
    pub fn line_from_position(&self, pos: usize) -> usize {
        self.text.char_to_line(pos.min(self.length()))
    }

    /// First position of `line` (the document length past the last line).
    pub fn position_from_line(&self, line: usize) -> usize {
        if line >= self.line_count() {
            return self.length();
        }
        self.text.line_to_char(line)
    }

    /// Position just before the line ending of `line`.
    pub fn line_end_position(&self, line: usize) -> usize {
        if line >= self.line_count() {
            return self.length();
        }
        let start = self.text.line_to_char(line);
        let slice = self.text.line(line);
        start + slice.len_chars() - eol_len(&slice)
    }

    /// Text of `line` including its line ending.
    pub fn get_line(&self, line: usize) -> String {
        if line >= self.line_count() {
            return String::new();
        }
        self.text.line(line).to_string()
    }

    /// Text of `line` without its line ending.
    pub fn get_line_text(&self, line: usize) -> String {
        if line >= self.line_count() {
            return String::new();
        }
        let start = self.position_from_line(line);
        let end = self.line_end_position(line);
        self.text.slice(start..end).to_string()
    }

    /// Indentation of `line` in columns, expanding tabs to `tab_width` stops.
    pub fn line_indentation(&self, line: usize, tab_width: usize) -> usize {
        let tab_width = tab_width.max(1);
        let mut col = 0;
        for ch in self.get_line_text(line).chars() {
            match ch {
                ' ' => col += 1,
                '\t' => col = (col / tab_width + 1) * tab_width,
                _ => break,
            }
        }
        col
    }

    /// Position of the first non-blank character of `line` (or its end).
    pub fn line_indent_position(&self, line: usize) -> usize {
        let start = self.position_from_line(line);
        let indent = self
            .get_line_text(line)
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .count();
        start + indent
    }

    /// Display column of `pos`, expanding tabs to `tab_width` stops.
    pub fn column(&self, pos: usize, tab_width: usize) -> usize {
        let tab_width = tab_width.max(1);
        let pos = pos.min(self.length());
        let line_start = self.position_from_line(self.line_from_position(pos));
        let mut col = 0;
        for ch in self.text.slice(line_start..pos).chars() {
            if ch == '\t' {
                col = (col / tab_width + 1) * tab_width;
            } else {
                col += 1;
            }
        }
        col
    }

    /// Position at display `column` of `line`, clamped to the line end.
    pub fn find_column(&self, line: usize, column: usize, tab_width: usize) -> usize {
        let tab_width = tab_width.max(1);
        let start = self.position_from_line(line);
        let end = self.line_end_position(line);
        let mut col = 0;
        let mut pos = start;
        for ch in self.text.slice(start..end).chars() {
            let next = if ch == '\t' {
                (col / tab_width + 1) * tab_width
            } else {
                col + 1
            };
            if next > column {
                break;
            }
            col = next;
            pos += 1;
        }
        pos
    }

    // ---------------------------------------------------------------------------------------
    // Editing

    /// Insert `text` at `pos`.
    pub fn insert(&mut self, pos: usize, text: &str) -> Result<(), DocumentError> {
        if self.read_only {
            return Err(DocumentError::ReadOnly);
        }
        self.check_range(pos, pos)?;
        if text.is_empty() {
            return Ok(());
        }
        self.insert_raw(pos, text, None);
        if self.replay == Replay::None {
            self.undo.record(UndoAction::Insert {
                position: pos,
                text: text.to_string(),
            });
        }
        self.flush_if_idle();
        Ok(())
    }

    /// Delete `n` characters starting at `pos`.
    pub fn delete(&mut self, pos: usize, n: usize) -> Result<(), DocumentError> {
        if self.read_only {
            return Err(DocumentError::ReadOnly);
        }
        let end = pos.saturating_add(n);
        self.check_range(pos, end)?;
        if n == 0 {
            return Ok(());
        }
        let (text, styles) = self.delete_raw(pos, n);
        if self.replay == Replay::None {
            self.undo.record(UndoAction::Delete {
                position: pos,
                text,
                styles,
            });
        }
        self.flush_if_idle();
        Ok(())
    }

    /// Replace `[start, end)` with `text` as a single undo step.
    pub fn replace_range(&mut self, start: usize, end: usize, text: &str) -> Result<(), DocumentError> {
        if self.read_only {
            return Err(DocumentError::ReadOnly);
        }
        self.check_range(start, end)?;
        let (start, end) = (start.min(end), start.max(end));
        self.begin_undo();
        let result = self
            .delete(start, end - start)
            .and_then(|()| self.insert(start, text));
        self.end_undo();
        result
    }

    /// Replace the entire content without recording undo, leaving the document unmodified.
    ///
    /// Used to install freshly loaded text.
    pub fn reset_text(&mut self, text: &str) {
        let old_len = self.length();
        if old_len > 0 {
            self.delete_raw(0, old_len);
        }
        self.undo.close_all();
        self.flush_pending();
        if !text.is_empty() {
            self.insert_raw(0, text, None);
        }
        self.flush_pending();
        self.undo.clear();
    }

    fn install_text(&mut self, text: &str) {
        self.text = Rope::from_str(text);
        self.styles = vec![0; self.text.len_chars()];
        let lines = self.text.len_lines();
        self.fold_levels = vec![FOLD_LEVEL_BASE; lines];
        self.fold_expanded = vec![true; lines];
        self.markers = vec![0; lines];
        self.undo.clear();
    }

    fn insert_raw(&mut self, pos: usize, text: &str, styles: Option<&[u8]>) {
        let line = self.line_from_position(pos);
        let at_line_start = self.position_from_line(line) == pos;
        let char_len = text.chars().count();

        let mut before = ModificationEvent::new(ModificationKind::BeforeInsert, pos, char_len, line);
        before.text = Some(text.to_string());
        self.emit(before);

        let old_lines = self.line_count();
        self.text.insert(pos, text);
        let fill = styles
            .filter(|s| s.len() == char_len)
            .map(<[u8]>::to_vec)
            .unwrap_or_else(|| vec![0; char_len]);
        self.styles.splice(pos..pos, fill);
        let lines_added = self.line_count() as isize - old_lines as isize;
        self.adjust_line_data(line, lines_added, at_line_start);

        tracing::trace!(pos, len = char_len, lines_added, "insert");

        let mut event = ModificationEvent::new(ModificationKind::Insert, pos, char_len, line);
        event.text = Some(text.to_string());
        event.lines_added = lines_added;
        for cursor in self.views.values_mut() {
            cursor.shift(&event);
        }
        self.emit(event);
        self.restyle_from(pos);
    }

    fn delete_raw(&mut self, pos: usize, n: usize) -> (String, Vec<u8>) {
        let line = self.line_from_position(pos);
        let removed = self.text.slice(pos..pos + n).to_string();

        let mut before = ModificationEvent::new(ModificationKind::BeforeDelete, pos, n, line);
        before.text = Some(removed.clone());
        self.emit(before);

        let old_lines = self.line_count();
        self.text.remove(pos..pos + n);
        let styles: Vec<u8> = self.styles.drain(pos..pos + n).collect();
        let lines_added = self.line_count() as isize - old_lines as isize;
        self.adjust_line_data(line, lines_added, false);

        tracing::trace!(pos, len = n, lines_added, "delete");

        let mut event = ModificationEvent::new(ModificationKind::Delete, pos, n, line);
        event.text = Some(removed.clone());
        event.lines_added = lines_added;
        for cursor in self.views.values_mut() {
            cursor.shift(&event);
        }
        self.emit(event);
        self.restyle_from(pos);
        (removed, styles)
    }

    /// Keep the per-line vectors in step with the line count.
    fn adjust_line_data(&mut self, line: usize, lines_added: isize, at_line_start: bool) {
        if lines_added > 0 {
            let count = lines_added as usize;
            let level = self.fold_levels.get(line).copied().unwrap_or(FOLD_LEVEL_BASE)
                & !(FOLD_LEVEL_HEADER_FLAG | FOLD_LEVEL_WHITE_FLAG);
            // Inserting at a line start pushes the existing line (and its markers) down.
            let at = if at_line_start { line } else { line + 1 }.min(self.markers.len());
            self.markers.splice(at..at, std::iter::repeat_n(0, count));
            let at = (line + 1).min(self.fold_levels.len());
            self.fold_levels.splice(at..at, std::iter::repeat_n(level, count));
            self.fold_expanded.splice(at..at, std::iter::repeat_n(true, count));
        } else if lines_added < 0 {
            let count = lines_added.unsigned_abs();
            let from = (line + 1).min(self.markers.len());
            let to = (from + count).min(self.markers.len());
            let merged = self.markers.drain(from..to).fold(0, |acc, m| acc | m);
            if let Some(slot) = self.markers.get_mut(line) {
                *slot |= merged;
            }
            let to = (from + count).min(self.fold_levels.len());
            self.fold_levels.drain(from..to);
            self.fold_expanded.drain(from..to);
        }
        let lines = self.line_count();
        self.markers.resize(lines, 0);
        self.fold_levels.resize(lines, FOLD_LEVEL_BASE);
        self.fold_expanded.resize(lines, true);
    }

    // ---------------------------------------------------------------------------------------
    // Undo

    /// Open an undo group. Groups nest; only the outermost pair matters.
    pub fn begin_undo(&mut self) {
        self.undo.begin_group();
    }

    /// Close an undo group, releasing held-back notifications when the outermost group closes.
    pub fn end_undo(&mut self) {
        if self.undo.end_group() {
            self.flush_pending();
        }
    }

    /// Returns `true` if there is something to undo.
    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    /// Returns `true` if there is something to redo.
    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Number of undoable groups.
    pub fn undo_depth(&self) -> usize {
        self.undo.undo_depth()
    }

    /// Number of redoable groups.
    pub fn redo_depth(&self) -> usize {
        self.undo.redo_depth()
    }

    /// Discard the undo history.
    pub fn clear_undo(&mut self) {
        self.undo.clear();
    }

    /// Undo the most recent group. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        if self.undo.in_group() {
            self.undo.close_all();
            self.flush_pending();
        }
        let Some(steps) = self.undo.pop_undo_group() else {
            return false;
        };

        self.replay = Replay::Undo;
        for step in &steps {
            match &step.action {
                UndoAction::Insert { position, text } => {
                    self.delete_raw(*position, text.chars().count());
                }
                UndoAction::Delete {
                    position,
                    text,
                    styles,
                } => {
                    self.insert_raw(*position, text, Some(styles));
                }
            }
        }
        self.replay = Replay::None;

        match steps.first().and_then(|s| s.eol_switch) {
            Some(switch) => self.eol_mode = switch.before,
            None => self.check_eol_after_replay(&steps),
        }
        self.undo.push_redo_group(steps);
        self.flush_pending();
        true
    }

    /// Redo the next group. Returns `false` if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        if self.undo.in_group() {
            self.undo.close_all();
            self.flush_pending();
        }
        let Some(steps) = self.undo.pop_redo_group() else {
            return false;
        };

        self.replay = Replay::Redo;
        for step in &steps {
            match &step.action {
                UndoAction::Insert { position, text } => {
                    self.insert_raw(*position, text, None);
                }
                UndoAction::Delete { position, text, .. } => {
                    self.delete_raw(*position, text.chars().count());
                }
            }
        }
        self.replay = Replay::None;

        match steps.first().and_then(|s| s.eol_switch) {
            Some(switch) => self.eol_mode = switch.after,
            None => self.check_eol_after_replay(&steps),
        }
        self.undo.push_undo_group(steps);
        self.flush_pending();
        true
    }

    /// Re-detect the line ending mode if the replayed group touched only line endings on
    /// (nearly) every line.
    fn check_eol_after_replay(&mut self, steps: &[UndoStep]) {
        let total = steps.len();
        let linesep = steps
            .iter()
            .filter(|s| matches!(s.action.text(), "\n" | "\r" | "\r\n"))
            .count();
        if total > 0 && linesep == total && linesep + 1 >= self.line_count() {
            let detected = EolMode::detect(&self.text());
            if detected != self.eol_mode {
                tracing::debug!(from = %self.eol_mode, to = %detected, "line ending mode restored by undo");
                self.eol_mode = detected;
            }
        }
    }

    /// Rewrite every line ending to `mode` and make it the document mode.
    ///
    /// The rewrite is a single undo step that also restores the previous mode when undone.
    /// Returns `false` (and records nothing) if no line ending had to change.
    pub fn convert_eols(&mut self, mode: EolMode) -> Result<bool, DocumentError> {
        if self.read_only {
            return Err(DocumentError::ReadOnly);
        }
        let before = self.eol_mode;
        let target = mode.as_str();
        let mut changes: Vec<(usize, &'static str)> = Vec::new();
        let mut chars = self.text.chars().enumerate().peekable();
        while let Some((idx, ch)) = chars.next() {
            let sep = match ch {
                '\r' if chars.peek().map(|(_, c)| *c) == Some('\n') => {
                    chars.next();
                    "\r\n"
                }
                '\r' => "\r",
                '\n' => "\n",
                _ => continue,
            };
            if sep != target {
                changes.push((idx, sep));
            }
        }

        self.eol_mode = mode;
        if changes.is_empty() {
            return Ok(false);
        }

        self.begin_undo();
        let mut result = Ok(());
        for (pos, sep) in changes.into_iter().rev() {
            result = self
                .delete(pos, sep.chars().count())
                .and_then(|()| self.insert(pos, target));
            if result.is_err() {
                break;
            }
        }
        self.undo.annotate_open_group(EolSwitch {
            before,
            after: mode,
        });
        self.end_undo();
        result.map(|()| true)
    }

    // ---------------------------------------------------------------------------------------
    // Saving

    /// Serialize the document to `writer`.
    ///
    /// The text is written as stored, line endings included, and encoded with the document
    /// encoding. The whole output is encoded before the writer is touched, so an
    /// [`DocumentError::Encode`] failure leaves the destination intact.
    pub fn save_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize, DocumentError> {
        let bytes = self.encoding.encode(&self.text())?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(bytes.len())
    }

    // ---------------------------------------------------------------------------------------
    // Notifications

    /// Register a modification listener.
    pub fn subscribe(&mut self, listener: ModificationListener) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.push((id, listener));
        id
    }

    /// Remove a modification listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn current_flags(&self) -> ModificationFlags {
        match self.replay {
            Replay::None => ModificationFlags::USER,
            Replay::Undo => ModificationFlags::UNDO,
            Replay::Redo => ModificationFlags::REDO,
        }
    }

    fn emit(&mut self, mut event: ModificationEvent) {
        event.flags |= self.current_flags();
        self.pending.push(event);
    }

    fn flush_if_idle(&mut self) {
        if !self.undo.in_group() && self.replay == Replay::None {
            self.flush_pending();
        }
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut events = std::mem::take(&mut self.pending);
        let multi = events.iter().filter(|e| e.is_text_change()).count() > 1;
        if multi {
            for event in &mut events {
                event.flags |= ModificationFlags::MULTI_STEP;
            }
        }
        if let Some(last) = events.last_mut() {
            last.flags |= ModificationFlags::LAST_STEP_IN_UNDO_REDO;
        }
        for event in events {
            for (_, listener) in self.subscribers.iter_mut() {
                listener(&event);
            }
            if !self.views.is_empty() {
                self.journal.push(event);
            }
        }
    }

    // ---------------------------------------------------------------------------------------
    // Views

    /// Register a view; its caret starts at 0.
    pub fn attach_view(&mut self, view: ViewId) {
        self.views.entry(view).or_default();
    }

    /// Unregister a view. Returns the number of views still attached.
    pub fn detach_view(&mut self, view: ViewId) -> usize {
        self.views.remove(&view);
        if self.views.is_empty() {
            self.journal.clear();
        }
        self.views.len()
    }

    /// Ids of the attached views.
    pub fn view_ids(&self) -> Vec<ViewId> {
        self.views.keys().copied().collect()
    }

    /// Tracked positions of `view`.
    pub fn view_cursor(&self, view: ViewId) -> Option<ViewCursor> {
        self.views.get(&view).copied()
    }

    /// Mutable tracked positions of `view`.
    pub fn view_cursor_mut(&mut self, view: ViewId) -> Option<&mut ViewCursor> {
        self.views.get_mut(&view)
    }

    /// Take the notifications delivered since the last call, for forwarding to view services.
    pub fn take_journal(&mut self) -> Vec<ModificationEvent> {
        std::mem::take(&mut self.journal)
    }

    // ---------------------------------------------------------------------------------------
    // Styling

    /// Install the lexer that styles this document and restyle everything.
    pub fn set_lexer(&mut self, lexer: Option<Box<dyn Lexer>>) {
        self.lexer = lexer;
        self.colourise(0, self.length());
    }

    /// Returns `true` if a lexer is installed.
    pub fn has_lexer(&self) -> bool {
        self.lexer.is_some()
    }

    /// Forward an extra property to the installed lexer.
    pub fn set_lexer_property(&mut self, name: &str, value: &str) {
        if let Some(lexer) = self.lexer.as_mut() {
            lexer.set_property(name, value);
        }
    }

    /// Style `[start, end)` with the installed lexer, starting from a safe position.
    pub fn colourise(&mut self, start: usize, end: usize) {
        self.run_lexer(start, end);
        self.flush_if_idle();
    }

    fn run_lexer(&mut self, start: usize, end: usize) {
        let Some(mut lexer) = self.lexer.take() else {
            return;
        };
        let end = end.min(self.length());
        let start = lexer.adjust_start(self, start.min(end));
        lexer.style_text(self, start, end);
        self.lexer = Some(lexer);
    }

    fn restyle_from(&mut self, pos: usize) {
        if self.lexer.is_some() {
            self.run_lexer(pos, self.length());
        }
    }

    /// Set the style of `n` characters starting at `start`.
    pub fn set_style_range(&mut self, start: usize, n: usize, style: u8) -> Result<(), DocumentError> {
        self.check_range(start, start.saturating_add(n))?;
        self.write_styles(start, &vec![style; n]);
        self.flush_if_idle();
        Ok(())
    }

    /// Begin a `set_styling` run at `pos`.
    pub fn start_styling(&mut self, pos: usize) {
        self.styling_position = pos.min(self.length());
    }

    /// Style the next `n` characters of the current styling run.
    pub fn set_styling(&mut self, n: usize, style: u8) {
        let start = self.styling_position;
        let n = n.min(self.length().saturating_sub(start));
        self.write_styles(start, &vec![style; n]);
        self.styling_position = start + n;
        self.flush_if_idle();
    }

    fn write_styles(&mut self, start: usize, styles: &[u8]) {
        let len = self.styles.len();
        let start = start.min(len);
        let end = (start + styles.len()).min(len);
        if start == end {
            return;
        }
        let mask = self.style_mask();
        let mut changed = false;
        for (slot, style) in self.styles[start..end].iter_mut().zip(styles) {
            let style = style & mask;
            if *slot != style {
                *slot = style;
                changed = true;
            }
        }
        if changed {
            let line = self.line_from_position(start);
            self.emit(ModificationEvent::new(
                ModificationKind::StyleChange,
                start,
                end - start,
                line,
            ));
        }
    }

    // ---------------------------------------------------------------------------------------
    // Folding

    /// Fold level of `line`.
    pub fn fold_level(&self, line: usize) -> u32 {
        self.fold_levels.get(line).copied().unwrap_or(FOLD_LEVEL_BASE)
    }

    /// Set the fold level of `line`, emitting a fold-change notification if it changed.
    pub fn set_fold_level(&mut self, line: usize, level: u32) {
        let Some(slot) = self.fold_levels.get_mut(line) else {
            return;
        };
        let prev = *slot;
        if prev == level {
            return;
        }
        *slot = level;
        let position = self.position_from_line(line);
        let mut event = ModificationEvent::new(ModificationKind::FoldChange, position, 0, line);
        event.fold_level_now = level;
        event.fold_level_prev = prev;
        self.emit(event);
        self.flush_if_idle();
    }

    /// Whether the fold headed by `line` is expanded.
    pub fn fold_expanded(&self, line: usize) -> bool {
        self.fold_expanded.get(line).copied().unwrap_or(true)
    }

    /// Expand or contract the fold headed by `line`.
    pub fn set_fold_expanded(&mut self, line: usize, expanded: bool) {
        let Some(slot) = self.fold_expanded.get_mut(line) else {
            return;
        };
        if *slot == expanded {
            return;
        }
        *slot = expanded;
        let level = self.fold_level(line);
        let position = self.position_from_line(line);
        let mut event = ModificationEvent::new(ModificationKind::FoldChange, position, 0, line);
        event.fold_level_now = level;
        event.fold_level_prev = level;
        self.emit(event);
        self.flush_if_idle();
    }

    /// Flip the expansion state of the fold headed by `line`.
    pub fn toggle_fold(&mut self, line: usize) {
        let expanded = self.fold_expanded(line);
        self.set_fold_expanded(line, !expanded);
    }

    // ---------------------------------------------------------------------------------------
    // Markers

    /// Define the symbol drawn for marker `id`.
    pub fn marker_define(&mut self, id: u8, symbol: MarkerSymbol) {
        if id < MARKER_MAX {
            self.marker_symbols.insert(id, symbol);
        }
    }

    /// Symbol defined for marker `id`.
    pub fn marker_symbol(&self, id: u8) -> Option<MarkerSymbol> {
        self.marker_symbols.get(&id).copied()
    }

    /// Add marker `id` to `line`. Returns `false` for an invalid line or id.
    pub fn marker_add(&mut self, line: usize, id: u8) -> bool {
        if id >= MARKER_MAX {
            return false;
        }
        match self.markers.get_mut(line) {
            Some(slot) => {
                *slot |= 1 << id;
                true
            }
            None => false,
        }
    }

    /// Remove marker `id` from `line`.
    pub fn marker_delete(&mut self, line: usize, id: u8) {
        if id < MARKER_MAX
            && let Some(slot) = self.markers.get_mut(line)
        {
            *slot &= !(1 << id);
        }
    }

    /// Remove marker `id` from every line.
    pub fn marker_delete_all(&mut self, id: u8) {
        if id >= MARKER_MAX {
            return;
        }
        for slot in &mut self.markers {
            *slot &= !(1 << id);
        }
    }

    /// Bitmask of the markers on `line`.
    pub fn marker_get(&self, line: usize) -> u32 {
        self.markers.get(line).copied().unwrap_or(0)
    }

    /// First line at or after `from` carrying any marker in `mask`.
    pub fn marker_next(&self, from: usize, mask: u32) -> Option<usize> {
        self.markers
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, m)| *m & mask != 0)
            .map(|(line, _)| line)
    }
}

fn eol_len(slice: &ropey::RopeSlice<'_>) -> usize {
    let len = slice.len_chars();
    if len == 0 {
        return 0;
    }
    match slice.char(len - 1) {
        '\n' if len >= 2 && slice.char(len - 2) == '\r' => 2,
        '\n' | '\r' => 1,
        _ => 0,
    }
}

impl Styler for Document {
    fn length(&self) -> usize {
        Document::length(self)
    }

    fn text_range(&self, start: usize, end: usize) -> String {
        let len = Document::length(self);
        let (start, end) = (start.min(len), end.min(len));
        if start >= end {
            return String::new();
        }
        self.text.slice(start..end).to_string()
    }

    fn line_count(&self) -> usize {
        Document::line_count(self)
    }

    fn line_from_position(&self, pos: usize) -> usize {
        Document::line_from_position(self, pos)
    }

    fn position_from_line(&self, line: usize) -> usize {
        Document::position_from_line(self, line)
    }

    fn line_end_position(&self, line: usize) -> usize {
        Document::line_end_position(self, line)
    }

    fn style_at(&self, pos: usize) -> u8 {
        Document::style_at(self, pos)
    }

    fn set_styles(&mut self, start: usize, styles: &[u8]) {
        self.write_styles(start, styles);
    }

    fn fold_level(&self, line: usize) -> u32 {
        Document::fold_level(self, line)
    }

    fn set_fold_level(&mut self, line: usize, level: u32) {
        let Some(slot) = self.fold_levels.get_mut(line) else {
            return;
        };
        let prev = *slot;
        if prev == level {
            return;
        }
        *slot = level;
        let position = Document::position_from_line(self, line);
        let mut event = ModificationEvent::new(ModificationKind::FoldChange, position, 0, line);
        event.fold_level_now = level;
        event.fold_level_prev = prev;
        self.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_line_geometry_with_mixed_endings() {
        let doc = Document::from_text("a\r\nb\rc\nd");
        assert_eq!(doc.line_count(), 4);
        assert_eq!(doc.position_from_line(1), 3);
        assert_eq!(doc.line_end_position(0), 1);
        assert_eq!(doc.line_end_position(1), 4);
        assert_eq!(doc.get_line(0), "a\r\n");
        assert_eq!(doc.get_line_text(2), "c");
        assert_eq!(doc.line_from_position(5), 2);
        assert_eq!(doc.line_end_position(3), 8);
    }

    #[test]
    fn test_insert_rejects_bad_positions() {
        let mut doc = Document::from_text("abc");
        assert!(matches!(
            doc.insert(4, "x"),
            Err(DocumentError::InvalidPosition { pos: 4, len: 3 })
        ));
        doc.set_read_only(true);
        assert!(matches!(doc.insert(0, "x"), Err(DocumentError::ReadOnly)));
    }

    #[test]
    fn test_group_sets_last_step_on_final_event_only() {
        let mut doc = Document::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        doc.subscribe(Box::new(move |e: &ModificationEvent| {
            if e.is_text_change() {
                sink.borrow_mut().push(e.is_last_step());
            }
        }));

        doc.begin_undo();
        doc.insert(0, "a").unwrap();
        doc.insert(1, "b").unwrap();
        assert!(seen.borrow().is_empty());
        doc.end_undo();
        assert_eq!(*seen.borrow(), vec![false, true]);
    }

    #[test]
    fn test_markers_follow_lines() {
        let mut doc = Document::from_text("one\ntwo\nthree\n");
        doc.marker_add(2, 1);
        doc.insert(0, "zero\n").unwrap();
        assert_eq!(doc.marker_get(3), 1 << 1);
        let start = doc.position_from_line(1);
        doc.delete(start, 4).unwrap();
        assert_eq!(doc.marker_get(2), 1 << 1);
        assert_eq!(doc.marker_next(0, 1 << 1), Some(2));
    }

    #[test]
    fn test_style_bytes_follow_text() {
        let mut doc = Document::from_text("abcdef");
        doc.set_style_range(2, 2, 5).unwrap();
        doc.insert(0, "xx").unwrap();
        let (_, styles) = doc.get_styled_range(0, 8).unwrap();
        assert_eq!(styles, vec![0, 0, 0, 0, 5, 5, 0, 0]);
        doc.undo();
        let (text, styles) = doc.get_styled_range(0, 6).unwrap();
        assert_eq!(text, "abcdef");
        assert_eq!(styles, vec![0, 0, 5, 5, 0, 0]);
    }

    #[test]
    fn test_shared_info_is_keyed_by_type() {
        let mut doc = Document::new();
        *doc.shared_info_mut("PythonMode").get_or_insert_with(|| 0usize) += 3;
        assert_eq!(doc.shared_info("PythonMode").unwrap().get::<usize>(), Some(&3));
        assert!(doc.shared_info("CMode").is_none());
    }

    #[test]
    fn test_set_styling_after_text_shrank() {
        let mut doc = Document::from_text("abcdef");
        doc.start_styling(4);
        doc.delete(0, 4).unwrap();
        doc.set_styling(3, 5);
        assert_eq!(doc.style_at(0), 0);

        doc.start_styling(0);
        doc.set_styling(5, 7);
        assert_eq!((doc.style_at(0), doc.style_at(1)), (7, 7));
    }

    #[test]
    fn test_save_keeps_mixed_line_endings() {
        let doc = Document::from_text("a\r\nb\r\nc\n");
        assert_eq!(doc.eol_mode(), EolMode::Crlf);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        assert_eq!(out, b"a\r\nb\r\nc\n");
    }
}
