//! Views and editing sessions.
//!
//! A view is a window onto a [`Document`]: it owns indentation and display settings, scroll
//! state and a list of [`ViewService`]s that observe the document. The caret, anchor and target
//! range live in the document's per-view [`crate::ViewCursor`] so that they move with every
//! primitive edit, whichever view made it.
//!
//! An [`EditSession`] borrows one document together with the views registry and implements
//! [`StyledTextCtrl`] for a single view. After every mutating call it drains the document
//! journal and forwards each notification to the services of every view of that document.

use crate::clipboard::{Clipboard, ClipboardKind};
use crate::document::{Document, DocumentError, MarkerSymbol};
use crate::event::ModificationEvent;
use crate::line_ending::EolMode;
use crate::stc::StyledTextCtrl;
use crate::styling::StyleTable;
use crate::workspace::DocumentId;
use std::any::Any;
use std::collections::BTreeMap;

/// Opaque identifier for a view in a [`crate::Workspace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(pub(crate) u64);

impl ViewId {
    /// Get the underlying numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Per-view editing and display settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    /// Tab stop width in columns.
    pub tab_width: usize,
    /// Indent width in columns.
    pub indent: usize,
    /// Indent with tabs (where possible) instead of spaces.
    pub use_tabs: bool,
    /// Column of the right edge guide, also the fill column.
    pub edge_column: usize,
    /// Soft-wrap long lines.
    pub word_wrap: bool,
    /// Highlight the caret line.
    pub caret_line_highlight: bool,
    /// Show whitespace characters.
    pub view_whitespace: bool,
    /// Caret blink period in milliseconds.
    pub caret_blink_rate: u32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            tab_width: 8,
            indent: 4,
            use_tabs: false,
            edge_column: 80,
            word_wrap: false,
            caret_line_highlight: false,
            view_whitespace: false,
            caret_blink_rate: 500,
        }
    }
}

/// An observer attached to a view that receives every document notification.
pub trait ViewService: Any {
    /// Service name, for diagnostics.
    fn name(&self) -> &str;
    /// Called once per notification, in order.
    fn on_event(&mut self, event: &ModificationEvent);
    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;
    /// Downcasting support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// State of one view.
pub struct ViewState {
    pub(crate) id: ViewId,
    pub(crate) document: DocumentId,
    /// Indentation and display settings.
    pub settings: ViewSettings,
    /// First line shown at the top of the view.
    pub first_visible_line: usize,
    /// Whether the selection is rectangular.
    pub rectangular: bool,
    /// Keyword of the major mode driving this view, if any.
    pub major_mode: Option<String>,
    services: Vec<Box<dyn ViewService>>,
    events_seen: u64,
}

impl std::fmt::Debug for ViewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewState")
            .field("id", &self.id)
            .field("document", &self.document)
            .field("settings", &self.settings)
            .field("first_visible_line", &self.first_visible_line)
            .field("major_mode", &self.major_mode)
            .field(
                "services",
                &self.services.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ViewState {
    pub(crate) fn new(id: ViewId, document: DocumentId, settings: ViewSettings) -> Self {
        Self {
            id,
            document,
            settings,
            first_visible_line: 0,
            rectangular: false,
            major_mode: None,
            services: Vec::new(),
            events_seen: 0,
        }
    }

    /// This view's id.
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// The document shown in this view.
    pub fn document_id(&self) -> DocumentId {
        self.document
    }

    /// Number of notifications forwarded to this view.
    pub fn events_seen(&self) -> u64 {
        self.events_seen
    }

    /// Attach a service.
    pub fn add_service(&mut self, service: Box<dyn ViewService>) {
        self.services.push(service);
    }

    /// Detach the first service of type `T`.
    pub fn remove_service<T: ViewService>(&mut self) -> Option<Box<dyn ViewService>> {
        let idx = self
            .services
            .iter()
            .position(|s| s.as_any().downcast_ref::<T>().is_some())?;
        Some(self.services.remove(idx))
    }

    /// Borrow the first service of type `T`.
    pub fn service<T: ViewService>(&self) -> Option<&T> {
        self.services
            .iter()
            .find_map(|s| s.as_any().downcast_ref::<T>())
    }

    /// Mutably borrow the first service of type `T`.
    pub fn service_mut<T: ViewService>(&mut self) -> Option<&mut T> {
        self.services
            .iter_mut()
            .find_map(|s| s.as_any_mut().downcast_mut::<T>())
    }

    /// Dispatch a document notification to this view's services.
    pub fn forward_event(&mut self, event: &ModificationEvent) {
        self.events_seen += 1;
        if event.is_text_change() && event.lines_added != 0 && event.line < self.first_visible_line
        {
            let shifted = self.first_visible_line as isize + event.lines_added;
            self.first_visible_line = shifted.max(event.line as isize) as usize;
        }
        for service in &mut self.services {
            service.on_event(event);
        }
    }
}

/// Editing access to one view of a document.
pub struct EditSession<'a> {
    pub(crate) doc: &'a mut Document,
    pub(crate) views: &'a mut BTreeMap<ViewId, ViewState>,
    pub(crate) view: ViewId,
}

impl std::fmt::Debug for EditSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("view", &self.view)
            .field("document", &self.doc)
            .finish()
    }
}

impl<'a> EditSession<'a> {
    /// The view this session edits through.
    pub fn view_id(&self) -> ViewId {
        self.view
    }

    /// The document.
    pub fn document(&self) -> &Document {
        self.doc
    }

    /// Run `f` with mutable access to the document, then propagate its notifications.
    pub fn with_document<R>(&mut self, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = f(self.doc);
        self.sync();
        result
    }

    /// The view state.
    pub fn view(&self) -> Option<&ViewState> {
        self.views.get(&self.view)
    }

    /// Mutable view state.
    pub fn view_mut(&mut self) -> Option<&mut ViewState> {
        self.views.get_mut(&self.view)
    }

    fn settings(&self) -> ViewSettings {
        self.view()
            .map(|v| v.settings.clone())
            .unwrap_or_default()
    }

    fn update_settings(&mut self, f: impl FnOnce(&mut ViewSettings)) {
        if let Some(view) = self.views.get_mut(&self.view) {
            f(&mut view.settings);
        }
    }

    /// Forward pending document notifications to the services of all views of the document.
    pub fn sync(&mut self) {
        let events = self.doc.take_journal();
        if events.is_empty() {
            return;
        }
        let view_ids = self.doc.view_ids();
        for event in &events {
            for id in &view_ids {
                if let Some(view) = self.views.get_mut(id) {
                    view.forward_event(event);
                }
            }
        }
    }

    /// Temporarily detach the service of type `T` from this view and run `f` with it and the
    /// session.
    pub fn with_service<T: ViewService, R>(
        &mut self,
        f: impl FnOnce(&mut T, &mut EditSession<'a>) -> R,
    ) -> Option<R> {
        let mut service = self.views.get_mut(&self.view)?.remove_service::<T>()?;
        let result = service
            .as_any_mut()
            .downcast_mut::<T>()
            .map(|svc| f(svc, self));
        if let Some(view) = self.views.get_mut(&self.view) {
            view.add_service(service);
        }
        result
    }

    /// Copy the selection to `clipboard`.
    pub fn copy(&self, clipboard: &mut Clipboard, kind: ClipboardKind) -> bool {
        let (start, end) = self.get_selection();
        if start == end {
            return false;
        }
        match self.get_text_range(start, end) {
            Ok(text) => {
                clipboard.set_text(kind, text);
                true
            }
            Err(_) => false,
        }
    }

    /// Copy the selection to `clipboard` and delete it.
    pub fn cut(&mut self, clipboard: &mut Clipboard) -> Result<bool, DocumentError> {
        if !self.copy(clipboard, ClipboardKind::Normal) {
            return Ok(false);
        }
        self.replace_selection("")?;
        Ok(true)
    }

    /// Replace the selection with the clipboard text, converting its line endings.
    pub fn paste(
        &mut self,
        clipboard: &mut Clipboard,
        kind: ClipboardKind,
    ) -> Result<bool, DocumentError> {
        let Some(text) = clipboard.get_text(kind) else {
            return Ok(false);
        };
        let text = self.convert_string_eol(&text);
        self.replace_selection(&text)?;
        Ok(true)
    }

    fn cursor(&self) -> crate::document::ViewCursor {
        self.doc.view_cursor(self.view).unwrap_or_default()
    }

    fn cursor_mut(&mut self) -> Option<&mut crate::document::ViewCursor> {
        self.doc.view_cursor_mut(self.view)
    }
}

impl StyledTextCtrl for EditSession<'_> {
    fn get_text_range(&self, start: usize, end: usize) -> Result<String, DocumentError> {
        self.doc.get_text_range(start, end)
    }

    fn get_styled_range(
        &self,
        start: usize,
        end: usize,
    ) -> Result<(String, Vec<u8>), DocumentError> {
        self.doc.get_styled_range(start, end)
    }

    fn insert_text(&mut self, pos: usize, text: &str) -> Result<(), DocumentError> {
        let result = self.doc.insert(pos, text);
        self.sync();
        result
    }

    fn delete_range(&mut self, pos: usize, n: usize) -> Result<(), DocumentError> {
        let result = self.doc.delete(pos, n);
        self.sync();
        result
    }

    fn set_target_range(&mut self, start: usize, end: usize) {
        let len = self.doc.length();
        if let Some(cursor) = self.cursor_mut() {
            cursor.target_start = start.min(end).min(len);
            cursor.target_end = start.max(end).min(len);
        }
    }

    fn get_target(&self) -> (usize, usize) {
        let cursor = self.cursor();
        (cursor.target_start, cursor.target_end)
    }

    fn replace_target(&mut self, text: &str) -> Result<usize, DocumentError> {
        let (start, end) = self.get_target();
        let result = self.doc.replace_range(start, end, text);
        self.sync();
        result?;
        let len = text.chars().count();
        if let Some(cursor) = self.cursor_mut() {
            cursor.target_start = start;
            cursor.target_end = start + len;
        }
        Ok(len)
    }

    fn set_style_range(&mut self, start: usize, n: usize, style: u8) -> Result<(), DocumentError> {
        let result = self.doc.set_style_range(start, n, style);
        self.sync();
        result
    }

    fn start_styling(&mut self, pos: usize) {
        self.doc.start_styling(pos);
    }

    fn set_styling(&mut self, n: usize, style: u8) {
        self.doc.set_styling(n, style);
        self.sync();
    }

    fn get_style_at(&self, pos: usize) -> u8 {
        self.doc.style_at(pos)
    }

    fn style_table(&self) -> &StyleTable {
        self.doc.style_table()
    }

    fn length(&self) -> usize {
        self.doc.length()
    }

    fn line_count(&self) -> usize {
        self.doc.line_count()
    }

    fn line_from_position(&self, pos: usize) -> usize {
        self.doc.line_from_position(pos)
    }

    fn position_from_line(&self, line: usize) -> usize {
        self.doc.position_from_line(line)
    }

    fn line_end_position(&self, line: usize) -> usize {
        self.doc.line_end_position(line)
    }

    fn line_indentation(&self, line: usize) -> usize {
        self.doc.line_indentation(line, self.settings().tab_width)
    }

    fn get_line_indent_position(&self, line: usize) -> usize {
        self.doc.line_indent_position(line)
    }

    fn column(&self, pos: usize) -> usize {
        self.doc.column(pos, self.settings().tab_width)
    }

    fn find_column(&self, line: usize, column: usize) -> usize {
        self.doc.find_column(line, column, self.settings().tab_width)
    }

    fn get_line(&self, line: usize) -> String {
        self.doc.get_line(line)
    }

    fn get_line_text(&self, line: usize) -> String {
        self.doc.get_line_text(line)
    }

    fn current_position(&self) -> usize {
        self.cursor().caret
    }

    fn goto_position(&mut self, pos: usize) {
        let pos = pos.min(self.doc.length());
        if let Some(cursor) = self.cursor_mut() {
            cursor.caret = pos;
            cursor.anchor = pos;
        }
    }

    fn set_selection(&mut self, anchor: usize, caret: usize) {
        let len = self.doc.length();
        if let Some(cursor) = self.cursor_mut() {
            cursor.anchor = anchor.min(len);
            cursor.caret = caret.min(len);
        }
    }

    fn get_selection(&self) -> (usize, usize) {
        let cursor = self.cursor();
        (
            cursor.caret.min(cursor.anchor),
            cursor.caret.max(cursor.anchor),
        )
    }

    fn get_anchor(&self) -> usize {
        self.cursor().anchor
    }

    fn begin_undo_action(&mut self) {
        self.doc.begin_undo();
    }

    fn end_undo_action(&mut self) {
        self.doc.end_undo();
        self.sync();
    }

    fn undo(&mut self) -> bool {
        let done = self.doc.undo();
        self.sync();
        done
    }

    fn redo(&mut self) -> bool {
        let done = self.doc.redo();
        self.sync();
        done
    }

    fn get_eol_mode(&self) -> EolMode {
        self.doc.eol_mode()
    }

    fn set_eol_mode(&mut self, mode: EolMode) {
        self.doc.set_eol_mode(mode);
    }

    fn convert_eols(&mut self, mode: EolMode) -> Result<bool, DocumentError> {
        let result = self.doc.convert_eols(mode);
        self.sync();
        result
    }

    fn get_indent(&self) -> usize {
        self.settings().indent
    }

    fn set_indent(&mut self, indent: usize) {
        self.update_settings(|s| s.indent = indent);
    }

    fn get_tab_width(&self) -> usize {
        self.settings().tab_width
    }

    fn set_tab_width(&mut self, width: usize) {
        self.update_settings(|s| s.tab_width = width.max(1));
    }

    fn get_use_tabs(&self) -> bool {
        self.settings().use_tabs
    }

    fn set_use_tabs(&mut self, use_tabs: bool) {
        self.update_settings(|s| s.use_tabs = use_tabs);
    }

    fn get_edge_column(&self) -> usize {
        self.settings().edge_column
    }

    fn set_edge_column(&mut self, column: usize) {
        self.update_settings(|s| s.edge_column = column);
    }

    fn set_fold_level(&mut self, line: usize, level: u32) {
        self.doc.set_fold_level(line, level);
        self.sync();
    }

    fn get_fold_level(&self, line: usize) -> u32 {
        self.doc.fold_level(line)
    }

    fn set_fold_expanded(&mut self, line: usize, expanded: bool) {
        self.doc.set_fold_expanded(line, expanded);
        self.sync();
    }

    fn get_fold_expanded(&self, line: usize) -> bool {
        self.doc.fold_expanded(line)
    }

    fn toggle_fold(&mut self, line: usize) {
        self.doc.toggle_fold(line);
        self.sync();
    }

    fn marker_define(&mut self, id: u8, symbol: MarkerSymbol) {
        self.doc.marker_define(id, symbol);
    }

    fn marker_add(&mut self, line: usize, id: u8) -> bool {
        self.doc.marker_add(line, id)
    }
}
