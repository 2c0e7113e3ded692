//! Minor modes.
//!
//! A minor mode is a [`ViewService`] attached to one view on top of the major mode. The
//! [`MinorModeRegistry`] knows which minor modes work with which major modes and how to
//! attach and detach them; the `minor_modes` preference picks the ones started with a view.

use crate::autoindent::grouped;
use crate::major::MajorMode;
use scribe_core::{
    Document, DocumentError, EditSession, FoldEngine, FoldEntryNamer, FoldNode, ModificationEvent,
    StyledTextCtrl, ViewService, ViewState,
};
use std::any::Any;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

/// Edge of the view a minor mode's side window prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    /// Above the text.
    Top,
    /// Right of the text.
    #[default]
    Right,
    /// Below the text.
    Bottom,
    /// Left of the text.
    Left,
}

/// Side window contract of a minor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Preferred edge.
    pub side: Side,
    /// Default width (left/right) or height (top/bottom) in pixels.
    pub size: u32,
    /// Shown as an edge tab that expands on demand.
    pub springtab: bool,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            side: Side::Right,
            size: 200,
            springtab: false,
        }
    }
}

/// Lifecycle of a minor mode attached to a view.
pub trait MinorMode: ViewService {
    /// Called once, right after the mode is created for a view.
    fn setup(&mut self, _session: &mut EditSession<'_>) {}

    /// Called once, after the mode is detached from its view.
    fn teardown(&mut self, _session: &mut EditSession<'_>) {}
}

type AttachFn = Box<dyn Fn(&MajorMode, &mut EditSession<'_>) + Send + Sync>;

struct Entry {
    keyword: &'static str,
    placement: Placement,
    works_with: fn(&MajorMode) -> bool,
    attach: AttachFn,
    detach: fn(&mut EditSession<'_>) -> bool,
    is_attached: fn(&ViewState) -> bool,
}

fn detach_service<T: MinorMode>(session: &mut EditSession<'_>) -> bool {
    let Some(mut service) = session.view_mut().and_then(|view| view.remove_service::<T>()) else {
        return false;
    };
    if let Some(mode) = service.as_any_mut().downcast_mut::<T>() {
        mode.teardown(session);
    }
    true
}

fn has_service<T: MinorMode>(view: &ViewState) -> bool {
    view.service::<T>().is_some()
}

fn any_major(_: &MajorMode) -> bool {
    true
}

/// Registered minor modes, in registration order.
#[derive(Default)]
pub struct MinorModeRegistry {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for MinorModeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.keyword))
            .finish()
    }
}

impl MinorModeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `FoldExplorer`, `OutputLog` and `TabCompletion`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            FoldExplorer::KEYWORD,
            Placement {
                side: Side::Left,
                springtab: true,
                ..Placement::default()
            },
            any_major,
            |major| FoldExplorer::new(major.fold_namer().clone()),
        );
        registry.register(
            OutputLog::KEYWORD,
            Placement {
                side: Side::Bottom,
                size: 100,
                springtab: true,
            },
            any_major,
            |_| OutputLog::new(),
        );
        registry.register(
            TabCompletion::KEYWORD,
            Placement::default(),
            any_major,
            |_| TabCompletion::new(CompletionScope::Document),
        );
        registry
    }

    /// Register minor mode `T` under `keyword`. `create` builds it for a view of a major mode
    /// accepted by `works_with`.
    pub fn register<T: MinorMode>(
        &mut self,
        keyword: &'static str,
        placement: Placement,
        works_with: fn(&MajorMode) -> bool,
        create: fn(&MajorMode) -> T,
    ) {
        let attach: AttachFn = Box::new(move |major, session| {
            let mut mode = create(major);
            mode.setup(session);
            if let Some(view) = session.view_mut() {
                view.add_service(Box::new(mode));
            }
        });
        self.entries.retain(|e| e.keyword != keyword);
        self.entries.push(Entry {
            keyword,
            placement,
            works_with,
            attach,
            detach: detach_service::<T>,
            is_attached: has_service::<T>,
        });
    }

    fn entry(&self, keyword: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.keyword.eq_ignore_ascii_case(keyword))
    }

    /// Keywords of the minor modes usable with `major`.
    pub fn compatible(&self, major: &MajorMode) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|e| (e.works_with)(major))
            .map(|e| e.keyword)
            .collect()
    }

    /// Side window contract of `keyword`.
    pub fn placement(&self, keyword: &str) -> Option<Placement> {
        self.entry(keyword).map(|e| e.placement)
    }

    /// Returns `true` if minor mode `keyword` is attached to the view.
    pub fn is_attached(&self, keyword: &str, view: &ViewState) -> bool {
        self.entry(keyword).is_some_and(|e| (e.is_attached)(view))
    }

    /// Attach `keyword` to the session's view. Returns `false` if the mode is unknown,
    /// incompatible with `major` or already attached.
    pub fn attach(&self, keyword: &str, major: &MajorMode, session: &mut EditSession<'_>) -> bool {
        let Some(entry) = self.entry(keyword) else {
            tracing::warn!(%keyword, "unknown minor mode");
            return false;
        };
        if !(entry.works_with)(major) {
            tracing::debug!(%keyword, major = %major.keyword(), "minor mode does not apply");
            return false;
        }
        if session.view().is_some_and(|view| (entry.is_attached)(view)) {
            return false;
        }
        (entry.attach)(major, session);
        tracing::debug!(%keyword, view = session.view_id().get(), "attached minor mode");
        true
    }

    /// Detach `keyword` from the session's view. Returns `false` if it was not attached.
    pub fn detach(&self, keyword: &str, session: &mut EditSession<'_>) -> bool {
        self.entry(keyword).is_some_and(|entry| (entry.detach)(session))
    }

    /// Attach every mode in `keywords` that works with `major`; returns the ones attached.
    pub fn attach_all(
        &self,
        keywords: &[String],
        major: &MajorMode,
        session: &mut EditSession<'_>,
    ) -> Vec<&'static str> {
        keywords
            .iter()
            .filter_map(|keyword| {
                let entry = self.entry(keyword)?;
                self.attach(keyword, major, session).then_some(entry.keyword)
            })
            .collect()
    }
}

macro_rules! view_service {
    ($ty:ty, $name:expr) => {
        impl ViewService for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn on_event(&mut self, event: &ModificationEvent) {
                self.observe(event);
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
    };
}

// -------------------------------------------------------------------------------------------
// Fold explorer

/// Code outline of a view, built from the fold levels the lexer sets.
#[derive(Debug, Clone)]
pub struct FoldExplorer {
    engine: FoldEngine,
}

impl FoldExplorer {
    /// Registry keyword.
    pub const KEYWORD: &'static str = "FoldExplorer";

    /// An explorer naming its entries with `namer`.
    pub fn new(namer: FoldEntryNamer) -> Self {
        Self {
            engine: FoldEngine::new(namer),
        }
    }

    fn observe(&mut self, event: &ModificationEvent) {
        self.engine.observe(event);
    }

    /// The outline, rebuilt if the document changed since the last call.
    pub fn hierarchy(&mut self, doc: &Document) -> &FoldNode {
        self.engine.hierarchy(doc)
    }

    /// Visible entries in document order as `(header line, depth, text)`.
    pub fn entries(&mut self, doc: &Document) -> Vec<(usize, usize, String)> {
        fn walk(node: &FoldNode, depth: usize, out: &mut Vec<(usize, usize, String)>) {
            for child in &node.children {
                let next = if child.show {
                    out.push((child.start_line, depth, child.text.trim().to_string()));
                    depth + 1
                } else {
                    depth
                };
                walk(child, next, out);
            }
        }
        let mut out = Vec::new();
        walk(self.hierarchy(doc), 0, &mut out);
        out
    }

    /// Text of the innermost visible entry containing `line`.
    pub fn entry_at(&mut self, doc: &Document, line: usize) -> Option<String> {
        let root = self.hierarchy(doc);
        let mut node = root;
        let mut found = None;
        while let Some(child) = node
            .children
            .iter()
            .rev()
            .find(|c| c.start_line <= line && line <= c.end_line)
        {
            if child.show {
                found = Some(child.text.trim().to_string());
            }
            node = child;
        }
        found
    }

    /// Number of outline rebuilds so far.
    pub fn rebuild_count(&self) -> usize {
        self.engine.rebuild_count()
    }

    /// Move the caret to the start of `line` and scroll it to the top of the view.
    pub fn goto(session: &mut EditSession<'_>, line: usize) {
        let line = line.min(session.line_count().saturating_sub(1));
        let pos = session.position_from_line(line);
        session.goto_position(pos);
        if let Some(view) = session.view_mut() {
            view.first_visible_line = line;
        }
    }
}

view_service!(FoldExplorer, "fold-explorer");

impl MinorMode for FoldExplorer {
    fn setup(&mut self, session: &mut EditSession<'_>) {
        self.engine.hierarchy(session.document());
    }
}

// -------------------------------------------------------------------------------------------
// Output log

/// Append-only log buffer for subprocess output. The buffer is read-only between appends.
pub struct OutputLog {
    log: Document,
}

impl std::fmt::Debug for OutputLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputLog")
            .field("length", &self.log.length())
            .finish()
    }
}

impl Default for OutputLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputLog {
    /// Registry keyword.
    pub const KEYWORD: &'static str = "OutputLog";

    /// An empty log.
    pub fn new() -> Self {
        let mut log = Document::new();
        log.set_read_only(true);
        Self { log }
    }

    fn observe(&mut self, _event: &ModificationEvent) {}

    /// Append `text` at the end of the log, without an undo record.
    pub fn append(&mut self, text: &str) -> Result<(), DocumentError> {
        self.log.set_read_only(false);
        let result = self.log.insert(self.log.length(), text);
        self.log.clear_undo();
        self.log.set_read_only(true);
        result
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.log.set_read_only(false);
        self.log.reset_text("");
        self.log.set_read_only(true);
    }

    /// The log text.
    pub fn text(&self) -> String {
        self.log.text()
    }

    /// The log buffer.
    pub fn document(&self) -> &Document {
        &self.log
    }
}

view_service!(OutputLog, "output-log");

impl MinorMode for OutputLog {}

// -------------------------------------------------------------------------------------------
// Word completion

/// Where [`TabCompletion`] looks for candidate words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionScope {
    /// The current document only.
    #[default]
    Document,
    /// The current document, then every other open document.
    AllDocuments,
}

#[derive(Debug, Clone)]
struct Cycle {
    start: usize,
    end: usize,
    /// The typed prefix followed by the alternatives.
    choices: Vec<String>,
    index: usize,
}

/// Word completion that cycles through alternatives when invoked repeatedly.
#[derive(Debug, Clone, Default)]
pub struct TabCompletion {
    scope: CompletionScope,
    cycle: Option<Cycle>,
}

fn is_word(segment: &str) -> bool {
    segment
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Words of `text` with their char offsets.
fn words_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    let mut out = Vec::new();
    for segment in text.split_word_bounds() {
        if is_word(segment) {
            out.push((offset, segment));
        }
        offset += segment.chars().count();
    }
    out
}

impl TabCompletion {
    /// Registry keyword.
    pub const KEYWORD: &'static str = "TabCompletion";

    /// Completion over `scope`.
    pub fn new(scope: CompletionScope) -> Self {
        Self { scope, cycle: None }
    }

    /// Where candidates come from.
    pub fn scope(&self) -> CompletionScope {
        self.scope
    }

    /// Change the scope; forgets the current cycle.
    pub fn set_scope(&mut self, scope: CompletionScope) {
        self.scope = scope;
        self.cycle = None;
    }

    fn observe(&mut self, _event: &ModificationEvent) {}

    /// Candidates for `prefix`: words of `text` ordered by distance from `caret` (ties sorted
    /// alphabetically), then words of `others` alphabetically. The prefix itself is excluded.
    pub fn candidates(prefix: &str, text: &str, caret: usize, others: &[String]) -> Vec<String> {
        let mut nearest: HashMap<&str, usize> = HashMap::new();
        for (offset, word) in words_with_offsets(text) {
            if word.len() > prefix.len() && word.starts_with(prefix) {
                let end = offset + word.chars().count();
                let distance = if end <= caret { caret - end } else { offset.saturating_sub(caret) };
                nearest
                    .entry(word)
                    .and_modify(|d| *d = (*d).min(distance))
                    .or_insert(distance);
            }
        }
        let mut local: Vec<(usize, &str)> = nearest.into_iter().map(|(w, d)| (d, w)).collect();
        local.sort();
        let mut out: Vec<String> = local.into_iter().map(|(_, w)| w.to_string()).collect();

        let mut extra: Vec<String> = others
            .iter()
            .flat_map(|doc| doc.split_word_bounds())
            .filter(|w| is_word(w) && w.len() > prefix.len() && w.starts_with(prefix))
            .filter(|w| !out.iter().any(|o| o == w))
            .map(str::to_string)
            .collect();
        extra.sort();
        extra.dedup();
        out.extend(extra);
        out
    }

    /// Complete the word before the caret, or replace the previous completion with the next
    /// alternative. `others` holds the text of the other open documents and is only read in
    /// [`CompletionScope::AllDocuments`]. Returns the inserted word, if any.
    pub fn complete(
        &mut self,
        stc: &mut dyn StyledTextCtrl,
        others: &[String],
    ) -> Result<Option<String>, DocumentError> {
        let caret = stc.current_position();
        if let Some(cycle) = self.cycle.as_mut()
            && cycle.end == caret
            && stc.get_text_range(cycle.start, cycle.end).ok().as_deref()
                == Some(cycle.choices[cycle.index].as_str())
        {
            cycle.index = (cycle.index + 1) % cycle.choices.len();
            let choice = cycle.choices[cycle.index].clone();
            let (start, end) = (cycle.start, cycle.end);
            let len = Self::replace(stc, start, end, &choice)?;
            if let Some(cycle) = self.cycle.as_mut() {
                cycle.end = start + len;
            }
            return Ok(Some(choice));
        }
        self.cycle = None;

        let line_start = stc.position_from_line(stc.line_from_position(caret));
        let before = stc.get_text_range(line_start, caret)?;
        let prefix = before
            .split_word_bounds()
            .next_back()
            .filter(|w| is_word(w))
            .unwrap_or_default()
            .to_string();
        if prefix.is_empty() {
            return Ok(None);
        }
        let others = match self.scope {
            CompletionScope::Document => &[][..],
            CompletionScope::AllDocuments => others,
        };
        let alternatives = Self::candidates(&prefix, &stc.get_text(), caret, others);
        let Some(first) = alternatives.first().cloned() else {
            tracing::debug!(%prefix, "no completions");
            return Ok(None);
        };

        let start = caret - prefix.chars().count();
        let len = Self::replace(stc, start, caret, &first)?;
        let mut choices = vec![prefix];
        choices.extend(alternatives);
        self.cycle = Some(Cycle {
            start,
            end: start + len,
            choices,
            index: 1,
        });
        Ok(Some(first))
    }

    fn replace(
        stc: &mut dyn StyledTextCtrl,
        start: usize,
        end: usize,
        text: &str,
    ) -> Result<usize, DocumentError> {
        grouped(stc, |stc| {
            stc.set_target_range(start, end);
            let len = stc.replace_target(text)?;
            stc.goto_position(start + len);
            Ok(len)
        })
    }
}

view_service!(TabCompletion, "tab-completion");

impl MinorMode for TabCompletion {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_candidates_by_proximity() {
        let text = "alpha alphabet beta alps\nalp";
        let caret = text.chars().count();
        assert_eq!(
            TabCompletion::candidates("alp", text, caret, &[]),
            vec!["alps", "alphabet", "alpha"]
        );
        let others = vec!["alpine alpha".to_string()];
        assert_eq!(
            TabCompletion::candidates("alp", "alps x", 6, &others),
            vec!["alps", "alpha", "alpine"]
        );
    }

    #[test]
    fn test_word_offsets_count_chars() {
        assert_eq!(words_with_offsets("é foo_bar, 42"), vec![(0, "é"), (2, "foo_bar"), (11, "42")]);
    }

    #[test]
    fn test_output_log_is_read_only_between_appends() {
        let mut log = OutputLog::new();
        log.append("one\n").unwrap();
        log.append("two\n").unwrap();
        assert_eq!(log.text(), "one\ntwo\n");
        assert!(log.document().is_read_only());
        assert!(!log.document().can_undo());
        log.clear();
        assert_eq!(log.text(), "");
    }
}
