//! Fold levels and the fold hierarchy behind the code explorer.
//!
//! Every line carries a fold level word: the low bits hold the level number (starting at
//! [`FOLD_LEVEL_BASE`]), [`FOLD_LEVEL_HEADER_FLAG`] marks the first line of a foldable block and
//! [`FOLD_LEVEL_WHITE_FLAG`] marks blank lines. [`build_fold_hierarchy`] turns those words into a
//! tree of [`FoldNode`]s under a synthetic level-0 root.
//!
//! [`FoldEngine`] caches the tree and only rebuilds it after fold-change or line-count-changing
//! events; on rebuild the expansion state of the previous tree is carried over by matching node
//! text in order.

use crate::document::Document;
use crate::event::{ModificationEvent, ModificationKind};
use std::collections::BTreeSet;

/// Level number of a line outside any block.
pub const FOLD_LEVEL_BASE: u32 = 0x400;
/// Mask extracting the level number.
pub const FOLD_LEVEL_NUMBER_MASK: u32 = 0x0FFF;
/// Flag set on blank lines.
pub const FOLD_LEVEL_WHITE_FLAG: u32 = 0x1000;
/// Flag set on the first line of a foldable block.
pub const FOLD_LEVEL_HEADER_FLAG: u32 = 0x2000;

/// Level number of a fold word.
pub fn fold_level_number(level: u32) -> u32 {
    level & FOLD_LEVEL_NUMBER_MASK
}

/// Returns `true` if the fold word marks a block header.
pub fn is_fold_header(level: u32) -> bool {
    level & FOLD_LEVEL_HEADER_FLAG != 0
}

/// One node of the fold hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldNode {
    /// Level number (0 for the root).
    pub level: u32,
    /// Header line of the block.
    pub start_line: usize,
    /// Line where the block ends: the next sibling's start, or the parent's end.
    pub end_line: usize,
    /// Display text of the entry.
    pub text: String,
    /// `false` if the entry is hidden from the explorer (its children are still shown).
    pub show: bool,
    /// Expansion state in the explorer.
    pub expanded: bool,
    /// Nested blocks, ascending by `start_line`.
    pub children: Vec<FoldNode>,
}

impl FoldNode {
    fn new(level: u32, start_line: usize, text: String, expanded: bool) -> Self {
        Self {
            level,
            start_line,
            end_line: start_line,
            show: !text.is_empty(),
            text,
            expanded,
            children: Vec::new(),
        }
    }

    /// Visible entries in document order; children of hidden entries take their place.
    pub fn flatten(&self) -> Vec<&FoldNode> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into<'a>(&'a self, out: &mut Vec<&'a FoldNode>) {
        for child in &self.children {
            if child.show {
                out.push(child);
            }
            child.flatten_into(out);
        }
    }

    /// Copy of the tree with hidden entries removed and their children reparented.
    pub fn visible_tree(&self) -> FoldNode {
        let mut node = FoldNode {
            children: Vec::new(),
            ..self.clone()
        };
        for child in &self.children {
            let visible = child.visible_tree();
            if child.show {
                node.children.push(visible);
            } else {
                node.children.extend(visible.children);
            }
        }
        node
    }

    /// Deepest visible-or-hidden node whose range contains `line`, excluding the root.
    pub fn find_node_for_line(&self, line: usize) -> Option<&FoldNode> {
        let child = self
            .children
            .iter()
            .rev()
            .find(|c| c.start_line <= line && line <= c.end_line)?;
        Some(child.find_node_for_line(line).unwrap_or(child))
    }

    /// Total number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

impl std::fmt::Display for FoldNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "L{} s{} e{} {}",
            self.level,
            self.start_line,
            self.end_line,
            self.text.trim_end()
        )
    }
}

/// Decides the explorer text of a fold header; empty text hides the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldEntryNamer {
    /// Every header is shown with its line text.
    All,
    /// Shown only if the stripped line starts with one of the prefixes.
    Prefixes(Vec<String>),
    /// C-like languages: hide control-flow headers; a lone `{` line is named after the
    /// nearest preceding line that is not a preprocessor directive.
    CLike {
        /// Stripped-line prefixes that hide an entry.
        ignore: Vec<String>,
    },
}

impl FoldEntryNamer {
    /// Prefix matcher from string slices.
    pub fn prefixes(prefixes: &[&str]) -> Self {
        Self::Prefixes(prefixes.iter().map(|s| s.to_string()).collect())
    }

    /// The C-like namer with the usual control-flow ignore list.
    pub fn c_like() -> Self {
        Self::CLike {
            ignore: ["}", "if", "else", "for", "do", "while", "switch", "case", "enum", "struct"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Explorer text for the header on `line`.
    pub fn name(&self, doc: &Document, line: usize) -> String {
        let text = doc.get_line_text(line);
        match self {
            Self::All => text,
            Self::Prefixes(prefixes) => {
                let stripped = text.trim_start();
                if prefixes.iter().any(|p| stripped.starts_with(p.as_str())) {
                    text
                } else {
                    String::new()
                }
            }
            Self::CLike { ignore } => {
                let ignored = |name: &str| ignore.iter().any(|p| name.starts_with(p.as_str()));
                let name = text.trim();
                if ignored(name) {
                    return String::new();
                }
                if !(name.starts_with('{') || name.is_empty()) {
                    return text;
                }
                let mut line = line;
                let mut text = text.clone();
                while line > 0 {
                    text = doc.get_line_text(line - 1);
                    let name = text.trim();
                    if ignored(name) {
                        return String::new();
                    }
                    if !name.starts_with('#') {
                        break;
                    }
                    line -= 1;
                }
                text
            }
        }
    }
}

/// Build the fold hierarchy of `doc` from its fold levels.
///
/// Every node starts with `expanded` as its expansion state.
pub fn build_fold_hierarchy(doc: &Document, namer: &FoldEntryNamer, expanded: bool) -> FoldNode {
    let line_count = doc.line_count();
    let last_line = line_count.saturating_sub(1);
    let mut stack = vec![FoldNode::new(0, 0, "root".to_string(), true)];

    for line in 0..line_count {
        let raw = doc.fold_level(line);
        if !is_fold_header(raw) {
            continue;
        }
        let level = fold_level_number(raw);
        while stack.len() > 1 && stack.last().is_some_and(|top| top.level >= level) {
            close_top(&mut stack, line);
        }
        stack.push(FoldNode::new(level, line, namer.name(doc, line), expanded));
    }

    while stack.len() > 1 {
        close_top(&mut stack, last_line);
    }
    let mut root = stack.pop().unwrap_or_else(|| FoldNode::new(0, 0, "root".to_string(), true));
    root.end_line = last_line;
    root
}

fn close_top(stack: &mut Vec<FoldNode>, end_line: usize) {
    if let Some(mut node) = stack.pop() {
        node.end_line = end_line;
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        }
    }
}

/// Carry expansion state from `old` to `new` by matching child text in order.
pub fn copy_expansion(old: &FoldNode, new: &mut FoldNode) {
    let mut cursor = 0;
    for node in &mut new.children {
        let found = old.children[cursor.min(old.children.len())..]
            .iter()
            .position(|o| o.text == node.text);
        if let Some(offset) = found {
            let matched = &old.children[cursor + offset];
            node.expanded = matched.expanded;
            copy_expansion(matched, node);
            cursor += offset + 1;
        }
    }
}

/// Cached fold hierarchy with incremental invalidation.
#[derive(Debug, Clone)]
pub struct FoldEngine {
    namer: FoldEntryNamer,
    cached: Option<FoldNode>,
    affected: BTreeSet<usize>,
    line_count: usize,
    rebuilds: usize,
}

impl FoldEngine {
    /// Create an engine that names entries with `namer`.
    pub fn new(namer: FoldEntryNamer) -> Self {
        Self {
            namer,
            cached: None,
            affected: BTreeSet::new(),
            line_count: 0,
            rebuilds: 0,
        }
    }

    /// The entry namer in use.
    pub fn namer(&self) -> &FoldEntryNamer {
        &self.namer
    }

    /// Record a document notification.
    pub fn observe(&mut self, event: &ModificationEvent) {
        match event.kind {
            ModificationKind::FoldChange => {
                self.affected.insert(event.line);
            }
            ModificationKind::Insert | ModificationKind::Delete if event.lines_added != 0 => {
                self.affected.insert(event.line);
            }
            _ => {}
        }
    }

    /// Lines touched since the last rebuild.
    pub fn affected_lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.affected.iter().copied()
    }

    /// Returns `true` if the next [`FoldEngine::hierarchy`] call will rebuild.
    pub fn is_dirty(&self, doc: &Document) -> bool {
        self.cached.is_none() || !self.affected.is_empty() || doc.line_count() != self.line_count
    }

    /// Number of rebuilds performed so far.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    /// Forget the cached tree.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// The fold hierarchy, rebuilt only if something changed.
    pub fn hierarchy(&mut self, doc: &Document) -> &FoldNode {
        if self.is_dirty(doc) {
            let mut fresh = build_fold_hierarchy(doc, &self.namer, true);
            if let Some(old) = self.cached.as_ref() {
                copy_expansion(old, &mut fresh);
            }
            tracing::debug!(
                lines = doc.line_count(),
                affected = self.affected.len(),
                nodes = fresh.descendant_count(),
                "rebuilt fold hierarchy"
            );
            self.affected.clear();
            self.line_count = doc.line_count();
            self.rebuilds += 1;
            self.cached = Some(fresh);
        }
        self.cached.get_or_insert_with(|| FoldNode::new(0, 0, "root".to_string(), true))
    }

    /// Mutable access to the cached tree (e.g. to toggle expansion), if built.
    pub fn cached_mut(&mut self) -> Option<&mut FoldNode> {
        self.cached.as_mut()
    }
}
