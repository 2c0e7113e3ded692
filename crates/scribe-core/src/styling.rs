//! Styling interface.
//!
//! Every character of a [`crate::Document`] carries one style byte. Lexers fill those bytes:
//!
//! - built-in lexers are registered under an integer id in a [`LexerRegistry`];
//! - container lexers are supplied directly by a major mode.
//!
//! Both implement [`Lexer`] and talk back to the document through the [`Styler`] callback
//! surface (`set_styles`, `set_fold_level`). Styling always begins at the position returned by
//! [`Lexer::adjust_start`] so that a lexer never starts in the middle of a token.
//!
//! A [`StyleTable`] maps numeric style ids to semantic categories and derives the
//! `is_comment`/`is_string`/`is_keyword` predicates used by autoindent and paragraph services.

use std::collections::HashMap;

/// Number of distinct style ids supported (7-bit styles).
pub const MAX_STYLES: usize = 128;

/// Lexer id meaning "styled by a container lexer supplied by the mode".
pub const LEXER_CONTAINER: u32 = 0;
/// Lexer id of the built-in null lexer (everything style 0).
pub const LEXER_NULL: u32 = 1;

/// Callback surface a lexer uses to read text and write styles and fold levels.
pub trait Styler {
    /// Document length in characters.
    fn length(&self) -> usize;
    /// Text of `[start, end)`.
    fn text_range(&self, start: usize, end: usize) -> String;
    /// Number of lines.
    fn line_count(&self) -> usize;
    /// Line containing `pos`.
    fn line_from_position(&self, pos: usize) -> usize;
    /// First position of `line`.
    fn position_from_line(&self, line: usize) -> usize;
    /// Position just before the line ending of `line`.
    fn line_end_position(&self, line: usize) -> usize;
    /// Style byte at `pos` (0 past the end).
    fn style_at(&self, pos: usize) -> u8;
    /// Overwrite style bytes starting at `start`.
    fn set_styles(&mut self, start: usize, styles: &[u8]);
    /// Fold level of `line`.
    fn fold_level(&self, line: usize) -> u32;
    /// Set the fold level of `line`.
    fn set_fold_level(&mut self, line: usize, level: u32);

    /// Text of `line` without its line ending.
    fn line_text(&self, line: usize) -> String {
        let start = self.position_from_line(line);
        let end = self.line_end_position(line);
        self.text_range(start, end)
    }
}

/// A lexer that assigns style bytes (and optionally fold levels) to a range of text.
pub trait Lexer {
    /// Human readable lexer name.
    fn name(&self) -> &str;

    /// Move `pos` back to a position where lexing can safely restart.
    ///
    /// The default restarts at the beginning of the line containing `pos`.
    fn adjust_start(&self, styler: &dyn Styler, pos: usize) -> usize {
        let line = styler.line_from_position(pos);
        styler.position_from_line(line)
    }

    /// Style `[start, end)`. `start` has already been passed through [`Lexer::adjust_start`].
    fn style_text(&mut self, styler: &mut dyn Styler, start: usize, end: usize);

    /// Receive an "extra property" from the major mode.
    fn set_property(&mut self, _name: &str, _value: &str) {}
}

/// Built-in lexer that leaves everything in style 0 and all lines at the base fold level.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLexer;

impl Lexer for NullLexer {
    fn name(&self) -> &str {
        "null"
    }

    fn style_text(&mut self, styler: &mut dyn Styler, start: usize, end: usize) {
        if end > start {
            styler.set_styles(start, &vec![0; end - start]);
        }
    }
}

/// Constructor for a built-in lexer.
pub type LexerFactory = fn() -> Box<dyn Lexer>;

/// Registry of built-in lexers keyed by integer id.
#[derive(Clone)]
pub struct LexerRegistry {
    builtins: HashMap<u32, LexerFactory>,
}

impl std::fmt::Debug for LexerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&u32> = self.builtins.keys().collect();
        ids.sort();
        f.debug_struct("LexerRegistry").field("ids", &ids).finish()
    }
}

impl Default for LexerRegistry {
    fn default() -> Self {
        let mut registry = Self {
            builtins: HashMap::new(),
        };
        registry.register(LEXER_NULL, || Box::new(NullLexer));
        registry
    }
}

impl LexerRegistry {
    /// Create a registry containing only the null lexer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a built-in lexer.
    pub fn register(&mut self, id: u32, factory: LexerFactory) {
        self.builtins.insert(id, factory);
    }

    /// Instantiate the built-in lexer `id`.
    pub fn create(&self, id: u32) -> Option<Box<dyn Lexer>> {
        self.builtins.get(&id).map(|factory| factory())
    }

    /// Returns `true` if `id` is registered.
    pub fn contains(&self, id: u32) -> bool {
        self.builtins.contains_key(&id)
    }
}

/// Semantic category of a style id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StyleCategory {
    /// Plain text.
    Default,
    /// Comments.
    Comment,
    /// String and character literals.
    String,
    /// Primary keywords.
    Keyword,
    /// Secondary keywords.
    Keyword2,
    /// Operators and punctuation.
    Operator,
    /// Numeric literals.
    Number,
    /// Identifiers.
    Identifier,
    /// Preprocessor directives.
    Preprocessor,
    /// Any other named category.
    Other(String),
}

impl StyleCategory {
    /// Parse a category name such as `comment_style` or `keyword`.
    pub fn from_name(name: &str) -> Self {
        let base = name.trim().trim_end_matches("_style");
        match base {
            "default" => Self::Default,
            "comment" => Self::Comment,
            "string" | "character" => Self::String,
            "keyword" => Self::Keyword,
            "keyword2" => Self::Keyword2,
            "operator" => Self::Operator,
            "number" => Self::Number,
            "identifier" => Self::Identifier,
            "preprocessor" => Self::Preprocessor,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Maps style ids to semantic categories.
#[derive(Debug, Clone)]
pub struct StyleTable {
    categories: HashMap<u8, StyleCategory>,
    comment: [bool; MAX_STYLES],
    string: [bool; MAX_STYLES],
    keyword: [bool; MAX_STYLES],
}

impl Default for StyleTable {
    fn default() -> Self {
        Self {
            categories: HashMap::new(),
            comment: [false; MAX_STYLES],
            string: [false; MAX_STYLES],
            keyword: [false; MAX_STYLES],
        }
    }
}

impl StyleTable {
    /// Build a table from `(style_id, category_name)` pairs.
    pub fn new(pairs: &[(u8, &str)]) -> Self {
        let mut table = Self::default();
        for (id, name) in pairs {
            table.set(*id, StyleCategory::from_name(name));
        }
        table
    }

    /// Assign a category to a style id.
    pub fn set(&mut self, id: u8, category: StyleCategory) {
        let idx = usize::from(id) % MAX_STYLES;
        self.comment[idx] = category == StyleCategory::Comment;
        self.string[idx] = category == StyleCategory::String;
        self.keyword[idx] = matches!(category, StyleCategory::Keyword | StyleCategory::Keyword2);
        self.categories.insert(id, category);
    }

    /// Category of a style id ([`StyleCategory::Default`] if unmapped).
    pub fn category(&self, id: u8) -> StyleCategory {
        self.categories
            .get(&id)
            .cloned()
            .unwrap_or(StyleCategory::Default)
    }

    /// Returns `true` if `id` is a comment style.
    pub fn is_comment(&self, id: u8) -> bool {
        self.comment[usize::from(id) % MAX_STYLES]
    }

    /// Returns `true` if `id` is a string style.
    pub fn is_string(&self, id: u8) -> bool {
        self.string[usize::from(id) % MAX_STYLES]
    }

    /// Returns `true` if `id` is a keyword style.
    pub fn is_keyword(&self, id: u8) -> bool {
        self.keyword[usize::from(id) % MAX_STYLES]
    }

    /// All style ids with the comment category.
    pub fn comment_styles(&self) -> Vec<u8> {
        (0..MAX_STYLES as u8).filter(|id| self.is_comment(*id)).collect()
    }

    /// All style ids with the string category.
    pub fn string_styles(&self) -> Vec<u8> {
        (0..MAX_STYLES as u8).filter(|id| self.is_string(*id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_table_predicates() {
        let table = StyleTable::new(&[
            (1, "comment_style"),
            (3, "string_style"),
            (5, "keyword_style"),
            (10, "operator_style"),
        ]);
        assert!(table.is_comment(1));
        assert!(!table.is_comment(3));
        assert!(table.is_string(3));
        assert!(table.is_keyword(5));
        assert_eq!(table.category(10), StyleCategory::Operator);
        assert_eq!(table.category(99), StyleCategory::Default);
        assert_eq!(table.comment_styles(), vec![1]);
    }

    #[test]
    fn test_lexer_registry() {
        let registry = LexerRegistry::new();
        assert!(registry.contains(LEXER_NULL));
        assert_eq!(registry.create(LEXER_NULL).unwrap().name(), "null");
        assert!(registry.create(42).is_none());
    }
}
