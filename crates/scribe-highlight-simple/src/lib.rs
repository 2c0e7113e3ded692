//! `scribe-highlight-simple` - regex based container lexers for `scribe-core`.
//!
//! A [`RegexLexer`] styles a document line by line: at every position the earliest matching
//! [`BlockRule`] or [`RegexRule`] wins, ties going to blocks and then to rule order. Block rules
//! (C comments, Python triple quoted strings) may span lines; the open block is recovered from
//! the style of the previous line's line ending, so lexing can restart at any line.
//!
//! After styling, the lexer computes fold levels with one of the [`FoldStrategy`] variants.
//! Levels follow the `scribe-core` encoding: [`FOLD_LEVEL_BASE`] plus a depth, with
//! [`FOLD_LEVEL_HEADER_FLAG`] on lines that open a block and [`FOLD_LEVEL_WHITE_FLAG`] on blank
//! lines.
//!
//! These lexers are intentionally small. They are good enough for the fold explorer, paragraph
//! fill and the comment-aware indenters, not for a full parse.

use regex::Regex;
use scribe_core::{
    FOLD_LEVEL_BASE, FOLD_LEVEL_HEADER_FLAG, FOLD_LEVEL_NUMBER_MASK, FOLD_LEVEL_WHITE_FLAG, Lexer,
    LexerRegistry, NullLexer, StyleTable, Styler,
};
use std::collections::HashMap;

/// Style ids shared by the built-in presets.
pub mod styles {
    /// Plain text.
    pub const DEFAULT: u8 = 0;
    /// Block comment.
    pub const COMMENT: u8 = 1;
    /// Line comment.
    pub const COMMENT_LINE: u8 = 2;
    /// Number literal.
    pub const NUMBER: u8 = 3;
    /// Primary keyword.
    pub const KEYWORD: u8 = 4;
    /// String literal.
    pub const STRING: u8 = 5;
    /// Character literal.
    pub const CHARACTER: u8 = 6;
    /// Operator.
    pub const OPERATOR: u8 = 7;
    /// Preprocessor directive or variable reference.
    pub const PREPROCESSOR: u8 = 9;
    /// Secondary keyword (builtins, types).
    pub const KEYWORD2: u8 = 10;
    /// Triple double quoted string.
    pub const TRIPLE_DOUBLE: u8 = 11;
    /// Triple single quoted string.
    pub const TRIPLE_SINGLE: u8 = 12;

    /// Category pairs for [`scribe_core::StyleTable::new`].
    pub const TABLE: &[(u8, &str)] = &[
        (DEFAULT, "default"),
        (COMMENT, "comment"),
        (COMMENT_LINE, "comment"),
        (NUMBER, "number"),
        (KEYWORD, "keyword"),
        (STRING, "string"),
        (CHARACTER, "character"),
        (OPERATOR, "operator"),
        (PREPROCESSOR, "preprocessor"),
        (KEYWORD2, "keyword2"),
        (TRIPLE_DOUBLE, "string"),
        (TRIPLE_SINGLE, "string"),
    ];
}

/// Lexer id of the Python preset.
pub const LEXER_PYTHON: u32 = 2;
/// Lexer id of the C/C++ preset.
pub const LEXER_CPP: u32 = 3;
/// Lexer id of the makefile preset.
pub const LEXER_MAKEFILE: u32 = 11;
/// Lexer id of the fixed-form Fortran 77 preset.
pub const LEXER_FORTRAN77: u32 = 37;
/// Lexer id of the shell script preset.
pub const LEXER_BASH: u32 = 62;

/// A single regex styling rule.
#[derive(Debug, Clone)]
pub struct RegexRule {
    regex: Regex,
    style: u8,
    capture_group: Option<usize>,
}

impl RegexRule {
    pub fn new(pattern: &str, style: u8) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            style,
            capture_group: None,
        })
    }

    /// Style only a capture group of each match. The whole match is still consumed.
    ///
    /// Example (makefile target):
    /// - pattern: `^([^\s:=#]+)\s*:`
    /// - capture_group: `1` (the target name)
    pub fn with_capture_group(mut self, group: usize) -> Self {
        self.capture_group = Some(group);
        self
    }

    pub fn style(&self) -> u8 {
        self.style
    }

    /// Next match at or after byte `pos`: (match start, match end, styled start, styled end).
    fn find_at(&self, text: &str, pos: usize) -> Option<(usize, usize, usize, usize)> {
        match self.capture_group {
            Some(group) => {
                let caps = self.regex.captures_at(text, pos)?;
                let whole = caps.get(0)?;
                let (s, e) = caps
                    .get(group)
                    .map_or((whole.start(), whole.start()), |m| (m.start(), m.end()));
                Some((whole.start(), whole.end(), s, e))
            }
            None => {
                let m = self.regex.find_at(text, pos)?;
                Some((m.start(), m.end(), m.start(), m.end()))
            }
        }
    }
}

/// A delimited region that may span lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRule {
    start: String,
    end: String,
    style: u8,
}

impl BlockRule {
    pub fn new(start: &str, end: &str, style: u8) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            style,
        }
    }
}

/// How a [`RegexLexer`] derives fold levels.
#[derive(Debug, Clone, Default)]
pub enum FoldStrategy {
    /// Leave fold levels alone.
    #[default]
    None,
    /// Indentation columns; a line is a header when the next non-blank line is deeper.
    Indent,
    /// Net count of `{` and `}` outside comments and strings.
    Braces,
    /// Net count of opening and closing keyword matches outside comments and strings.
    Keywords {
        /// Matches that open a block.
        open: Regex,
        /// Matches that close a block.
        close: Regex,
    },
}

/// A container lexer driven by regex rules.
#[derive(Debug, Clone)]
pub struct RegexLexer {
    name: String,
    rules: Vec<RegexRule>,
    blocks: Vec<BlockRule>,
    fold: FoldStrategy,
    table: StyleTable,
    properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
enum Token {
    Block(usize),
    Rule(usize),
}

impl RegexLexer {
    pub fn new(name: &str, rules: Vec<RegexRule>) -> Self {
        Self {
            name: name.to_string(),
            rules,
            blocks: Vec::new(),
            fold: FoldStrategy::None,
            table: StyleTable::new(styles::TABLE),
            properties: HashMap::new(),
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<BlockRule>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_fold(mut self, fold: FoldStrategy) -> Self {
        self.fold = fold;
        self
    }

    pub fn with_style_table(mut self, table: StyleTable) -> Self {
        self.table = table;
        self
    }

    pub fn rules(&self) -> &[RegexRule] {
        &self.rules
    }

    /// Style categories this lexer's ids map to.
    pub fn style_table(&self) -> &StyleTable {
        &self.table
    }

    /// Value of a property received through [`Lexer::set_property`].
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    fn folding_enabled(&self) -> bool {
        !matches!(self.fold, FoldStrategy::None) && self.property("fold") != Some("0")
    }

    fn tab_width(&self) -> usize {
        self.property("tab.size")
            .and_then(|v| v.parse().ok())
            .filter(|w| *w > 0)
            .unwrap_or(8)
    }

    // ---------------------------------------------------------------------------------------
    // Presets

    /// Python: comments, strings, triple quoted strings, keywords; indentation folding.
    pub fn python() -> Result<Self, regex::Error> {
        Ok(Self::new(
            "python",
            vec![
                RegexRule::new(r"#.*", styles::COMMENT_LINE)?,
                RegexRule::new(r#""(?:\\.|[^"\\])*"?"#, styles::STRING)?,
                RegexRule::new(r"'(?:\\.|[^'\\])*'?", styles::CHARACTER)?,
                RegexRule::new(
                    r"\b(?:and|as|assert|async|await|break|class|continue|def|del|elif|else|except|finally|for|from|global|if|import|in|is|lambda|nonlocal|not|or|pass|raise|return|try|while|with|yield|None|True|False)\b",
                    styles::KEYWORD,
                )?,
                RegexRule::new(r"\b(?:0[xX][0-9a-fA-F_]+|\d[\d_]*(?:\.\d*)?(?:[eE][+-]?\d+)?j?)\b", styles::NUMBER)?,
                RegexRule::new(r"@\w+(?:\.\w+)*", styles::PREPROCESSOR)?,
                RegexRule::new(r"[-+*/%=<>!&|^~:;,.()\[\]{}]", styles::OPERATOR)?,
            ],
        )
        .with_blocks(vec![
            BlockRule::new(r#"""""#, r#"""""#, styles::TRIPLE_DOUBLE),
            BlockRule::new("'''", "'''", styles::TRIPLE_SINGLE),
        ])
        .with_fold(FoldStrategy::Indent))
    }

    /// C and C++: block and line comments, literals, preprocessor lines; brace folding.
    pub fn c() -> Result<Self, regex::Error> {
        Ok(Self::new(
            "cpp",
            vec![
                RegexRule::new(r"//.*", styles::COMMENT_LINE)?,
                RegexRule::new(r"^\s*#\s*\w+", styles::PREPROCESSOR)?,
                RegexRule::new(r#""(?:\\.|[^"\\])*"?"#, styles::STRING)?,
                RegexRule::new(r"'(?:\\.|[^'\\])*'?", styles::CHARACTER)?,
                RegexRule::new(
                    r"\b(?:auto|break|case|const|continue|default|do|else|enum|extern|for|goto|if|inline|register|return|sizeof|static|struct|switch|typedef|union|volatile|while|class|namespace|public|private|protected|template|typename|virtual|new|delete|this|using)\b",
                    styles::KEYWORD,
                )?,
                RegexRule::new(
                    r"\b(?:bool|char|double|float|int|long|short|signed|unsigned|void|size_t)\b",
                    styles::KEYWORD2,
                )?,
                RegexRule::new(r"\b(?:0[xX][0-9a-fA-F]+|\d+(?:\.\d*)?(?:[eE][+-]?\d+)?)[uUlLfF]*\b", styles::NUMBER)?,
                RegexRule::new(r"[-+*/%=<>!&|^~?:;,.()\[\]{}]", styles::OPERATOR)?,
            ],
        )
        .with_blocks(vec![BlockRule::new("/*", "*/", styles::COMMENT)])
        .with_fold(FoldStrategy::Braces))
    }

    /// Fixed-form Fortran 77: column one comments, case-insensitive keywords; keyword folding.
    pub fn fortran77() -> Result<Self, regex::Error> {
        Ok(Self::new(
            "f77",
            vec![
                RegexRule::new(r"^[cC*!].*", styles::COMMENT_LINE)?,
                RegexRule::new(r"!.*", styles::COMMENT_LINE)?,
                RegexRule::new(r"'(?:''|[^'])*'?", styles::STRING)?,
                RegexRule::new(
                    r"(?i)\b(?:program|subroutine|function|end|endif|enddo|if|then|else|elseif|do|continue|goto|go\s+to|call|return|stop|common|dimension|parameter|data|format|implicit|none|integer|real|double\s+precision|logical|character|complex|external|intrinsic|save|read|write|open|close)\b",
                    styles::KEYWORD,
                )?,
                RegexRule::new(r"(?i)\.(?:and|or|not|eq|ne|lt|le|gt|ge|true|false)\.", styles::OPERATOR)?,
                RegexRule::new(r"\b\d+(?:\.\d*)?(?:[eEdD][+-]?\d+)?\b", styles::NUMBER)?,
            ],
        )
        .with_fold(FoldStrategy::Keywords {
            open: Regex::new(
                r"(?i)^\s*(?:\d+\s+)?(?:program|subroutine|(?:\w+\s+)*function|block\s*data|do)\b|(?i)\bthen\s*$",
            )?,
            close: Regex::new(
                r"(?i)^\s*(?:\d+\s+)?end(?:\s*(?:if|do|subroutine|function|program))?\b|(?i)^\s*else\s*if\b|(?i)^\s*\d+\s+continue\b",
            )?,
        }))
    }

    /// Makefiles: comments, targets, variable references.
    pub fn makefile() -> Result<Self, regex::Error> {
        Ok(Self::new(
            "makefile",
            vec![
                RegexRule::new(r"#.*", styles::COMMENT_LINE)?,
                RegexRule::new(r"\$(?:\([^)]*\)|\{[^}]*\}|.)", styles::PREPROCESSOR)?,
                RegexRule::new(r"^([^\s:=#][^:=#]*?)\s*::?(?:[^=]|$)", styles::KEYWORD)?
                    .with_capture_group(1),
                RegexRule::new(r"^\s*(?:ifeq|ifneq|ifdef|ifndef|else|endif|include|define|endef|export)\b", styles::KEYWORD2)?,
                RegexRule::new(r"[:+?]?=", styles::OPERATOR)?,
            ],
        )
        .with_fold(FoldStrategy::Indent))
    }

    /// Plain text: no styling, indentation folding.
    pub fn text() -> Self {
        Self::new("text", Vec::new()).with_fold(FoldStrategy::Indent)
    }

    /// POSIX shell scripts: comments, strings, variables, keywords; brace folding.
    pub fn shell() -> Result<Self, regex::Error> {
        Ok(Self::new(
            "bash",
            vec![
                RegexRule::new(r"(?:^|[\s;])#.*", styles::COMMENT_LINE)?,
                RegexRule::new(r#""(?:\\.|[^"\\])*"?"#, styles::STRING)?,
                RegexRule::new(r"'[^']*'?", styles::CHARACTER)?,
                RegexRule::new(r"\$(?:\{[^}]*\}|\w+|[#?@*$!0-9-])", styles::PREPROCESSOR)?,
                RegexRule::new(
                    r"\b(?:if|then|else|elif|fi|case|esac|for|while|until|do|done|in|function|select|return|local|export)\b",
                    styles::KEYWORD,
                )?,
                RegexRule::new(r"\b\d+\b", styles::NUMBER)?,
                RegexRule::new(r"[|&;<>(){}]", styles::OPERATOR)?,
            ],
        )
        .with_fold(FoldStrategy::Braces))
    }

    // ---------------------------------------------------------------------------------------
    // Lexing

    /// Style one line (without its ending). Returns per-byte styles and the block still open.
    fn scan_line(&self, text: &str, mut open: Option<usize>) -> (Vec<u8>, Option<usize>) {
        let mut out = vec![styles::DEFAULT; text.len()];
        let mut pos = 0;
        let mut cached: Vec<Option<Option<(usize, usize, usize, usize)>>> = vec![None; self.rules.len()];

        loop {
            if let Some(idx) = open {
                let block = &self.blocks[idx];
                match text[pos..].find(&block.end) {
                    Some(rel) => {
                        let stop = pos + rel + block.end.len();
                        out[pos..stop].fill(block.style);
                        pos = stop;
                        open = None;
                    }
                    None => {
                        out[pos..].fill(block.style);
                        return (out, open);
                    }
                }
                continue;
            }
            if pos >= text.len() {
                return (out, None);
            }

            let mut best: Option<(usize, usize, usize, usize, Token)> = None;
            for (i, block) in self.blocks.iter().enumerate() {
                if let Some(rel) = text[pos..].find(&block.start) {
                    let s = pos + rel;
                    let e = s + block.start.len();
                    if best.is_none_or(|b| s < b.0) {
                        best = Some((s, e, s, e, Token::Block(i)));
                    }
                }
            }
            for (i, rule) in self.rules.iter().enumerate() {
                let stale = match cached[i] {
                    None => true,
                    Some(Some((s, ..))) => s < pos,
                    Some(None) => false,
                };
                if stale {
                    cached[i] = Some(rule.find_at(text, pos));
                }
                if let Some(Some((s, e, ss, se))) = cached[i]
                    && best.is_none_or(|b| s < b.0)
                {
                    best = Some((s, e, ss, se, Token::Rule(i)));
                }
            }

            let Some((start, end, styled_start, styled_end, token)) = best else {
                return (out, None);
            };
            match token {
                Token::Block(i) => {
                    out[start..end].fill(self.blocks[i].style);
                    open = Some(i);
                    pos = end;
                }
                Token::Rule(i) => {
                    out[styled_start..styled_end].fill(self.rules[i].style);
                    pos = if end > start {
                        end
                    } else {
                        start + text[start..].chars().next().map_or(1, char::len_utf8)
                    };
                }
            }
        }
    }

    fn open_block_before(&self, styler: &dyn Styler, line: usize) -> Option<usize> {
        if line == 0 {
            return None;
        }
        let style = styler.style_at(styler.position_from_line(line) - 1);
        self.blocks.iter().position(|b| b.style == style)
    }

    fn is_code_style(&self, style: u8) -> bool {
        !self.table.is_comment(style) && !self.table.is_string(style)
    }

    /// Net block depth change of one styled line.
    fn line_delta(&self, text: &str, char_styles: &[u8]) -> i32 {
        let code_at = |byte: usize| {
            let idx = text[..byte].chars().count();
            char_styles
                .get(idx)
                .is_some_and(|s| self.is_code_style(*s))
        };
        match &self.fold {
            FoldStrategy::Braces => text
                .char_indices()
                .filter(|(b, _)| code_at(*b))
                .map(|(_, ch)| match ch {
                    '{' => 1,
                    '}' => -1,
                    _ => 0,
                })
                .sum(),
            FoldStrategy::Keywords { open, close } => {
                let opens = open.find_iter(text).filter(|m| code_at(m.start())).count();
                let closes = close.find_iter(text).filter(|m| code_at(m.start())).count();
                opens as i32 - closes as i32
            }
            FoldStrategy::None | FoldStrategy::Indent => 0,
        }
    }

    fn line_char_styles(styler: &dyn Styler, line: usize) -> Vec<u8> {
        let start = styler.position_from_line(line);
        let end = styler.line_end_position(line);
        (start..end).map(|pos| styler.style_at(pos)).collect()
    }

    fn fold_by_depth(&self, styler: &mut dyn Styler, lines: &[(usize, String, Vec<u8>)]) {
        let Some((first, ..)) = lines.first() else {
            return;
        };
        let mut depth: i32 = if *first == 0 {
            0
        } else {
            let prev = first - 1;
            let prev_level = styler.fold_level(prev) & FOLD_LEVEL_NUMBER_MASK;
            let prev_depth = prev_level.saturating_sub(FOLD_LEVEL_BASE) as i32;
            let prev_text = styler.line_text(prev);
            let prev_styles = Self::line_char_styles(styler, prev);
            (prev_depth + self.line_delta(&prev_text, &prev_styles)).max(0)
        };

        for (line, text, char_styles) in lines {
            let delta = self.line_delta(text, char_styles);
            let mut level = clamp_level(depth as u32);
            if text.trim().is_empty() {
                level |= FOLD_LEVEL_WHITE_FLAG;
            } else if delta > 0 {
                level |= FOLD_LEVEL_HEADER_FLAG;
            }
            styler.set_fold_level(*line, level);
            depth = (depth + delta).max(0);
        }
    }

    fn fold_by_indent(&self, styler: &mut dyn Styler, lines: &[(usize, String, Vec<u8>)]) {
        let Some((last, ..)) = lines.last() else {
            return;
        };
        let tab_width = self.tab_width();
        let mut next = (last + 1..styler.line_count())
            .find_map(|line| indent_columns(&styler.line_text(line), tab_width));

        for (line, text, _) in lines.iter().rev() {
            let level = match indent_columns(text, tab_width) {
                None => clamp_level(next.unwrap_or(0)) | FOLD_LEVEL_WHITE_FLAG,
                Some(indent) => {
                    let header = next.is_some_and(|n| n > indent);
                    next = Some(indent);
                    if header {
                        clamp_level(indent) | FOLD_LEVEL_HEADER_FLAG
                    } else {
                        clamp_level(indent)
                    }
                }
            };
            styler.set_fold_level(*line, level);
        }
    }
}

fn clamp_level(depth: u32) -> u32 {
    (FOLD_LEVEL_BASE + depth).min(FOLD_LEVEL_NUMBER_MASK)
}

/// Indentation in columns, `None` for blank lines.
fn indent_columns(text: &str, tab_width: usize) -> Option<u32> {
    if text.trim().is_empty() {
        return None;
    }
    let mut col = 0usize;
    for ch in text.chars() {
        match ch {
            ' ' => col += 1,
            '\t' => col = (col / tab_width + 1) * tab_width,
            _ => break,
        }
    }
    Some(col as u32)
}

impl Lexer for RegexLexer {
    fn name(&self) -> &str {
        &self.name
    }

    fn adjust_start(&self, styler: &dyn Styler, pos: usize) -> usize {
        let mut line = styler.line_from_position(pos);
        if matches!(self.fold, FoldStrategy::Indent) {
            while line > 0 {
                line -= 1;
                if !styler.line_text(line).trim().is_empty() {
                    break;
                }
            }
        }
        styler.position_from_line(line)
    }

    fn style_text(&mut self, styler: &mut dyn Styler, start: usize, end: usize) {
        let length = styler.length();
        let first = styler.line_from_position(start);
        let last = styler.line_from_position(end.min(length));
        let mut open = self.open_block_before(styler, first);
        let mut lines = Vec::with_capacity(last - first + 1);

        for line in first..=last {
            let line_start = styler.position_from_line(line);
            let text = styler.line_text(line);
            let (byte_styles, still_open) = self.scan_line(&text, open);
            open = still_open;

            let char_styles: Vec<u8> = text.char_indices().map(|(b, _)| byte_styles[b]).collect();
            let next_start = if line + 1 < styler.line_count() {
                styler.position_from_line(line + 1)
            } else {
                length
            };
            let eol_len = next_start.saturating_sub(line_start + char_styles.len());
            let eol_style = open.map_or(styles::DEFAULT, |i| self.blocks[i].style);
            let mut all = char_styles.clone();
            all.extend(std::iter::repeat_n(eol_style, eol_len));
            styler.set_styles(line_start, &all);
            lines.push((line, text, char_styles));
        }

        tracing::trace!(lexer = %self.name, first, last, "styled lines");

        if !self.folding_enabled() {
            return;
        }
        match self.fold {
            FoldStrategy::Indent => self.fold_by_indent(styler, &lines),
            FoldStrategy::Braces | FoldStrategy::Keywords { .. } => self.fold_by_depth(styler, &lines),
            FoldStrategy::None => {}
        }
    }

    fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }
}

fn boxed(name: &str, preset: Result<RegexLexer, regex::Error>) -> Box<dyn Lexer> {
    match preset {
        Ok(lexer) => Box::new(lexer),
        Err(err) => {
            tracing::error!(lexer = name, error = %err, "invalid preset pattern; using the null lexer");
            Box::new(NullLexer)
        }
    }
}

/// Register the built-in presets under their lexer ids.
pub fn register_builtins(registry: &mut LexerRegistry) {
    registry.register(LEXER_PYTHON, || boxed("python", RegexLexer::python()));
    registry.register(LEXER_CPP, || boxed("cpp", RegexLexer::c()));
    registry.register(LEXER_FORTRAN77, || boxed("f77", RegexLexer::fortran77()));
    registry.register(LEXER_MAKEFILE, || boxed("makefile", RegexLexer::makefile()));
    registry.register(LEXER_BASH, || boxed("bash", RegexLexer::shell()));
}
