use super::kate::IndentPattern;
use super::{
    Autoindent, caret_in_comment_or_string, delete_back, delete_forward, grouped, is_non_code,
    styled_line,
};
use regex::Regex;
use scribe_core::{DocumentError, FOLD_LEVEL_BASE, StyledTextCtrl, fold_level_number};
use scribe_highlight_simple::styles;
use std::sync::LazyLock;

static CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(case|default).*:\s*$").expect("static pattern"));
static CLASS_ATTR_SCOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(public|private|protected).*:$").expect("static pattern"));

const ELECTRIC: &[char] = &[';', ':', '{', '}'];

/// Indenter for C-like languages.
///
/// The brace depth recorded in the fold levels gives the base level. On top of that:
/// - a line starting with `}` is one level out, and preprocessor lines go to column zero;
/// - `case`/`default` inside a `switch` and access specifiers inside a `class` are pulled back
///   half a level;
/// - labels go to column zero;
/// - a line following an unterminated statement (`if (x)` with no brace) is a continuation and
///   goes one level in.
#[derive(Debug)]
pub struct CStyleAutoindent {
    indent_after: IndentPattern,
    label: IndentPattern,
}

impl Default for CStyleAutoindent {
    fn default() -> Self {
        Self::new()
    }
}

impl CStyleAutoindent {
    /// The standard rules.
    pub fn new() -> Self {
        Self::with_continuation(r"^(?!.*;\s*//).*[^\s;{}]\s*$")
    }

    /// Override the pattern that marks an unterminated statement.
    pub fn with_continuation(indent_after: &str) -> Self {
        Self {
            indent_after: IndentPattern::new(indent_after, false),
            label: IndentPattern::new(r"^\s*[a-zA-Z_][a-zA-Z0-9_]*:((?!:)|$)", false),
        }
    }

    fn fold(stc: &dyn StyledTextCtrl, line: usize) -> i64 {
        i64::from(fold_level_number(stc.get_fold_level(line))) - i64::from(FOLD_LEVEL_BASE)
    }

    fn is_skipped(stc: &dyn StyledTextCtrl, style: u8) -> bool {
        is_non_code(stc, style) || style == styles::PREPROCESSOR
    }

    /// `line` up to character `limit` with comments, strings and directives blanked.
    fn code_chars(stc: &dyn StyledTextCtrl, line: usize, limit: Option<usize>) -> String {
        let mut chars = styled_line(stc, line);
        if let Some(limit) = limit {
            chars.truncate(limit);
        }
        chars
            .into_iter()
            .map(|(ch, style)| if Self::is_skipped(stc, style) { ' ' } else { ch })
            .collect()
    }

    /// First line of the run of lines sharing `line`'s fold level.
    fn fold_section_start(stc: &dyn StyledTextCtrl, line: usize) -> usize {
        let fold = Self::fold(stc, line);
        let mut ln = line;
        while ln > 0 && Self::fold(stc, ln - 1) == fold {
            ln -= 1;
        }
        ln
    }

    fn paren_balance(text: &str) -> i32 {
        text.chars()
            .map(|ch| match ch {
                '(' => 1,
                ')' => -1,
                _ => 0,
            })
            .sum()
    }

    /// Keyword of the statement that owns the block opened at or above `line`, e.g. `switch`.
    fn brace_opener(stc: &dyn StyledTextCtrl, line: usize) -> String {
        let fold = Self::fold(stc, line);
        let mut statement = String::new();
        let mut first = true;
        let mut parens = false;
        let mut ln = Some(line);
        while let Some(current) = ln {
            if Self::fold(stc, current) != fold {
                break;
            }
            let text = Self::code_chars(stc, current, None);
            let text = text.trim();
            ln = current.checked_sub(1);
            if text.is_empty() {
                continue;
            }
            statement = format!("{text}{statement}");
            if first {
                if let Some(stripped) = statement.strip_suffix('{') {
                    statement = stripped.trim().to_string();
                }
                if statement.ends_with(';') {
                    // A complete statement before the brace: an anonymous block.
                    break;
                }
                if !statement.contains(')') {
                    break;
                }
                parens = true;
                first = false;
            }
            if parens && Self::paren_balance(&statement) == 0 {
                break;
            }
        }
        statement
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Returns `true` if `pos` follows an open parenthesis within its fold section.
    pub fn is_inside_statement(&self, stc: &dyn StyledTextCtrl, pos: usize) -> bool {
        let line = stc.line_from_position(pos);
        let start = Self::fold_section_start(stc, line);
        let mut text = String::new();
        for ln in start..line {
            text.push_str(&Self::code_chars(stc, ln, None));
        }
        let column = pos - stc.position_from_line(line);
        text.push_str(&Self::code_chars(stc, line, Some(column)));
        Self::paren_balance(&text) != 0
    }

    /// Closest non-blank code character before `pos`, stopping at comments and strings.
    fn last_non_whitespace(stc: &dyn StyledTextCtrl, mut pos: usize) -> (Option<char>, usize) {
        let mut found = None;
        while pos > 0 {
            let check = pos - 1;
            if is_non_code(stc, stc.get_style_at(check)) {
                break;
            }
            let Some(ch) = stc.get_char_at(check) else {
                break;
            };
            found = Some(ch);
            pos = check;
            if !ch.is_whitespace() {
                break;
            }
        }
        (found, pos)
    }
}

impl Autoindent for CStyleAutoindent {
    fn name(&self) -> &'static str {
        "c-style"
    }

    fn electric_chars(&self) -> &[char] {
        ELECTRIC
    }

    fn find_indent(&self, stc: &dyn StyledTextCtrl, line: usize) -> Option<usize> {
        let indent = stc.get_indent() as i64;
        let mut fold = Self::fold(stc, line);
        let mut partial = 0;
        let pos = stc.get_line_indent_position(line);
        let at_text = pos < stc.line_end_position(line);
        let ch = if at_text { stc.get_char_at(pos) } else { None };

        match ch {
            Some('}') => fold -= 1,
            Some('{') => {}
            Some('#') if stc.get_style_at(pos) == styles::PREPROCESSOR => fold = 0,
            _ => {
                let start = Self::fold_section_start(stc, line);
                let opener = start
                    .checked_sub(1)
                    .map(|above| Self::brace_opener(stc, above))
                    .unwrap_or_default();
                let current = Self::code_chars(stc, line, None);
                let current = current.trim_end();

                let mut matched = false;
                if (opener == "switch" && CASE.is_match(current))
                    || (opener == "class" && CLASS_ATTR_SCOPE.is_match(current))
                {
                    matched = true;
                    partial = -(indent / 2);
                }
                // After `case` so that `default:` is not taken for a label.
                if !matched && self.label.is_match(current) {
                    fold = 0;
                    matched = true;
                }
                if !matched {
                    for ln in (start..line).rev() {
                        let text = Self::code_chars(stc, ln, None);
                        if text.trim().is_empty() || self.label.is_match(&text) {
                            continue;
                        }
                        if opener == "switch" && CASE.is_match(text.trim_end()) {
                            break;
                        }
                        if self.indent_after.is_match(&text) {
                            fold += 1;
                        }
                        break;
                    }
                }
            }
        }
        Some((fold.max(0) * indent + partial).max(0) as usize)
    }

    fn electric_char(&self, stc: &mut dyn StyledTextCtrl, ch: char) -> Result<bool, DocumentError> {
        if !ELECTRIC.contains(&ch) {
            return Ok(false);
        }
        let pos = stc.current_position();
        if caret_in_comment_or_string(stc, pos) {
            return Ok(false);
        }
        let mut implicit_return = true;
        match ch {
            ':' => {
                let line = stc.get_current_line();
                let column = pos - stc.position_from_line(line);
                let text = format!("{}:", Self::code_chars(stc, line, Some(column)));
                if !CASE.is_match(&text) && !CLASS_ATTR_SCOPE.is_match(&text) {
                    if let (Some(':'), prev) = Self::last_non_whitespace(stc, pos) {
                        // Close up `a :` into `a::`.
                        stc.set_selection(prev + 1, pos);
                    }
                    implicit_return = false;
                }
            }
            ';' if self.is_inside_statement(stc, pos) => return Ok(false),
            _ => {}
        }

        grouped(stc, |stc| {
            stc.replace_selection(&ch.to_string())?;
            self.process_tab(stc)?;
            if implicit_return {
                self.electric_return(stc)?;
            }
            Ok(true)
        })
    }

    fn electric_delete(&self, stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
        let (start, end) = stc.get_selection();
        if start != end || is_non_code(stc, stc.get_style_at(start)) {
            return delete_forward(stc);
        }
        let length = stc.length();
        let mut stop = start;
        while stop < length && matches!(stc.get_char_at(stop), Some(' ' | '\t' | '\r' | '\n')) {
            stop += 1;
        }
        if stop == start {
            return delete_forward(stc);
        }
        stc.delete_range(start, stop - start)?;
        stc.goto_position(start);
        Ok(())
    }

    fn electric_backspace(&self, stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
        let (start, end) = stc.get_selection();
        if start != end || start == 0 || is_non_code(stc, stc.get_style_at(start - 1)) {
            return delete_back(stc);
        }
        let mut first = start;
        while first > 0 && matches!(stc.get_char_at(first - 1), Some(' ' | '\t' | '\r' | '\n')) {
            first -= 1;
        }
        if first == start {
            return delete_back(stc);
        }
        stc.delete_range(first, start - first)?;
        stc.goto_position(first);
        Ok(())
    }
}
