use super::{Autoindent, caret_in_comment_or_string, grouped, is_non_code, styled_line};
use regex::Regex;
use scribe_core::{DocumentError, StyledTextCtrl};
use std::sync::LazyLock;

static SYNCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[ \t]*(?:while|else|def|return|assert|break|class|continue|elif|try|except|raise|import|yield)\b",
    )
    .expect("static pattern")
});
static CLOSER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:return|break|continue|raise|pass)\b").expect("static pattern")
});
static DEDENTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:else|elif|except|finally)\b").expect("static pattern"));

/// How far back to look for a statement known to start at the left margin of its block.
const PARSE_WINDOWS: [usize; 3] = [50, 500, 5000];

/// Why a line does not start a new statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// The line starts a statement.
    None,
    /// Inside an open `(`, `[` or `{`.
    Bracket,
    /// The previous line ends with a backslash.
    Backslash,
    /// Second line of a string that opened on the previous line.
    StringFirstLine,
    /// Later lines of a multi-line string.
    StringNextLines,
}

#[derive(Debug, Default)]
struct Study {
    /// Positions of the brackets still open.
    brackets: Vec<usize>,
    /// First line of the last interesting statement.
    stmt_start: Option<usize>,
    /// Last code character of that statement.
    last_char: Option<char>,
    backslash: bool,
}

/// Python indenter.
///
/// Scans backwards for a safe place to start, then walks the statements from there using the
/// lexer's styles to tell code from strings and comments. Blank lines and comments written
/// like `#!x` are junk and never serve as the reference statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonAutoindent;

impl PythonAutoindent {
    fn starts_in_string(stc: &dyn StyledTextCtrl, line: usize) -> bool {
        line > 0 && stc.is_style_string(stc.get_style_at(stc.position_from_line(line) - 1))
    }

    fn is_junk(text: &str) -> bool {
        let text = text.trim_start();
        match text.strip_prefix('#') {
            Some(rest) => rest.starts_with(|c: char| !c.is_whitespace()),
            None => text.is_empty(),
        }
    }

    fn parse_start(stc: &dyn StyledTextCtrl, line: usize) -> usize {
        for window in PARSE_WINDOWS {
            let lower = line.saturating_sub(window);
            let found = (lower..line).rev().find(|&ln| {
                !Self::starts_in_string(stc, ln) && SYNCH.is_match(&stc.get_line_text(ln))
            });
            if let Some(found) = found {
                return found;
            }
            if lower == 0 {
                break;
            }
        }
        0
    }

    fn study(stc: &dyn StyledTextCtrl, line: usize) -> Study {
        let mut st = Study::default();
        for ln in Self::parse_start(stc, line)..line {
            let continued =
                !st.brackets.is_empty() || st.backslash || Self::starts_in_string(stc, ln);
            let styled = styled_line(stc, ln);
            if !continued {
                let text: String = styled.iter().map(|(ch, _)| *ch).collect();
                if Self::is_junk(&text) {
                    continue;
                }
                st.stmt_start = Some(ln);
                st.last_char = None;
            }

            let start = stc.position_from_line(ln);
            for (i, &(ch, style)) in styled.iter().enumerate() {
                if stc.is_style_comment(style) {
                    break;
                }
                if stc.is_style_string(style) {
                    st.last_char = Some('x');
                    continue;
                }
                match ch {
                    c if c.is_whitespace() || c == '\\' => continue,
                    '(' | '[' | '{' => st.brackets.push(start + i),
                    ')' | ']' | '}' => {
                        st.brackets.pop();
                    }
                    _ => {}
                }
                st.last_char = Some(ch);
            }
            st.backslash = styled
                .last()
                .is_some_and(|&(ch, style)| ch == '\\' && !is_non_code(stc, style));
        }
        st
    }

    fn classify(stc: &dyn StyledTextCtrl, line: usize, st: &Study) -> Continuation {
        if Self::starts_in_string(stc, line) {
            if Self::starts_in_string(stc, line - 1) {
                Continuation::StringNextLines
            } else {
                Continuation::StringFirstLine
            }
        } else if !st.brackets.is_empty() {
            Continuation::Bracket
        } else if st.backslash {
            Continuation::Backslash
        } else {
            Continuation::None
        }
    }

    /// Continuation state at the start of `line`.
    pub fn continuation(&self, stc: &dyn StyledTextCtrl, line: usize) -> Continuation {
        if line == 0 {
            return Continuation::None;
        }
        Self::classify(stc, line, &Self::study(stc, line))
    }

    /// Line up with the first item after the bracket, or indent one level past its line.
    fn bracket_indent(stc: &dyn StyledTextCtrl, open: usize) -> usize {
        let line = stc.line_from_position(open);
        let end = stc.line_end_position(line);
        let rest = stc.get_text_range(open + 1, end).unwrap_or_default();
        match rest.char_indices().find(|(_, ch)| !ch.is_whitespace()) {
            Some((_, '#' | '\\')) | None => stc.line_indentation(line) + stc.get_indent(),
            Some((offset, _)) => {
                let chars = rest[..offset].chars().count();
                stc.column(open + 1 + chars)
            }
        }
    }

    /// Line up with the value of an assignment, or just past the first word.
    fn backslash_indent(stc: &dyn StyledTextCtrl, line: usize, stmt: usize) -> usize {
        if line - 1 > stmt {
            return stc.line_indentation(line - 1);
        }
        let start = stc.position_from_line(stmt);
        let styled = styled_line(stc, stmt);
        let char_at = |i: usize| styled.get(i).map(|(ch, _)| *ch);

        let mut depth = 0i32;
        let mut assign = None;
        for (i, &(ch, style)) in styled.iter().enumerate() {
            if is_non_code(stc, style) {
                continue;
            }
            match ch {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                '=' if depth == 0
                    && !matches!(i.checked_sub(1).and_then(char_at), Some('=' | '<' | '>' | '!'))
                    && char_at(i + 1) != Some('=') =>
                {
                    assign = Some(i);
                    break;
                }
                _ => {}
            }
        }

        if let Some(eq) = assign {
            let value = (eq + 1..styled.len()).find(|&i| !styled[i].0.is_whitespace());
            if let Some(value) = value
                && styled[value].0 != '\\'
            {
                return stc.column(start + value);
            }
        }
        let first = styled
            .iter()
            .position(|(ch, _)| !ch.is_whitespace())
            .unwrap_or(0);
        let word_end = (first..styled.len())
            .find(|&i| styled[i].0.is_whitespace())
            .unwrap_or(styled.len());
        stc.column(start + word_end) + 1
    }

    fn statement_indent(stc: &dyn StyledTextCtrl, line: usize, st: &Study) -> usize {
        let Some(stmt) = st.stmt_start else {
            return 0;
        };
        let indent = stc.get_indent() as i64;
        let mut want = stc.line_indentation(stmt) as i64;
        let mut closed = false;
        if st.last_char == Some(':') {
            want += indent;
        } else if CLOSER.is_match(&stc.get_line_text(stmt)) {
            want -= indent;
            closed = true;
        }
        if !closed && DEDENTER.is_match(&stc.get_line_text(line)) {
            want -= indent;
        }
        want.max(0) as usize
    }
}

impl Autoindent for PythonAutoindent {
    fn name(&self) -> &'static str {
        "python"
    }

    fn electric_chars(&self) -> &[char] {
        &[':']
    }

    fn find_indent(&self, stc: &dyn StyledTextCtrl, line: usize) -> Option<usize> {
        if line == 0 {
            return Some(0);
        }
        let st = Self::study(stc, line);
        let indent = match Self::classify(stc, line, &st) {
            Continuation::StringFirstLine => 0,
            Continuation::StringNextLines => stc.line_indentation(line - 1),
            Continuation::Bracket => {
                let open = st.brackets.last().copied().unwrap_or_default();
                Self::bracket_indent(stc, open)
            }
            Continuation::Backslash => {
                Self::backslash_indent(stc, line, st.stmt_start.unwrap_or(0))
            }
            Continuation::None => Self::statement_indent(stc, line, &st),
        };
        Some(indent)
    }

    fn reindent_line(
        &self,
        stc: &mut dyn StyledTextCtrl,
        line: Option<usize>,
        dedent_only: bool,
    ) -> Result<(), DocumentError> {
        let line = line.unwrap_or_else(|| stc.get_current_line());
        // Text inside a string is never touched.
        if line == 0 || Self::starts_in_string(stc, line) {
            return Ok(());
        }
        let Some(indent) = self.find_indent(stc, line) else {
            return Ok(());
        };
        if dedent_only && indent > stc.line_indentation(line) {
            return Ok(());
        }
        stc.set_line_indentation(line, indent)
    }

    fn electric_char(&self, stc: &mut dyn StyledTextCtrl, ch: char) -> Result<bool, DocumentError> {
        if ch != ':' || caret_in_comment_or_string(stc, stc.current_position()) {
            return Ok(false);
        }
        grouped(stc, |stc| {
            stc.replace_selection(":")?;
            self.reindent_line(stc, None, true)?;
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_junk_lines() {
        assert!(PythonAutoindent::is_junk("   "));
        assert!(PythonAutoindent::is_junk("    #!/usr/bin/env python"));
        assert!(!PythonAutoindent::is_junk("    # a real comment"));
        assert!(!PythonAutoindent::is_junk("x = 1"));
    }
}
