//! Autoindent strategies.
//!
//! A major mode owns one [`Autoindent`] strategy. The editor calls it for the Enter and Tab keys,
//! for Backspace and Delete, and before inserting any character listed by
//! [`Autoindent::electric_chars`]. Strategies only talk to the buffer through
//! [`StyledTextCtrl`], so they can consult styles (to skip comments and strings) and fold levels.
//!
//! | Strategy | Indentation rule |
//! |---|---|
//! | [`NullAutoindent`] | never changes indentation |
//! | [`BasicAutoindent`] | copy the previous non-blank line |
//! | [`RegexAutoindent`] | Kate style `indent_after` / `indent` / `unindent` patterns |
//! | [`CStyleAutoindent`] | brace fold levels plus C heuristics |
//! | [`PythonAutoindent`] | statement parser in the manner of IDLE |
//! | [`Fortran77Autoindent`] | fixed-form columns with regex rules for the code part |
//! | [`MakefileAutoindent`] | tab-indented recipes under targets |

mod cstyle;
mod fortran;
mod kate;
mod makefile;
mod python;

pub use cstyle::CStyleAutoindent;
pub use fortran::Fortran77Autoindent;
pub use kate::{IndentPattern, RegexAutoindent};
pub use makefile::MakefileAutoindent;
pub use python::{Continuation, PythonAutoindent};

use scribe_core::{DocumentError, StyledTextCtrl};

/// An indentation strategy.
pub trait Autoindent: std::fmt::Debug + Send + Sync {
    /// Strategy name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Characters that are routed through [`Autoindent::electric_char`] before insertion.
    fn electric_chars(&self) -> &[char] {
        &[]
    }

    /// Columns line `line` should be indented to, or `None` to leave it alone.
    fn find_indent(&self, stc: &dyn StyledTextCtrl, line: usize) -> Option<usize>;

    /// Reindent `line` (the caret line if `None`). With `dedent_only`, indentation is only ever
    /// removed. The caret keeps its place in the text, or lands on the first non-blank character
    /// if it was inside the indentation.
    fn reindent_line(
        &self,
        stc: &mut dyn StyledTextCtrl,
        line: Option<usize>,
        dedent_only: bool,
    ) -> Result<(), DocumentError> {
        let line = line.unwrap_or_else(|| stc.get_current_line());
        if line == 0 {
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

    /// The Tab key: reindent the caret line as one undo step.
    fn process_tab(&self, stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
        grouped(stc, |stc| self.reindent_line(stc, None, false))
    }

    /// The Enter key: insert a line ending and indent the new line.
    fn electric_return(&self, stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
        grouped(stc, |stc| {
            let line = stc.get_current_line();
            let (start, end) = stc.get_selection();
            if start != end {
                stc.replace_selection("")?;
            }
            let pos = stc.current_position();
            let col = stc.column(pos);
            let linesep = stc.get_linesep();

            if col <= stc.line_indentation(line) {
                // The caret sits in the indentation: split it and keep the text where it was.
                let text = format!("{linesep}{}", stc.get_indent_string(col));
                stc.add_text(&text)
            } else if pos == 0 {
                stc.add_text(linesep)
            } else {
                stc.add_text(linesep)?;
                let indent = self
                    .find_indent(stc, line + 1)
                    .unwrap_or_else(|| stc.line_indentation(line));
                stc.set_line_indentation(line + 1, indent)
            }
        })
    }

    /// Called with a character that has not been inserted yet. Returns `true` if the strategy
    /// inserted it (and did whatever else it wanted to).
    fn electric_char(
        &self,
        _stc: &mut dyn StyledTextCtrl,
        _ch: char,
    ) -> Result<bool, DocumentError> {
        Ok(false)
    }

    /// The Backspace key.
    fn electric_backspace(&self, stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
        delete_back(stc)
    }

    /// The Delete key.
    fn electric_delete(&self, stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
        delete_forward(stc)
    }
}

// -------------------------------------------------------------------------------------------
// Shared helpers

/// Run `f` inside one undo group.
pub(crate) fn grouped<R>(
    stc: &mut dyn StyledTextCtrl,
    f: impl FnOnce(&mut dyn StyledTextCtrl) -> Result<R, DocumentError>,
) -> Result<R, DocumentError> {
    stc.begin_undo_action();
    let result = f(stc);
    stc.end_undo_action();
    result
}

/// Delete the selection or the character before the caret.
pub(crate) fn delete_back(stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
    let (start, end) = stc.get_selection();
    if start != end {
        return stc.replace_selection("");
    }
    if start == 0 {
        return Ok(());
    }
    // A CRLF pair goes as one unit.
    let n = if start >= 2 && stc.get_text_range(start - 2, start)? == "\r\n" {
        2
    } else {
        1
    };
    stc.delete_range(start - n, n)?;
    stc.goto_position(start - n);
    Ok(())
}

/// Delete the selection or the character after the caret.
pub(crate) fn delete_forward(stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
    let (start, end) = stc.get_selection();
    if start != end {
        return stc.replace_selection("");
    }
    let length = stc.length();
    if start >= length {
        return Ok(());
    }
    let n = if start + 2 <= length && stc.get_text_range(start, start + 2)? == "\r\n" {
        2
    } else {
        1
    };
    stc.delete_range(start, n)?;
    stc.goto_position(start);
    Ok(())
}

/// Returns `true` if `style` marks a comment or a string.
pub(crate) fn is_non_code(stc: &dyn StyledTextCtrl, style: u8) -> bool {
    stc.is_style_comment(style) || stc.is_style_string(style)
}

/// Returns `true` if text typed at `pos` would land in a comment or a string.
pub(crate) fn caret_in_comment_or_string(stc: &dyn StyledTextCtrl, pos: usize) -> bool {
    if is_non_code(stc, stc.get_style_at(pos)) {
        return true;
    }
    let line_start = stc.position_from_line(stc.line_from_position(pos));
    // At the end of a line comment the caret takes the style of the line ending.
    pos > line_start
        && stc.is_style_comment(stc.get_style_at(pos - 1))
        && !(pos >= line_start + 2 && stc.get_text_range(pos - 2, pos).is_ok_and(|t| t == "*/"))
}

/// Characters of `line` paired with their style.
pub(crate) fn styled_line(stc: &dyn StyledTextCtrl, line: usize) -> Vec<(char, u8)> {
    let start = stc.position_from_line(line);
    stc.get_line_text(line)
        .chars()
        .enumerate()
        .map(|(i, ch)| (ch, stc.get_style_at(start + i)))
        .collect()
}

/// Text of `line` with comments and strings blanked out.
pub(crate) fn code_chars(stc: &dyn StyledTextCtrl, line: usize) -> String {
    styled_line(stc, line)
        .into_iter()
        .map(|(ch, style)| if is_non_code(stc, style) { ' ' } else { ch })
        .collect()
}

/// Returns `true` if the first visible character of `line` is comment styled.
pub(crate) fn starts_with_comment(stc: &dyn StyledTextCtrl, line: usize) -> bool {
    let pos = stc.get_line_indent_position(line);
    pos < stc.line_end_position(line) && stc.is_style_comment(stc.get_style_at(pos))
}

// -------------------------------------------------------------------------------------------
// Null and basic

/// Leaves indentation alone: Enter inserts a bare line ending, Tab inserts one indent unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAutoindent;

impl Autoindent for NullAutoindent {
    fn name(&self) -> &'static str {
        "null"
    }

    fn find_indent(&self, stc: &dyn StyledTextCtrl, line: usize) -> Option<usize> {
        Some(stc.line_indentation(line))
    }

    fn reindent_line(
        &self,
        _stc: &mut dyn StyledTextCtrl,
        _line: Option<usize>,
        _dedent_only: bool,
    ) -> Result<(), DocumentError> {
        Ok(())
    }

    fn process_tab(&self, stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
        let text = stc.get_indent_string(stc.get_indent());
        stc.replace_selection(&text)
    }

    fn electric_return(&self, stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
        let linesep = stc.get_linesep();
        stc.replace_selection(linesep)
    }
}

/// Indents each line like the nearest non-blank line above it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAutoindent;

impl Autoindent for BasicAutoindent {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn find_indent(&self, stc: &dyn StyledTextCtrl, line: usize) -> Option<usize> {
        Some(stc.get_prev_line_indentation(line).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scribe_core::{ViewSettings, Workspace};

    fn run(text: &str, caret: usize, f: impl FnOnce(&mut dyn StyledTextCtrl)) -> (String, usize) {
        let mut ws = Workspace::new();
        let doc = ws.open_text(None, text);
        let view = ws.attach_view(doc, ViewSettings::default()).unwrap();
        let mut session = ws.session(view).unwrap();
        session.goto_position(caret);
        f(&mut session);
        (session.get_text(), session.current_position())
    }

    #[test]
    fn test_null_return_and_tab() {
        let (text, caret) = run("    abc", 7, |stc| NullAutoindent.electric_return(stc).unwrap());
        assert_eq!(text, "    abc\n");
        assert_eq!(caret, 8);

        let (text, _) = run("x", 0, |stc| NullAutoindent.process_tab(stc).unwrap());
        assert_eq!(text, "    x");
    }

    #[test]
    fn test_basic_return_in_indentation_splits_whitespace() {
        let (text, caret) = run("    abc", 2, |stc| BasicAutoindent.electric_return(stc).unwrap());
        assert_eq!(text, "  \n    abc");
        assert_eq!(caret, 5);
    }

    #[test]
    fn test_delete_helpers_treat_crlf_as_one_unit() {
        let (text, caret) = run("a\r\nb", 3, |stc| BasicAutoindent.electric_backspace(stc).unwrap());
        assert_eq!((text.as_str(), caret), ("ab", 1));

        let (text, caret) = run("a\r\nb", 1, |stc| BasicAutoindent.electric_delete(stc).unwrap());
        assert_eq!((text.as_str(), caret), ("ab", 1));
    }
}
