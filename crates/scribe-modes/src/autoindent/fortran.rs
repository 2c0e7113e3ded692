use super::kate::{RegexAutoindent, adjust};
use super::{Autoindent, grouped};
use scribe_core::{DocumentError, StyledTextCtrl};

/// Columns 1-5 hold the statement label.
const LABEL_WIDTH: usize = 5;
/// Column 6 marks continuation lines; code starts after it.
const CODE_COLUMN: usize = 6;

const DIGITS: &[char] = &['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// Fixed-form Fortran 77 indenter.
///
/// Only the code part of a line (from column 7) is indented; labels are kept right-aligned in
/// columns 1-5 while they are typed. Block structure comes from case-insensitive rules for
/// `IF ... THEN`, `ELSE`, `DO` and their closers.
#[derive(Debug)]
pub struct Fortran77Autoindent {
    rules: RegexAutoindent,
}

impl Default for Fortran77Autoindent {
    fn default() -> Self {
        Self::new()
    }
}

impl Fortran77Autoindent {
    /// The standard block rules.
    pub fn new() -> Self {
        Self {
            rules: RegexAutoindent::with_case(
                r"(\b(IF)\b(?=.+THEN)|\b(ELSEIF|ELSE|DO)\b)",
                "",
                r"(\b(ELSEIF|ELSE|ENDIF|ENDDO|CONTINUE)\b)",
                "",
                true,
            ),
        }
    }

    /// Returns `true` for comment lines: `C`, `c`, `*` or `!` in column 1, or a line whose
    /// first visible character is `!`.
    pub fn is_comment(text: &str) -> bool {
        text.starts_with(['C', 'c', '*', '!']) || text.trim_start().starts_with('!')
    }

    /// Returns `true` for continuation lines: any mark other than blank or `0` in column 6.
    pub fn is_continuation(text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        chars.len() > LABEL_WIDTH
            && !matches!(chars[LABEL_WIDTH], ' ' | '0')
            && chars[..LABEL_WIDTH].iter().all(|c| *c == ' ')
    }

    /// Char offset of the first code character, never less than the code column.
    fn code_start(chars: &[char]) -> usize {
        (CODE_COLUMN..chars.len())
            .find(|&i| !chars[i].is_whitespace())
            .unwrap_or(chars.len())
            .max(CODE_COLUMN)
    }

    fn code_part(text: &str) -> String {
        text.chars().skip(CODE_COLUMN).collect::<String>().trim().to_string()
    }

    fn is_statement(text: &str) -> bool {
        !text.trim().is_empty() && !Self::is_comment(text) && !Self::is_continuation(text)
    }
}

impl Autoindent for Fortran77Autoindent {
    fn name(&self) -> &'static str {
        "fortran77"
    }

    fn electric_chars(&self) -> &[char] {
        DIGITS
    }

    fn find_indent(&self, stc: &dyn StyledTextCtrl, line: usize) -> Option<usize> {
        let text = stc.get_line_text(line);
        if Self::is_comment(&text) || Self::is_continuation(&text) {
            return None;
        }
        let above = (0..line).rev().find(|&ln| Self::is_statement(&stc.get_line_text(ln)));
        let (base, above_text) = match above {
            Some(ln) => {
                let above_text = stc.get_line_text(ln);
                let chars: Vec<char> = above_text.chars().collect();
                (Self::code_start(&chars), Self::code_part(&above_text))
            }
            None => (CODE_COLUMN, String::new()),
        };
        let adjustment = self
            .rules
            .adjustment(stc, None, &above_text, &Self::code_part(&text), false);
        Some(adjust(base, adjustment, stc.get_indent()).max(CODE_COLUMN))
    }

    fn reindent_line(
        &self,
        stc: &mut dyn StyledTextCtrl,
        line: Option<usize>,
        dedent_only: bool,
    ) -> Result<(), DocumentError> {
        let line = line.unwrap_or_else(|| stc.get_current_line());
        let Some(want) = self.find_indent(stc, line) else {
            return Ok(());
        };
        let text = stc.get_line_text(line);
        let chars: Vec<char> = text.chars().collect();
        let code_start = Self::code_start(&chars);
        if dedent_only && want > code_start {
            return Ok(());
        }

        let mut rebuilt: String = chars.iter().take(CODE_COLUMN).collect();
        while rebuilt.chars().count() < CODE_COLUMN {
            rebuilt.push(' ');
        }
        rebuilt.push_str(&" ".repeat(want - CODE_COLUMN));
        rebuilt.extend(chars.iter().skip(code_start));

        let start = stc.position_from_line(line);
        let caret = stc.current_position();
        let on_line = stc.line_from_position(caret) == line;
        if rebuilt != text {
            stc.set_target_range(start, stc.line_end_position(line));
            stc.replace_target(&rebuilt)?;
        }
        // A caret left of the code moves to it, even when nothing was rewritten.
        if on_line {
            let col = caret - start;
            let col = if col <= code_start { want } else { col + want - code_start };
            stc.goto_position(start + col);
        }
        Ok(())
    }

    fn electric_return(&self, stc: &mut dyn StyledTextCtrl) -> Result<(), DocumentError> {
        grouped(stc, |stc| {
            let linesep = stc.get_linesep();
            stc.replace_selection(linesep)?;
            self.reindent_line(stc, None, false)
        })
    }

    fn electric_char(&self, stc: &mut dyn StyledTextCtrl, ch: char) -> Result<bool, DocumentError> {
        if !ch.is_ascii_digit() {
            return Ok(false);
        }
        let pos = stc.current_position();
        let line = stc.line_from_position(pos);
        let start = stc.position_from_line(line);
        let col = pos - start;
        if col > LABEL_WIDTH {
            return Ok(false);
        }
        let text = stc.get_line_text(line);
        if Self::is_comment(&text) {
            return Ok(false);
        }
        let chars: Vec<char> = text.chars().collect();
        let label_len = chars.len().min(LABEL_WIDTH);
        let label = &chars[..label_len];
        if !label.iter().all(|c| *c == ' ' || c.is_ascii_digit()) {
            return Ok(false);
        }

        let before = label[..col.min(label_len)]
            .iter()
            .filter(|c| c.is_ascii_digit())
            .count();
        let mut digits: String = label.iter().filter(|c| c.is_ascii_digit()).collect();
        digits.insert(before, ch);
        if digits.len() > LABEL_WIDTH {
            return Ok(false);
        }
        let rebuilt = format!("{digits:>width$}", width = LABEL_WIDTH);

        grouped(stc, |stc| {
            stc.set_target_range(start, start + label_len);
            stc.replace_target(&rebuilt)?;
            let caret = stc.find_column(line, col + 1);
            stc.goto_position(caret);
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_kinds() {
        assert!(Fortran77Autoindent::is_comment("C     comment"));
        assert!(Fortran77Autoindent::is_comment("      ! indented comment"));
        assert!(!Fortran77Autoindent::is_comment("      CALL X"));
        assert!(Fortran77Autoindent::is_continuation("     &  B"));
        assert!(!Fortran77Autoindent::is_continuation("     0  B"));
        assert!(!Fortran77Autoindent::is_continuation("   10 CONTINUE"));
    }
}
