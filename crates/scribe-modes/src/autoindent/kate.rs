use super::{Autoindent, is_non_code, starts_with_comment, styled_line};
use onig::{Region, SearchOptions};
use scribe_core::StyledTextCtrl;

/// One indentation rule written in the Perl dialect used by Kate's variable indenter.
///
/// Patterns may use look-around; an empty pattern, or one that fails to compile, never matches.
pub struct IndentPattern {
    source: String,
    regex: Option<onig::Regex>,
}

impl std::fmt::Debug for IndentPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndentPattern")
            .field("source", &self.source)
            .field("compiled", &self.regex.is_some())
            .finish()
    }
}

impl IndentPattern {
    /// Compile `pattern`, optionally ignoring case.
    pub fn new(pattern: &str, ignore_case: bool) -> Self {
        let regex = if pattern.is_empty() {
            None
        } else {
            let source = if ignore_case {
                format!("(?i){pattern}")
            } else {
                pattern.to_string()
            };
            match onig::Regex::new(&source) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    tracing::warn!(%pattern, error = %err, "ignoring autoindent pattern");
                    None
                }
            }
        };
        Self {
            source: pattern.to_string(),
            regex,
        }
    }

    /// The pattern as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns `true` if the pattern compiled.
    pub fn is_active(&self) -> bool {
        self.regex.is_some()
    }

    /// Returns `true` if the pattern matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        let Some(regex) = self.regex.as_ref() else {
            return false;
        };
        let mut region = Region::new();
        regex
            .search_with_options(
                text,
                0,
                text.len(),
                SearchOptions::SEARCH_OPTION_NONE,
                Some(&mut region),
            )
            .is_some()
    }
}

const COUPLES: [(char, char); 3] = [('(', ')'), ('[', ']'), ('{', '}')];

/// Kate style regex indenter.
///
/// The nearest line above with content that does not start in a comment is the reference:
/// its indentation is the base, and it adds one level if it matches `indent_after` or leaves
/// one of the configured brace couples open. The line being indented adds a level if it matches
/// `indent` and removes one if it matches `unindent`. Only the sign of the sum counts.
#[derive(Debug)]
pub struct RegexAutoindent {
    indent_after: IndentPattern,
    indent: IndentPattern,
    unindent: IndentPattern,
    couples: Vec<(char, char)>,
}

impl RegexAutoindent {
    /// Build from the three patterns and a string of brace characters such as `"{("`.
    pub fn new(indent_after: &str, indent: &str, unindent: &str, braces: &str) -> Self {
        Self::with_case(indent_after, indent, unindent, braces, false)
    }

    /// Like [`RegexAutoindent::new`], optionally case-insensitive.
    pub fn with_case(
        indent_after: &str,
        indent: &str,
        unindent: &str,
        braces: &str,
        ignore_case: bool,
    ) -> Self {
        let couples = COUPLES
            .iter()
            .filter(|(open, close)| braces.contains(*open) || braces.contains(*close))
            .copied()
            .collect();
        Self {
            indent_after: IndentPattern::new(indent_after, ignore_case),
            indent: IndentPattern::new(indent, ignore_case),
            unindent: IndentPattern::new(unindent, ignore_case),
            couples,
        }
    }

    /// The Bourne shell rules: `then`, `do`, `case ... in` and unclosed `{` open blocks.
    pub fn bash() -> Self {
        Self::new(
            r"(\{(?![^\}]*\})|\b(then|elif|else)\b(?!.+fi)|\bdo\b(?!.+done)|\bcase\s+.+\s+in\b(?!.*esac)|\[\[)",
            r"\$\{.*\}",
            r"([}]\s*$|\b(fi|elif|else)\b|\bdone\b|\besac\b|\]\])",
            "",
        )
    }

    /// Rules matched against the reference line.
    pub fn indent_after(&self) -> &IndentPattern {
        &self.indent_after
    }

    /// Rules matched against the line being indented.
    pub fn indent(&self) -> &IndentPattern {
        &self.indent
    }

    /// Dedent rules matched against the line being indented.
    pub fn unindent(&self) -> &IndentPattern {
        &self.unindent
    }

    /// Net change of brace couple `(open, close)` on `line`, ignoring comments and strings.
    fn couple_balance(stc: &dyn StyledTextCtrl, line: usize, open: char, close: char) -> i32 {
        styled_line(stc, line)
            .into_iter()
            .filter(|(_, style)| !is_non_code(stc, *style))
            .map(|(ch, _)| match ch {
                c if c == open => 1,
                c if c == close => -1,
                _ => 0,
            })
            .sum()
    }

    /// Level adjustment (positive, negative or zero) for `line` given its reference line.
    pub(crate) fn adjustment(
        &self,
        stc: &dyn StyledTextCtrl,
        above: Option<usize>,
        above_text: &str,
        current_text: &str,
        current_is_comment: bool,
    ) -> i32 {
        let mut adjustment = 0;
        if let Some(above) = above
            && self
                .couples
                .iter()
                .any(|(open, close)| Self::couple_balance(stc, above, *open, *close) > 0)
        {
            adjustment += 1;
        }
        if self.indent_after.is_match(above_text) {
            adjustment += 1;
        }
        if !current_text.is_empty() && !current_is_comment {
            if self.indent.is_match(current_text) {
                adjustment += 1;
            }
            if self.unindent.is_match(current_text) {
                adjustment -= 1;
            }
        }
        adjustment
    }
}

/// Apply the sign of `adjustment` to `base`.
pub(crate) fn adjust(base: usize, adjustment: i32, indent: usize) -> usize {
    match adjustment.signum() {
        1 => base + indent,
        -1 => base.saturating_sub(indent),
        _ => base,
    }
}

impl Autoindent for RegexAutoindent {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn find_indent(&self, stc: &dyn StyledTextCtrl, line: usize) -> Option<usize> {
        if line == 0 {
            return None;
        }
        let above = (0..line).rev().find(|&ln| {
            stc.get_line_indent_position(ln) < stc.line_end_position(ln)
                && !starts_with_comment(stc, ln)
        });
        let (base, above_text) = match above {
            Some(ln) => (stc.line_indentation(ln), stc.get_line_text(ln).trim_start().to_string()),
            None => (0, String::new()),
        };
        let current = stc.get_line_text(line).trim_start().to_string();
        let adjustment =
            self.adjustment(stc, above, &above_text, &current, starts_with_comment(stc, line));
        Some(adjust(base, adjustment, stc.get_indent()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookahead_patterns_compile() {
        let bash = RegexAutoindent::bash();
        assert!(bash.indent_after().is_active());
        assert!(bash.indent_after().is_match("foo() {"));
        assert!(!bash.indent_after().is_match("foo() { bar; }"));
        assert!(bash.indent_after().is_match("if true; then"));
        assert!(!bash.indent_after().is_match("if true; then echo; fi"));
        assert!(bash.unindent().is_match("done"));
    }

    #[test]
    fn test_case_insensitive_and_invalid_patterns() {
        let pattern = IndentPattern::new(r"\bENDIF\b", true);
        assert!(pattern.is_match("      endif"));
        let broken = IndentPattern::new("(unclosed", false);
        assert!(!broken.is_active());
        assert!(!broken.is_match("(unclosed"));
    }

    #[test]
    fn test_adjust_uses_sign_only() {
        assert_eq!(adjust(4, 2, 4), 8);
        assert_eq!(adjust(4, -1, 4), 0);
        assert_eq!(adjust(2, -1, 4), 0);
        assert_eq!(adjust(4, 0, 4), 4);
    }
}
