use super::Autoindent;
use regex::Regex;
use scribe_core::StyledTextCtrl;
use scribe_highlight_simple::styles;
use std::sync::LazyLock;

static RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[^\s"']+:"#).expect("static pattern"));
static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\w.]+\s*[:+?]?=").expect("static pattern"));

/// Makefile indenter: rule lines stay at the margin and the recipe lines under a rule are
/// indented by one tab stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakefileAutoindent;

impl Autoindent for MakefileAutoindent {
    fn name(&self) -> &'static str {
        "makefile"
    }

    fn find_indent(&self, stc: &dyn StyledTextCtrl, line: usize) -> Option<usize> {
        let cmd = stc.get_line_text(line);
        let cmd = cmd.trim_start();
        if cmd.starts_with('#') {
            return Some(stc.line_indentation(line));
        }
        if RULE.is_match(cmd) {
            return Some(0);
        }

        for ln in (0..line).rev() {
            let start = stc.position_from_line(ln);
            let text = stc.get_line_text(ln);
            if stc.get_style_at(start) == styles::KEYWORD && !text.starts_with(char::is_whitespace)
            {
                // A rule: the lines below it form its recipe.
                return Some(if RULE.is_match(&text) { stc.get_tab_width() } else { 0 });
            }
            if ASSIGNMENT.is_match(&text) {
                return Some(0);
            }
        }
        Some(stc.line_indentation(0))
    }
}
