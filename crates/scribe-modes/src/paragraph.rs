//! Paragraph discovery and fill.
//!
//! A paragraph is the run of lines around the caret that split into the same comment leader
//! and have a non-blank body. Python docstring quotes and C block comments get special
//! treatment.

use crate::autoindent::grouped;
use regex::Regex;
use scribe_core::{DocumentError, StyledTextCtrl};
use scribe_highlight_simple::styles;
use scribe_lang::{CommentDelimiters, CommentSplitter};
use std::sync::LazyLock;

static MID_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*\*+\s*)(.+)").expect("static pattern"));

/// Language rules for paragraph boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParagraphStyle {
    /// Lines sharing a leader.
    #[default]
    Plain,
    /// As plain, but triple-quoted string delimiters bound the paragraph.
    Python,
    /// As plain, plus `/* ... */` block comments.
    CBlockComment,
}

/// Shape of a discovered paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParagraphKind {
    /// Whole lines sharing `leader`.
    Lines {
        /// Whitespace and comment tokens common to every line.
        leader: String,
        /// Closing comment tokens of the cursor line.
        trailer: String,
    },
    /// A C block comment starting at `column`.
    BlockComment {
        /// Column of the opening `/*`.
        column: usize,
    },
}

/// A paragraph found around a position: its extent and the body of every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphInfo {
    /// First character of the paragraph.
    pub start: usize,
    /// End of the paragraph (before the line ending of its last line).
    pub end: usize,
    /// Line bodies with leaders stripped.
    pub lines: Vec<String>,
    /// How the bodies are framed.
    pub kind: ParagraphKind,
}

enum Walk {
    Include,
    IncludeAndStop,
    Stop,
}

fn triple_quote_walk(body: &str, forward: bool) -> Walk {
    let trimmed = body.trim();
    let is_quote = |s: &str| s == "\"\"\"" || s == "'''";
    if is_quote(trimmed) {
        return Walk::Stop;
    }
    let starts = trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''");
    let ends = trimmed.ends_with("\"\"\"") || trimmed.ends_with("'''");
    match (starts, ends, forward) {
        (true, _, _) => Walk::IncludeAndStop,
        (false, true, true) => Walk::IncludeAndStop,
        (false, true, false) => Walk::Stop,
        _ => Walk::Include,
    }
}

impl ParagraphInfo {
    /// Find the paragraph containing `start`, extended forward to at least the line of `end`.
    ///
    /// Returns `None` when the line at `start` has a blank body.
    pub fn find(
        stc: &dyn StyledTextCtrl,
        delimiters: &CommentDelimiters,
        style: ParagraphStyle,
        start: usize,
        end: usize,
    ) -> Option<Self> {
        if style == ParagraphStyle::CBlockComment {
            let line_start = stc.position_from_line(stc.line_from_position(start));
            if let Some(info) = Self::find_block_comment(stc, start)
                .or_else(|| Self::find_block_comment(stc, line_start))
            {
                return Some(info);
            }
        }
        Self::find_lines(stc, &delimiters.splitter(), style, start, end)
    }

    fn find_lines(
        stc: &dyn StyledTextCtrl,
        splitter: &CommentSplitter,
        style: ParagraphStyle,
        start: usize,
        end: usize,
    ) -> Option<Self> {
        let cursor_line = stc.line_from_position(start);
        let first = splitter.split(&stc.get_line_text(cursor_line));
        if first.is_blank() {
            return None;
        }
        let python = style == ParagraphStyle::Python;
        let same = |ln: usize| {
            let split = splitter.split(&stc.get_line_text(ln));
            (split.leader == first.leader && !split.is_blank()).then_some(split.body)
        };

        let mut before = Vec::new();
        let mut first_line = cursor_line;
        let opens_here = python && matches!(triple_quote_walk(&first.body, false), Walk::IncludeAndStop);
        if !opens_here {
            while first_line > 0 {
                let Some(body) = same(first_line - 1) else {
                    break;
                };
                let walk = if python { triple_quote_walk(&body, false) } else { Walk::Include };
                if matches!(walk, Walk::Stop) {
                    break;
                }
                first_line -= 1;
                before.push(body);
                if matches!(walk, Walk::IncludeAndStop) {
                    break;
                }
            }
        }
        before.reverse();

        let mut lines = before;
        lines.push(first.body.clone());
        let mut last_line = cursor_line;
        let end_line = stc.line_from_position(end).max(cursor_line);
        // Lines of an explicit selection are taken as they are.
        while last_line < end_line {
            last_line += 1;
            lines.push(splitter.split(&stc.get_line_text(last_line)).body);
        }
        let closes_here = python
            && last_line == cursor_line
            && !opens_here
            && matches!(triple_quote_walk(&first.body, true), Walk::IncludeAndStop);
        if !closes_here {
            while last_line + 1 < stc.line_count() {
                let Some(body) = same(last_line + 1) else {
                    break;
                };
                let walk = if python { triple_quote_walk(&body, true) } else { Walk::Include };
                if matches!(walk, Walk::Stop) {
                    break;
                }
                last_line += 1;
                lines.push(body);
                if matches!(walk, Walk::IncludeAndStop) {
                    break;
                }
            }
        }

        Some(Self {
            start: stc.position_from_line(first_line),
            end: stc.line_end_position(last_line),
            lines,
            kind: ParagraphKind::Lines {
                leader: first.leader,
                trailer: first.trailer,
            },
        })
    }

    /// The block comment holding `pos`, if any.
    fn find_block_comment(stc: &dyn StyledTextCtrl, pos: usize) -> Option<Self> {
        let length = stc.length();
        if pos >= length || stc.get_style_at(pos) != styles::COMMENT {
            return None;
        }
        let mut start = pos;
        while start > 0 && stc.get_style_at(start - 1) == styles::COMMENT {
            start -= 1;
        }
        let mut end = pos;
        while end < length && stc.get_style_at(end) == styles::COMMENT {
            end += 1;
        }
        let text = stc.get_text_range(start, end).ok()?;
        if !text.starts_with("/*") {
            return None;
        }

        let mut lines = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let mut body = raw.trim_end_matches('\r');
            if i == 0 {
                body = body.trim_start_matches('/').trim_start_matches('*');
            }
            let body = body.trim_end().trim_end_matches("*/");
            let body = match MID_COMMENT.captures(body) {
                Some(caps) if i > 0 => caps.get(2).map_or("", |m| m.as_str()),
                _ if i > 0 && body.trim() == "*" => "",
                _ => body,
            };
            let body = body.trim();
            if !body.is_empty() {
                lines.push(body.to_string());
            }
        }
        // Drop a trailing line ending swallowed by an unterminated comment.
        let last_line = stc.line_from_position(end.saturating_sub(1).max(start));
        let end = end.min(stc.line_end_position(last_line));
        Some(Self {
            start,
            end,
            lines,
            kind: ParagraphKind::BlockComment {
                column: stc.column(start),
            },
        })
    }

    /// Words of the paragraph in order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().flat_map(|line| line.split_whitespace())
    }

    /// The paragraph rewrapped so no line passes `edge_column` unless a single word does.
    pub fn fill(&self, edge_column: usize) -> Vec<String> {
        let words: Vec<&str> = self.words().collect();
        match &self.kind {
            ParagraphKind::Lines { leader, trailer } => {
                let mut prefix = leader.clone();
                if leader.ends_with(|c: char| !c.is_whitespace()) {
                    prefix.push(' ');
                }
                let suffix = if trailer.trim().is_empty() {
                    String::new()
                } else {
                    format!(" {}", trailer.trim())
                };
                let width = edge_column
                    .saturating_sub(prefix.chars().count() + suffix.chars().count())
                    .max(1);
                wrap_words(&words, width)
                    .into_iter()
                    .map(|line| format!("{prefix}{line}{suffix}"))
                    .collect()
            }
            ParagraphKind::BlockComment { column } => {
                let joined = words.join(" ");
                if column + joined.chars().count() + 6 <= edge_column {
                    return vec![format!("/* {joined} */")];
                }
                let pad = " ".repeat(*column);
                let width = edge_column.saturating_sub(column + 3).max(1);
                let mut out: Vec<String> = wrap_words(&words, width)
                    .into_iter()
                    .enumerate()
                    .map(|(i, line)| {
                        if i == 0 {
                            format!("/* {line}")
                        } else {
                            format!("{pad} * {line}")
                        }
                    })
                    .collect();
                out.push(format!("{pad} */"));
                out
            }
        }
    }
}

/// Greedy word wrap.
pub fn wrap_words(words: &[&str], width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in words {
        let needed = if current.is_empty() { 0 } else { current.chars().count() + 1 };
        if !current.is_empty() && needed + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Reflow the paragraph at the caret (or the selected lines) to the edge column as one undo
/// step. Returns `false` if there was no paragraph to fill.
pub fn fill_paragraph(
    stc: &mut dyn StyledTextCtrl,
    delimiters: &CommentDelimiters,
    style: ParagraphStyle,
) -> Result<bool, DocumentError> {
    let (pos, end) = stc.get_selection2();
    let Some(info) = ParagraphInfo::find(stc, delimiters, style, pos, end) else {
        return Ok(false);
    };
    let text = info.fill(stc.get_edge_column()).join(stc.get_linesep());
    tracing::debug!(start = info.start, end = info.end, lines = info.lines.len(), "filling paragraph");
    grouped(stc, |stc| {
        stc.set_target_range(info.start, info.end);
        let len = stc.replace_target(&text)?;
        stc.goto_position(info.start + len);
        Ok(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wrap_words() {
        let words = ["aaa", "bb", "c", "dddd"];
        assert_eq!(wrap_words(&words, 6), vec!["aaa bb", "c dddd"]);
        assert_eq!(wrap_words(&words, 2), vec!["aaa", "bb", "c", "dddd"]);
        assert!(wrap_words(&[], 10).is_empty());
    }

    #[test]
    fn test_triple_quote_walk() {
        assert!(matches!(triple_quote_walk("'''", true), Walk::Stop));
        assert!(matches!(triple_quote_walk("'''column", false), Walk::IncludeAndStop));
        assert!(matches!(triple_quote_walk("end.\"\"\"", true), Walk::IncludeAndStop));
        assert!(matches!(triple_quote_walk("end.\"\"\"", false), Walk::Stop));
        assert!(matches!(triple_quote_walk("plain", false), Walk::Include));
    }
}
