//! Commenting and uncommenting whole lines.

use crate::autoindent::grouped;
use scribe_core::{DocumentError, StyledTextCtrl};
use scribe_lang::CommentDelimiters;

/// Add (`add == true`) or remove the line comment delimiters on every line of the selection,
/// as one undo step. The transformed lines are selected afterwards.
///
/// Adding puts the opening token at the first non-blank column and the closing token, if the
/// language has one, at the end of the line. Removing only strips tokens that are present, so
/// adding then removing restores the text.
pub fn comment_region(
    stc: &mut dyn StyledTextCtrl,
    delimiters: &CommentDelimiters,
    add: bool,
) -> Result<(), DocumentError> {
    if !delimiters.has_start() {
        return Ok(());
    }
    let (first, last) = stc.get_line_region();
    tracing::debug!(first, last, add, "comment region");
    grouped(stc, |stc| {
        for line in first..=last {
            if add {
                add_comment(stc, line, delimiters)?;
            } else {
                remove_comment(stc, line, delimiters)?;
            }
        }
        let start = stc.position_from_line(first);
        let end = stc.line_end_position(last);
        stc.set_selection(start, end);
        Ok(())
    })
}

fn add_comment(
    stc: &mut dyn StyledTextCtrl,
    line: usize,
    delimiters: &CommentDelimiters,
) -> Result<(), DocumentError> {
    if delimiters.has_end() {
        let end = stc.line_end_position(line);
        stc.insert_text(end, &delimiters.end)?;
    }
    let pos = stc.get_line_indent_position(line);
    stc.insert_text(pos, &delimiters.start)
}

fn remove_comment(
    stc: &mut dyn StyledTextCtrl,
    line: usize,
    delimiters: &CommentDelimiters,
) -> Result<(), DocumentError> {
    let text = stc.get_line_text(line);
    let indent = text.len() - text.trim_start().len();
    let body = &text[indent..];
    if !body.starts_with(delimiters.start.as_str()) {
        return Ok(());
    }
    let start_len = delimiters.start.chars().count();
    if delimiters.has_end() && body[delimiters.start.len()..].ends_with(delimiters.end.as_str()) {
        let end = stc.line_end_position(line);
        let end_len = delimiters.end.chars().count();
        stc.delete_range(end - end_len, end_len)?;
    }
    let pos = stc.get_line_indent_position(line);
    stc.delete_range(pos, start_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scribe_core::{ViewSettings, Workspace};

    fn with_session(text: &str, anchor: usize, caret: usize, f: impl FnOnce(&mut dyn StyledTextCtrl)) -> String {
        let mut ws = Workspace::new();
        let doc = ws.open_text(None, text);
        let view = ws.attach_view(doc, ViewSettings::default()).unwrap();
        let mut session = ws.session(view).unwrap();
        session.set_selection(anchor, caret);
        f(&mut session);
        session.get_text()
    }

    #[test]
    fn test_block_delimiters_round_trip() {
        let delimiters = CommentDelimiters::block("/*", "*/");
        let source = "int a;\n  int b;\nint c;\n";
        let commented = with_session(source, 0, 10, |stc| {
            comment_region(stc, &delimiters, true).unwrap();
            assert_eq!(stc.get_selection(), (0, 23));
        });
        assert_eq!(commented, "/*int a;*/\n  /*int b;*/\nint c;\n");

        let restored = with_session(&commented, 0, 14, |stc| {
            comment_region(stc, &delimiters, false).unwrap();
        });
        assert_eq!(restored, source);
    }

    #[test]
    fn test_selection_ending_at_column_zero_excludes_that_line() {
        let delimiters = CommentDelimiters::line("#");
        let text = with_session("a\nb\nc\n", 0, 4, |stc| {
            comment_region(stc, &delimiters, true).unwrap();
        });
        assert_eq!(text, "#a\n#b\nc\n");
    }

    #[test]
    fn test_remove_skips_uncommented_lines() {
        let delimiters = CommentDelimiters::line("#");
        let text = with_session("#a\nb\n  #c", 0, 9, |stc| {
            comment_region(stc, &delimiters, false).unwrap();
        });
        assert_eq!(text, "a\nb\n  c");
    }
}
