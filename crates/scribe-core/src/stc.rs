//! The styled text control contract.
//!
//! Language services (autoindent, paragraph fill, comment toggling, find/replace) never touch a
//! [`crate::Document`] directly; they work through [`StyledTextCtrl`], which combines the document
//! with one view's caret, selection, target range and indentation settings. The workspace
//! implements it for [`crate::EditSession`]; tests can use any implementation.
//!
//! Required methods map one-to-one onto document or view state. Provided methods build the
//! helpers the services share on top of them.

use crate::document::DocumentError;
use crate::line_ending::EolMode;
use crate::styling::StyleTable;

/// Abstract styled text control.
pub trait StyledTextCtrl {
    // Text and styles.

    /// Text of `[start, end)`.
    fn get_text_range(&self, start: usize, end: usize) -> Result<String, DocumentError>;
    /// Text and style bytes of `[start, end)`.
    fn get_styled_range(&self, start: usize, end: usize)
    -> Result<(String, Vec<u8>), DocumentError>;
    /// Insert `text` at `pos`.
    fn insert_text(&mut self, pos: usize, text: &str) -> Result<(), DocumentError>;
    /// Delete `n` characters at `pos`.
    fn delete_range(&mut self, pos: usize, n: usize) -> Result<(), DocumentError>;
    /// Set the target range used by [`StyledTextCtrl::replace_target`].
    fn set_target_range(&mut self, start: usize, end: usize);
    /// Current target range.
    fn get_target(&self) -> (usize, usize);
    /// Replace the target with `text`; the target then covers the new text. Returns its length.
    fn replace_target(&mut self, text: &str) -> Result<usize, DocumentError>;
    /// Set the style of `n` characters at `start`.
    fn set_style_range(&mut self, start: usize, n: usize, style: u8) -> Result<(), DocumentError>;
    /// Begin a `set_styling` run.
    fn start_styling(&mut self, pos: usize);
    /// Style the next `n` characters of the run.
    fn set_styling(&mut self, n: usize, style: u8);
    /// Style byte at `pos`.
    fn get_style_at(&self, pos: usize) -> u8;
    /// Style table of the document.
    fn style_table(&self) -> &StyleTable;

    // Geometry.

    /// Length in characters.
    fn length(&self) -> usize;
    /// Number of lines.
    fn line_count(&self) -> usize;
    /// Line containing `pos`.
    fn line_from_position(&self, pos: usize) -> usize;
    /// First position of `line`.
    fn position_from_line(&self, line: usize) -> usize;
    /// Position before the line ending of `line`.
    fn line_end_position(&self, line: usize) -> usize;
    /// Indentation of `line` in columns.
    fn line_indentation(&self, line: usize) -> usize;
    /// Position of the first non-blank character of `line`.
    fn get_line_indent_position(&self, line: usize) -> usize;
    /// Display column of `pos`.
    fn column(&self, pos: usize) -> usize;
    /// Position of display `column` on `line`.
    fn find_column(&self, line: usize, column: usize) -> usize;
    /// Text of `line` including its line ending.
    fn get_line(&self, line: usize) -> String;

    // Caret and selection.

    /// Caret position.
    fn current_position(&self) -> usize;
    /// Move the caret to `pos`, collapsing the selection.
    fn goto_position(&mut self, pos: usize);
    /// Set anchor and caret.
    fn set_selection(&mut self, anchor: usize, caret: usize);
    /// Selection as `(start, end)`, ordered.
    fn get_selection(&self) -> (usize, usize);
    /// Selection anchor.
    fn get_anchor(&self) -> usize;

    // Undo.

    /// Open an undo group.
    fn begin_undo_action(&mut self);
    /// Close an undo group.
    fn end_undo_action(&mut self);
    /// Undo one group.
    fn undo(&mut self) -> bool;
    /// Redo one group.
    fn redo(&mut self) -> bool;

    // Line endings.

    /// Line ending mode.
    fn get_eol_mode(&self) -> EolMode;
    /// Set the line ending mode without converting.
    fn set_eol_mode(&mut self, mode: EolMode);
    /// Convert all line endings.
    fn convert_eols(&mut self, mode: EolMode) -> Result<bool, DocumentError>;

    // Indentation settings.

    /// Indent width in columns.
    fn get_indent(&self) -> usize;
    /// Set the indent width.
    fn set_indent(&mut self, indent: usize);
    /// Tab width in columns.
    fn get_tab_width(&self) -> usize;
    /// Set the tab width.
    fn set_tab_width(&mut self, width: usize);
    /// Whether indentation uses tabs.
    fn get_use_tabs(&self) -> bool;
    /// Choose tabs or spaces for indentation.
    fn set_use_tabs(&mut self, use_tabs: bool);
    /// Column of the right edge guide.
    fn get_edge_column(&self) -> usize;
    /// Set the edge guide column.
    fn set_edge_column(&mut self, column: usize);

    // Folding and markers.

    /// Set the fold level word of `line`.
    fn set_fold_level(&mut self, line: usize, level: u32);
    /// Fold level word of `line`.
    fn get_fold_level(&self, line: usize) -> u32;
    /// Expand or contract the fold at `line`.
    fn set_fold_expanded(&mut self, line: usize, expanded: bool);
    /// Expansion state of the fold at `line`.
    fn get_fold_expanded(&self, line: usize) -> bool;
    /// Toggle the fold at `line`.
    fn toggle_fold(&mut self, line: usize);
    /// Define the symbol of marker `id`.
    fn marker_define(&mut self, id: u8, symbol: crate::document::MarkerSymbol);
    /// Add marker `id` to `line`.
    fn marker_add(&mut self, line: usize, id: u8) -> bool;

    // Provided helpers.

    /// Whole text.
    fn get_text(&self) -> String {
        self.get_text_range(0, self.length()).unwrap_or_default()
    }

    /// Text of `line` without its line ending.
    fn get_line_text(&self, line: usize) -> String {
        let start = self.position_from_line(line);
        let end = self.line_end_position(line);
        self.get_text_range(start, end).unwrap_or_default()
    }

    /// Character at `pos`.
    fn get_char_at(&self, pos: usize) -> Option<char> {
        self.get_text_range(pos, pos + 1)
            .ok()
            .and_then(|s| s.chars().next())
    }

    /// Line containing the caret.
    fn get_current_line(&self) -> usize {
        self.line_from_position(self.current_position())
    }

    /// Separator of the current line ending mode.
    fn get_linesep(&self) -> &'static str {
        self.get_eol_mode().as_str()
    }

    /// Rewrite the line endings of `text` to the current mode.
    fn convert_string_eol(&self, text: &str) -> String {
        self.get_eol_mode().convert_text(text)
    }

    /// Whitespace producing `columns` of indentation with the current settings.
    fn get_indent_string(&self, columns: usize) -> String {
        if self.get_use_tabs() {
            let tab_width = self.get_tab_width().max(1);
            let mut out = "\t".repeat(columns / tab_width);
            out.push_str(&" ".repeat(columns % tab_width));
            out
        } else {
            " ".repeat(columns)
        }
    }

    /// Indentation of the nearest non-blank line above `line`, with that line's number.
    fn get_prev_line_indentation(&self, line: usize) -> (usize, Option<usize>) {
        (0..line)
            .rev()
            .find(|&ln| !self.get_line_text(ln).trim().is_empty())
            .map_or((0, None), |ln| (self.line_indentation(ln), Some(ln)))
    }

    /// Re-indent `line` to `columns`, keeping the caret in step.
    ///
    /// A caret inside the old indentation ends up after the new one; a caret further right
    /// moves with its text.
    fn set_line_indentation(&mut self, line: usize, columns: usize) -> Result<(), DocumentError> {
        let start = self.position_from_line(line);
        let old_end = self.get_line_indent_position(line);
        let indent = self.get_indent_string(columns);
        if self.get_text_range(start, old_end)? == indent {
            return Ok(());
        }
        let new_end = start + indent.chars().count();
        let remap = |pos: usize| {
            if pos < start {
                pos
            } else if pos <= old_end {
                new_end
            } else {
                pos + new_end - old_end
            }
        };
        let caret = remap(self.current_position());
        let anchor = remap(self.get_anchor());
        self.set_target_range(start, old_end);
        self.replace_target(&indent)?;
        self.set_selection(anchor, caret);
        Ok(())
    }

    /// Selection with an end at column 0 of a later line pulled back to the previous line end.
    fn get_selection2(&self) -> (usize, usize) {
        let (start, end) = self.get_selection();
        if end > start {
            let line = self.line_from_position(end);
            if line > 0 && self.position_from_line(line) == end {
                return (start, self.line_end_position(line - 1).max(start));
            }
        }
        (start, end)
    }

    /// First and last line touched by the selection (see [`StyledTextCtrl::get_selection2`]).
    fn get_line_region(&self) -> (usize, usize) {
        let (start, end) = self.get_selection2();
        (self.line_from_position(start), self.line_from_position(end))
    }

    /// Insert `text` at the caret and move the caret after it.
    fn add_text(&mut self, text: &str) -> Result<(), DocumentError> {
        let pos = self.current_position();
        self.insert_text(pos, text)?;
        self.goto_position(pos + text.chars().count());
        Ok(())
    }

    /// Replace the selection with `text`, leaving the caret after it.
    fn replace_selection(&mut self, text: &str) -> Result<(), DocumentError> {
        let (start, end) = self.get_selection();
        self.set_target_range(start, end);
        let len = self.replace_target(text)?;
        self.goto_position(start + len);
        Ok(())
    }

    /// Returns `true` if `style` is a comment style of the current mode.
    fn is_style_comment(&self, style: u8) -> bool {
        self.style_table().is_comment(style)
    }

    /// Returns `true` if `style` is a string style of the current mode.
    fn is_style_string(&self, style: u8) -> bool {
        self.style_table().is_string(style)
    }
}
