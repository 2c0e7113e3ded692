//! Document modification events.
//!
//! Every primitive change to a [`crate::Document`] produces one [`ModificationEvent`], delivered
//! to subscribers in the order the changes happened. Events are expressed in **character
//! offsets** (Unicode scalar values), the same unit used for positions and style bytes.
//!
//! Compound edits (an undo group opened with `begin_undo`/`end_undo`, an undo or a redo) still
//! emit one event per primitive step, but only the final one carries
//! [`ModificationFlags::LAST_STEP_IN_UNDO_REDO`], so subscribers can treat the group atomically.

use bitflags::bitflags;

/// What kind of change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModificationKind {
    /// Emitted just before text is inserted.
    BeforeInsert,
    /// Emitted just before text is deleted.
    BeforeDelete,
    /// Text was inserted.
    Insert,
    /// Text was deleted.
    Delete,
    /// Style bytes changed.
    StyleChange,
    /// A line's fold level or fold expansion changed.
    FoldChange,
}

bitflags! {
    /// Origin and grouping flags carried by a [`ModificationEvent`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModificationFlags: u32 {
        /// Caused by a direct (user or API) edit.
        const USER = 1 << 0;
        /// Caused by undo.
        const UNDO = 1 << 1;
        /// Caused by redo.
        const REDO = 1 << 2;
        /// Part of a multi-step undo group.
        const MULTI_STEP = 1 << 3;
        /// Final primitive of an undo group, undo or redo.
        const LAST_STEP_IN_UNDO_REDO = 1 << 4;
    }
}

/// A single modification notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModificationEvent {
    /// Kind of change.
    pub kind: ModificationKind,
    /// Start character offset.
    pub position: usize,
    /// Number of characters affected.
    pub length: usize,
    /// Inserted or deleted text (text changes only).
    pub text: Option<String>,
    /// Net number of lines added (negative for removed lines).
    pub lines_added: isize,
    /// Line the change starts on.
    pub line: usize,
    /// New fold level (fold changes only).
    pub fold_level_now: u32,
    /// Previous fold level (fold changes only).
    pub fold_level_prev: u32,
    /// Origin/grouping flags.
    pub flags: ModificationFlags,
}

impl ModificationEvent {
    /// Create an event with no text, fold levels or flags.
    pub fn new(kind: ModificationKind, position: usize, length: usize, line: usize) -> Self {
        Self {
            kind,
            position,
            length,
            text: None,
            lines_added: 0,
            line,
            fold_level_now: 0,
            fold_level_prev: 0,
            flags: ModificationFlags::empty(),
        }
    }

    /// Returns `true` for insert/delete events (not the "before" notifications).
    pub fn is_text_change(&self) -> bool {
        matches!(self.kind, ModificationKind::Insert | ModificationKind::Delete)
    }

    /// Returns `true` if this is the last primitive of a compound change.
    pub fn is_last_step(&self) -> bool {
        self.flags.contains(ModificationFlags::LAST_STEP_IN_UNDO_REDO)
    }

    /// Shift a character offset across this change.
    ///
    /// Offsets at or before an insertion point are unchanged, offsets after it move right.
    /// Offsets inside a deleted range collapse to its start.
    pub fn shift_offset(&self, offset: usize) -> usize {
        match self.kind {
            ModificationKind::Insert => {
                if offset > self.position {
                    offset.saturating_add(self.length)
                } else {
                    offset
                }
            }
            ModificationKind::Delete => {
                let end = self.position.saturating_add(self.length);
                if offset >= end {
                    offset - self.length
                } else if offset > self.position {
                    self.position
                } else {
                    offset
                }
            }
            _ => offset,
        }
    }
}

/// Identifier returned by [`crate::Document::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub(crate) u64);

impl SubscriberId {
    /// Get the underlying numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Callback invoked for each modification event.
pub type ModificationListener = Box<dyn FnMut(&ModificationEvent)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_offset() {
        let mut insert = ModificationEvent::new(ModificationKind::Insert, 5, 3, 0);
        insert.text = Some("abc".to_string());
        assert_eq!(insert.shift_offset(4), 4);
        assert_eq!(insert.shift_offset(5), 5);
        assert_eq!(insert.shift_offset(6), 9);
        assert_eq!(insert.shift_offset(10), 13);

        let delete = ModificationEvent::new(ModificationKind::Delete, 5, 3, 0);
        assert_eq!(delete.shift_offset(5), 5);
        assert_eq!(delete.shift_offset(6), 5);
        assert_eq!(delete.shift_offset(8), 5);
        assert_eq!(delete.shift_offset(12), 9);
    }
}
