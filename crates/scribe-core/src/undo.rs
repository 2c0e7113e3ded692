//! Undo/redo history.
//!
//! The history is a linear list of primitive steps, each tagged with a group id. Steps recorded
//! between [`UndoHistory::begin_group`] and [`UndoHistory::end_group`] share an id and are undone
//! and redone together. Outside a group every primitive gets its own id.

use crate::line_ending::EolMode;

/// A primitive, reversible text change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UndoAction {
    Insert {
        position: usize,
        text: String,
    },
    Delete {
        position: usize,
        text: String,
        styles: Vec<u8>,
    },
}

impl UndoAction {
    pub(crate) fn text(&self) -> &str {
        match self {
            Self::Insert { text, .. } | Self::Delete { text, .. } => text,
        }
    }
}

/// Line-ending mode switch recorded with an EOL conversion group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EolSwitch {
    pub(crate) before: EolMode,
    pub(crate) after: EolMode,
}

#[derive(Debug, Clone)]
pub(crate) struct UndoStep {
    pub(crate) group_id: usize,
    pub(crate) action: UndoAction,
    pub(crate) eol_switch: Option<EolSwitch>,
}

#[derive(Debug)]
pub(crate) struct UndoHistory {
    undo_stack: Vec<UndoStep>,
    redo_stack: Vec<UndoStep>,
    undo_groups: usize,
    max_undo: usize,
    /// Saved position in the linear history, as an `undo_stack` length. May exceed the
    /// current length while the save point sits in the redo area.
    clean_index: Option<usize>,
    next_group_id: usize,
    open_group_id: Option<usize>,
    depth: usize,
}

impl UndoHistory {
    pub(crate) fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            undo_groups: 0,
            max_undo: max_undo.max(1),
            clean_index: Some(0),
            next_group_id: 0,
            open_group_id: None,
            depth: 0,
        }
    }

    pub(crate) fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub(crate) fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of undoable groups.
    pub(crate) fn undo_depth(&self) -> usize {
        self.undo_groups
    }

    /// Number of redoable groups.
    pub(crate) fn redo_depth(&self) -> usize {
        count_groups(&self.redo_stack)
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.clean_index == Some(self.undo_stack.len())
    }

    pub(crate) fn mark_clean(&mut self) {
        self.clean_index = Some(self.undo_stack.len());
    }

    pub(crate) fn in_group(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn begin_group(&mut self) {
        if self.depth == 0 {
            self.open_group_id = Some(self.allocate_group_id());
        }
        self.depth += 1;
    }

    /// Close one nesting level. Returns `true` when the outermost group closed.
    pub(crate) fn end_group(&mut self) -> bool {
        if self.depth == 0 {
            return false;
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.open_group_id = None;
            return true;
        }
        false
    }

    /// Force-close any open group (undo/redo always operate on closed groups).
    pub(crate) fn close_all(&mut self) {
        self.depth = 0;
        self.open_group_id = None;
    }

    pub(crate) fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.undo_groups = 0;
        self.clean_index = Some(0);
        self.close_all();
    }

    fn allocate_group_id(&mut self) -> usize {
        let id = self.next_group_id;
        self.next_group_id = self.next_group_id.wrapping_add(1);
        id
    }

    fn clear_redo_and_adjust_clean(&mut self) {
        if self.redo_stack.is_empty() {
            return;
        }

        // If clean point is in redo area, it becomes unreachable after clearing redo.
        if let Some(clean_index) = self.clean_index
            && clean_index > self.undo_stack.len()
        {
            self.clean_index = None;
        }

        self.redo_stack.clear();
    }

    pub(crate) fn record(&mut self, action: UndoAction) {
        self.clear_redo_and_adjust_clean();

        let group_id = match self.open_group_id {
            Some(id) => id,
            None => self.allocate_group_id(),
        };
        if self.undo_stack.last().map(|s| s.group_id) != Some(group_id) {
            self.undo_groups += 1;
        }
        self.undo_stack.push(UndoStep {
            group_id,
            action,
            eol_switch: None,
        });

        while self.undo_groups > self.max_undo {
            self.drop_oldest_group();
        }
    }

    /// Attach an EOL switch to every step of the currently open group.
    pub(crate) fn annotate_open_group(&mut self, switch: EolSwitch) {
        let Some(group_id) = self.open_group_id else {
            return;
        };
        for step in self.undo_stack.iter_mut().rev() {
            if step.group_id != group_id {
                break;
            }
            step.eol_switch = Some(switch);
        }
    }

    fn drop_oldest_group(&mut self) {
        let Some(first_group) = self.undo_stack.first().map(|s| s.group_id) else {
            return;
        };
        let count = self
            .undo_stack
            .iter()
            .take_while(|s| s.group_id == first_group)
            .count();
        self.undo_stack.drain(..count);
        self.undo_groups = self.undo_groups.saturating_sub(1);
        self.clean_index = match self.clean_index {
            Some(idx) if idx >= count => Some(idx - count),
            _ => None,
        };
    }

    /// Pop the most recent group, newest step first.
    pub(crate) fn pop_undo_group(&mut self) -> Option<Vec<UndoStep>> {
        let steps = pop_group(&mut self.undo_stack)?;
        self.undo_groups = self.undo_groups.saturating_sub(1);
        Some(steps)
    }

    /// Pop the next redo group, oldest step first.
    pub(crate) fn pop_redo_group(&mut self) -> Option<Vec<UndoStep>> {
        pop_group(&mut self.redo_stack)
    }

    /// Push an undone group (given newest first) onto the redo stack.
    pub(crate) fn push_redo_group(&mut self, steps: Vec<UndoStep>) {
        // Stored so that popping yields oldest first.
        self.redo_stack.extend(steps);
    }

    /// Push a redone group (given oldest first) back onto the undo stack.
    pub(crate) fn push_undo_group(&mut self, steps: Vec<UndoStep>) {
        if !steps.is_empty() {
            self.undo_groups += 1;
        }
        self.undo_stack.extend(steps);
    }
}

fn pop_group(stack: &mut Vec<UndoStep>) -> Option<Vec<UndoStep>> {
    let last_group_id = stack.last().map(|s| s.group_id)?;
    let mut steps: Vec<UndoStep> = Vec::new();

    while let Some(step) = stack.last() {
        if step.group_id != last_group_id {
            break;
        }
        if let Some(step) = stack.pop() {
            steps.push(step);
        }
    }

    Some(steps)
}

fn count_groups(stack: &[UndoStep]) -> usize {
    let mut count = 0;
    let mut last = None;
    for step in stack {
        if last != Some(step.group_id) {
            count += 1;
            last = Some(step.group_id);
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(position: usize, text: &str) -> UndoAction {
        UndoAction::Insert {
            position,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_grouping_and_depths() {
        let mut history = UndoHistory::new(100);
        history.record(insert(0, "a"));
        history.begin_group();
        history.record(insert(1, "b"));
        history.begin_group();
        history.record(insert(2, "c"));
        assert!(!history.end_group());
        assert!(history.end_group());
        assert_eq!(history.undo_depth(), 2);

        let group = history.pop_undo_group().unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].action.text(), "c");
        history.push_redo_group(group);
        assert_eq!(history.redo_depth(), 1);

        let redo = history.pop_redo_group().unwrap();
        assert_eq!(redo.len(), 2);
        assert_eq!(redo[0].action.text(), "b");
    }

    #[test]
    fn test_clean_index_tracks_save_point() {
        let mut history = UndoHistory::new(100);
        assert!(history.is_clean());
        history.record(insert(0, "a"));
        assert!(!history.is_clean());
        history.mark_clean();
        assert!(history.is_clean());
        history.record(insert(1, "b"));
        assert!(!history.is_clean());
    }

    #[test]
    fn test_max_undo_drops_whole_groups() {
        let mut history = UndoHistory::new(2);
        history.begin_group();
        history.record(insert(0, "a"));
        history.record(insert(1, "b"));
        history.end_group();
        history.record(insert(2, "c"));
        history.record(insert(3, "d"));
        assert_eq!(history.undo_depth(), 2);
        assert!(history.clean_index.is_none());
    }
}
