//! Named actions.
//!
//! Keymaps bind key sequences to action names; the [`ActionRegistry`] maps those names to
//! [`Action`] implementations. Every action can report whether it is enabled for a view (menu
//! items and toolbar buttons are greyed out when it is not) and, for toggles, whether it is
//! checked. Disabled actions are never run.

use crate::comment::comment_region;
use crate::editor::Editor;
use crate::error::ActionError;
use crate::minor::{FoldExplorer, TabCompletion};
use crate::paragraph::fill_paragraph;
use scribe_core::vfs::parse_url;
use scribe_core::{
    ClipboardKind, EolMode, FindService, SearchError, StyledTextCtrl, ViewId, WorkspaceError,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Arguments of one action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionArgs {
    /// Index into a list-valued action's entries, or `-1` for the default entry.
    pub index: i32,
    /// Numeric prefix argument.
    pub multiplier: i64,
    /// Free-form argument (a URL, a search string, a minor mode keyword).
    pub argument: Option<String>,
}

impl Default for ActionArgs {
    fn default() -> Self {
        Self {
            index: -1,
            multiplier: 1,
            argument: None,
        }
    }
}

impl ActionArgs {
    /// Arguments carrying only a prefix argument.
    pub fn repeated(multiplier: i64) -> Self {
        Self {
            multiplier,
            ..Self::default()
        }
    }

    /// Arguments carrying a free-form argument.
    pub fn with_argument(argument: impl Into<String>) -> Self {
        Self {
            argument: Some(argument.into()),
            ..Self::default()
        }
    }

    /// Arguments selecting entry `index` of a list action.
    pub fn with_index(index: i32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    fn count(&self) -> u64 {
        self.multiplier.unsigned_abs().max(1)
    }

    fn required(&self, action: &str) -> Result<&str, ActionError> {
        self.argument
            .as_deref()
            .filter(|arg| !arg.is_empty())
            .ok_or_else(|| ActionError::MissingArgument(action.to_string()))
    }
}

/// A user-invokable command.
pub trait Action: Send + Sync {
    /// Name used in keymaps.
    fn name(&self) -> &'static str;

    /// Menu label.
    fn alias(&self) -> Option<&'static str> {
        None
    }

    /// Returns `true` if the action can run on `view` right now.
    fn is_enabled(&self, _editor: &Editor, _view: ViewId) -> bool {
        true
    }

    /// Toggle state, for actions that are toggles.
    fn is_checked(&self, _editor: &Editor, _view: ViewId) -> Option<bool> {
        None
    }

    /// Run the action on `view`.
    fn run(&self, editor: &mut Editor, view: ViewId, args: &ActionArgs) -> Result<(), ActionError>;
}

/// Actions by name.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, Arc<dyn Action>>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every [`Builtin`] action.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for action in Builtin::ALL {
            registry.register(Arc::new(*action));
        }
        registry
    }

    /// Register `action`, replacing any action of the same name.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name(), action);
    }

    /// The action named `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.actions.keys().copied().collect()
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if no action is registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// The actions every editor has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// Write the document to its URL.
    SaveFile,
    /// Write the document to the URL given as argument.
    SaveFileAs,
    /// Open the URL given as argument in a new view.
    OpenFile,
    /// Undo the last edit group.
    Undo,
    /// Redo the last undone edit group.
    Redo,
    /// Copy the selection.
    Copy,
    /// Copy the selection, then delete it.
    Cut,
    /// Paste the clipboard.
    Paste,
    /// Paste the primary selection.
    PastePrimary,
    /// Select the next match, wrapping around once.
    FindNext,
    /// Select the previous match, wrapping around once.
    FindPrev,
    /// Replace every match in one undo step.
    ReplaceAll,
    /// Reflow the paragraph at the caret.
    FillParagraph,
    /// Comment the selected lines.
    CommentRegion,
    /// Uncomment the selected lines.
    UncommentRegion,
    /// Complete the word before the caret.
    CompleteWord,
    /// Reindent the caret line.
    ReindentLine,
    /// Insert a line ending and indent.
    ElectricReturn,
    /// Convert line endings to LF.
    ConvertEolsLf,
    /// Convert line endings to CRLF.
    ConvertEolsCrlf,
    /// Convert line endings to CR.
    ConvertEolsCr,
    /// Jump to a fold explorer entry.
    FoldExplorerGoto,
    /// Attach or detach the minor mode named by the argument.
    ToggleMinorMode,
    /// Switch to the major mode named by the argument.
    ChangeMajorMode,
}

impl Builtin {
    /// Every builtin action.
    pub const ALL: &'static [Builtin] = &[
        Self::SaveFile,
        Self::SaveFileAs,
        Self::OpenFile,
        Self::Undo,
        Self::Redo,
        Self::Copy,
        Self::Cut,
        Self::Paste,
        Self::PastePrimary,
        Self::FindNext,
        Self::FindPrev,
        Self::ReplaceAll,
        Self::FillParagraph,
        Self::CommentRegion,
        Self::UncommentRegion,
        Self::CompleteWord,
        Self::ReindentLine,
        Self::ElectricReturn,
        Self::ConvertEolsLf,
        Self::ConvertEolsCrlf,
        Self::ConvertEolsCr,
        Self::FoldExplorerGoto,
        Self::ToggleMinorMode,
        Self::ChangeMajorMode,
    ];
}

fn search_error(err: SearchError) -> ActionError {
    ActionError::Search(err.to_string())
}

fn eol_target(action: Builtin) -> Option<EolMode> {
    match action {
        Builtin::ConvertEolsLf => Some(EolMode::Lf),
        Builtin::ConvertEolsCrlf => Some(EolMode::Crlf),
        Builtin::ConvertEolsCr => Some(EolMode::Cr),
        _ => None,
    }
}

fn has_service<T: scribe_core::ViewService>(editor: &Editor, view: ViewId) -> bool {
    editor
        .workspace()
        .view(view)
        .is_ok_and(|state| state.service::<T>().is_some())
}

impl Action for Builtin {
    fn name(&self) -> &'static str {
        match self {
            Self::SaveFile => "save-file",
            Self::SaveFileAs => "save-file-as",
            Self::OpenFile => "open-file",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Copy => "copy",
            Self::Cut => "cut",
            Self::Paste => "paste",
            Self::PastePrimary => "paste-primary",
            Self::FindNext => "find-next",
            Self::FindPrev => "find-prev",
            Self::ReplaceAll => "replace-all",
            Self::FillParagraph => "fill-paragraph",
            Self::CommentRegion => "comment-region",
            Self::UncommentRegion => "uncomment-region",
            Self::CompleteWord => "complete-word",
            Self::ReindentLine => "reindent-line",
            Self::ElectricReturn => "electric-return",
            Self::ConvertEolsLf => "convert-eols-lf",
            Self::ConvertEolsCrlf => "convert-eols-crlf",
            Self::ConvertEolsCr => "convert-eols-cr",
            Self::FoldExplorerGoto => "fold-explorer-goto",
            Self::ToggleMinorMode => "toggle-minor-mode",
            Self::ChangeMajorMode => "change-major-mode",
        }
    }

    fn alias(&self) -> Option<&'static str> {
        Some(match self {
            Self::SaveFile => "Save",
            Self::SaveFileAs => "Save As...",
            Self::OpenFile => "Open...",
            Self::Undo => "Undo",
            Self::Redo => "Redo",
            Self::Copy => "Copy",
            Self::Cut => "Cut",
            Self::Paste => "Paste",
            Self::PastePrimary => "Paste Primary Selection",
            Self::FindNext => "Find Next",
            Self::FindPrev => "Find Previous",
            Self::ReplaceAll => "Replace All",
            Self::FillParagraph => "Fill Paragraph",
            Self::CommentRegion => "Comment Region",
            Self::UncommentRegion => "Uncomment Region",
            Self::CompleteWord => "Complete Word",
            Self::ReindentLine => "Reindent",
            Self::ElectricReturn => "Newline and Indent",
            Self::ConvertEolsLf => "Unix (LF)",
            Self::ConvertEolsCrlf => "DOS/Windows (CRLF)",
            Self::ConvertEolsCr => "Old-style Apple (CR)",
            Self::FoldExplorerGoto => "Go to Fold",
            Self::ToggleMinorMode => "Minor Modes",
            Self::ChangeMajorMode => "Major Mode",
        })
    }

    fn is_enabled(&self, editor: &Editor, view: ViewId) -> bool {
        let Ok(doc) = editor.document_of(view) else {
            return false;
        };
        match self {
            Self::SaveFile => doc.url().is_some() && !doc.is_read_only(),
            Self::Undo => doc.can_undo(),
            Self::Redo => doc.can_redo(),
            Self::Copy => doc
                .view_cursor(view)
                .is_some_and(|cursor| cursor.anchor != cursor.caret),
            Self::Cut => {
                !doc.is_read_only()
                    && doc
                        .view_cursor(view)
                        .is_some_and(|cursor| cursor.anchor != cursor.caret)
            }
            Self::Paste
            | Self::PastePrimary
            | Self::ReplaceAll
            | Self::FillParagraph
            | Self::ReindentLine
            | Self::ElectricReturn => !doc.is_read_only(),
            Self::CommentRegion | Self::UncommentRegion => {
                !doc.is_read_only()
                    && editor
                        .major_mode(view)
                        .is_some_and(|mode| mode.comment().has_start())
            }
            Self::CompleteWord => !doc.is_read_only() && has_service::<TabCompletion>(editor, view),
            Self::FoldExplorerGoto => has_service::<FoldExplorer>(editor, view),
            Self::ConvertEolsLf | Self::ConvertEolsCrlf | Self::ConvertEolsCr => {
                !doc.is_read_only()
            }
            Self::SaveFileAs
            | Self::OpenFile
            | Self::FindNext
            | Self::FindPrev
            | Self::ToggleMinorMode
            | Self::ChangeMajorMode => true,
        }
    }

    fn is_checked(&self, editor: &Editor, view: ViewId) -> Option<bool> {
        if let Some(target) = eol_target(*self) {
            return editor.document_of(view).ok().map(|doc| doc.eol_mode() == target);
        }
        None
    }

    fn run(&self, editor: &mut Editor, view: ViewId, args: &ActionArgs) -> Result<(), ActionError> {
        match self {
            Self::SaveFile => {
                let doc = editor.workspace().view(view)?.document_id();
                let written = editor.workspace_mut().save(doc)?;
                editor.set_status(format!("Saved {written} bytes"));
            }
            Self::SaveFileAs => {
                let url = parse_url(args.required(self.name())?).map_err(WorkspaceError::from)?;
                let doc = editor.workspace().view(view)?.document_id();
                let written = editor.workspace_mut().save_as(doc, url.clone())?;
                editor.set_status(format!("Saved {written} bytes to {url}"));
            }
            Self::OpenFile => {
                let url = args.required(self.name())?.to_string();
                let opened = editor.open_url(&url)?;
                editor.workspace_mut().set_active_view(opened)?;
            }
            Self::Undo | Self::Redo => {
                let mut cx = editor.context(view)?;
                for _ in 0..args.count() {
                    let done = match self {
                        Self::Undo => cx.session.undo(),
                        _ => cx.session.redo(),
                    };
                    if !done {
                        break;
                    }
                }
            }
            Self::Copy => {
                let mut cx = editor.context(view)?;
                cx.session.copy(cx.clipboard, ClipboardKind::Normal);
            }
            Self::Cut => {
                let mut cx = editor.context(view)?;
                cx.session.cut(cx.clipboard)?;
            }
            Self::Paste | Self::PastePrimary => {
                let kind = match self {
                    Self::Paste => ClipboardKind::Normal,
                    _ => ClipboardKind::Selection,
                };
                let mut cx = editor.context(view)?;
                for _ in 0..args.count() {
                    if !cx.session.paste(cx.clipboard, kind)? {
                        break;
                    }
                }
            }
            Self::FindNext | Self::FindPrev => {
                let forward = *self == Self::FindNext;
                let message = find(editor, view, args, forward)?;
                editor.set_status(message);
            }
            Self::ReplaceAll => {
                let mut cx = editor.context(view)?;
                let count = cx
                    .session
                    .with_service::<FindService, _>(|find, session| {
                        if let Some(replace) = &args.argument {
                            find.set_replace_string(replace);
                        }
                        find.replace_all(session)
                    })
                    .transpose()
                    .map_err(search_error)?
                    .unwrap_or(0);
                editor.set_status(format!("Replaced {count} occurrences"));
            }
            Self::FillParagraph => {
                let mut cx = editor.context(view)?;
                fill_paragraph(&mut cx.session, cx.mode.comment(), cx.mode.paragraph_style())?;
            }
            Self::CommentRegion | Self::UncommentRegion => {
                let mut cx = editor.context(view)?;
                comment_region(&mut cx.session, cx.mode.comment(), *self == Self::CommentRegion)?;
            }
            Self::CompleteWord => {
                let others = editor.other_texts(view);
                let mut cx = editor.context(view)?;
                let word = cx
                    .session
                    .with_service::<TabCompletion, _>(|completion, session| {
                        completion.complete(session, &others)
                    })
                    .transpose()?
                    .flatten();
                if word.is_none() {
                    editor.set_status("No completions");
                }
            }
            Self::ReindentLine => {
                let mut cx = editor.context(view)?;
                cx.autoindent.process_tab(&mut cx.session)?;
            }
            Self::ElectricReturn => {
                let mut cx = editor.context(view)?;
                for _ in 0..args.count() {
                    cx.autoindent.electric_return(&mut cx.session)?;
                }
            }
            Self::ConvertEolsLf | Self::ConvertEolsCrlf | Self::ConvertEolsCr => {
                let Some(target) = eol_target(*self) else {
                    return Ok(());
                };
                let mut cx = editor.context(view)?;
                cx.session.convert_eols(target)?;
                cx.session.set_eol_mode(target);
            }
            Self::FoldExplorerGoto => {
                let mut cx = editor.context(view)?;
                let index = args.index;
                let target = cx.session.with_service::<FoldExplorer, _>(|explorer, session| {
                    let entries = explorer.entries(session.document());
                    let line = if index >= 0 {
                        entries.get(index as usize).map(|(line, _, _)| *line)
                    } else {
                        let caret_line = session.get_current_line();
                        entries
                            .iter()
                            .rev()
                            .find(|(line, _, _)| *line <= caret_line)
                            .map(|(line, _, _)| *line)
                    };
                    if let Some(line) = line {
                        FoldExplorer::goto(session, line);
                    }
                    line
                });
                if target.flatten().is_none() {
                    editor.set_status("No fold at that position");
                }
            }
            Self::ToggleMinorMode => {
                let keyword = args.required(self.name())?.to_string();
                let mut cx = editor.context(view)?;
                let attached = cx
                    .session
                    .view()
                    .is_some_and(|state| cx.minor_modes.is_attached(&keyword, state));
                let changed = if attached {
                    cx.minor_modes.detach(&keyword, &mut cx.session)
                } else {
                    cx.minor_modes.attach(&keyword, cx.mode, &mut cx.session)
                };
                if !changed {
                    editor.set_status(format!("Minor mode {keyword} is not available here"));
                }
            }
            Self::ChangeMajorMode => {
                let keyword = args.required(self.name())?.to_string();
                editor.change_major_mode(view, &keyword)?;
            }
        }
        Ok(())
    }
}

/// One find step, wrapping around the document end once. Returns the echo area message.
fn find(
    editor: &mut Editor,
    view: ViewId,
    args: &ActionArgs,
    forward: bool,
) -> Result<String, ActionError> {
    let mut cx = editor.context(view)?;
    let outcome = cx.session.with_service::<FindService, _>(|find, session| {
        if let Some(text) = &args.argument {
            find.set_find_string(text)?;
        }
        let step = |find: &mut FindService, session: &mut dyn StyledTextCtrl, start| {
            if forward {
                find.do_find_next(session, start, false)
            } else {
                find.do_find_prev(session, start, false)
            }
        };
        let Some(first) = step(find, &mut *session, None) else {
            return Ok(None);
        };
        if first.found.is_some() {
            let wrapped = find.settings().wrapped;
            return Ok(Some((true, wrapped)));
        }
        let restart = if forward { 0 } else { session.length() };
        find.settings_mut().wrapped = true;
        let again = step(find, &mut *session, Some(restart)).and_then(|o| o.found);
        Ok::<_, SearchError>(Some((again.is_some(), true)))
    });
    let message = match outcome.transpose().map_err(search_error)?.flatten() {
        None => "No search string",
        Some((false, _)) => "Search string not found",
        Some((true, true)) => "Search wrapped",
        Some((true, false)) => "",
    };
    Ok(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_are_unique() {
        let registry = ActionRegistry::with_builtins();
        assert_eq!(registry.len(), Builtin::ALL.len());
        assert!(registry.get("save-file").is_some());
        assert!(registry.get("fold-explorer-goto").is_some());
        assert!(registry.get("no-such-action").is_none());
    }

    #[test]
    fn test_args() {
        let args = ActionArgs::default();
        assert_eq!(args.index, -1);
        assert_eq!(args.count(), 1);
        assert_eq!(ActionArgs::repeated(-4).count(), 4);
        assert!(matches!(
            args.required("open-file"),
            Err(ActionError::MissingArgument(name)) if name == "open-file"
        ));
        assert_eq!(ActionArgs::with_argument("x").required("open-file").ok(), Some("x"));
    }
}
