use std::sync::Arc;

use pretty_assertions::assert_eq;
use scribe_core::{EolMode, StyledTextCtrl, VfsRegistry, ViewId, Workspace};
use scribe_keymap::{KeyMap, KeyResult};
use scribe_modes::{ActionArgs, ActionError, Editor, ModeError, StartupOptions};
use url::Url;

fn editor() -> Editor {
    // RUST_LOG=scribe_modes=debug shows the dispatch trace.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Editor::new(&StartupOptions::default()).unwrap()
}

fn open(editor: &mut Editor, url: &str, text: &str) -> ViewId {
    editor
        .open_text(Some(Url::parse(url).unwrap()), text)
        .unwrap()
}

fn text(editor: &Editor, view: ViewId) -> String {
    editor.document_of(view).unwrap().text()
}

fn selection(editor: &mut Editor, view: ViewId) -> (usize, usize) {
    editor.workspace_mut().session(view).unwrap().get_selection()
}

#[test]
fn test_multi_stroke_save_and_quit() {
    let vfs = Arc::new(VfsRegistry::new());
    vfs.mem().insert("notes.txt", "hello\n", None);

    let mut keymap = KeyMap::new("global");
    keymap.bind("C-X C-S", "save-file").unwrap();
    keymap.bind("C-X C-F", "open-file").unwrap();
    let mut editor = Editor::with_keymap(Workspace::with_vfs(vfs.clone()), keymap);

    let view = editor.open_url("mem:notes.txt").unwrap();
    assert_eq!(text(&editor, view), "hello\n");
    editor.handle_key(view, "x").unwrap();

    assert_eq!(editor.handle_key(view, "C-X").unwrap(), KeyResult::Pending);
    assert_eq!(editor.echo(), "C-X");
    assert!(matches!(
        editor.handle_key(view, "C-S").unwrap(),
        KeyResult::Dispatch { ref action, .. } if action == "save-file"
    ));
    assert_eq!(vfs.mem().get("notes.txt").unwrap(), b"xhello\n".to_vec());
    assert_eq!(editor.echo(), "Saved 7 bytes");

    editor.handle_key(view, "C-X").unwrap();
    assert_eq!(editor.handle_key(view, "C-G").unwrap(), KeyResult::Quit);
    assert_eq!(editor.echo(), "Quit");
}

#[test]
fn test_find_next_and_prev_wrap_once() {
    let mut editor = editor();
    let view = open(
        &mut editor,
        "mem:find.txt",
        "line 0\nline 1\nline 2\nline 3\nblah blah blah\nstuff\nthings",
    );

    editor
        .run_action(view, "find-next", &ActionArgs::with_argument("line"))
        .unwrap();
    assert_eq!(selection(&mut editor, view), (0, 4));
    for start in [7, 14, 21] {
        editor
            .run_action(view, "find-next", &ActionArgs::default())
            .unwrap();
        assert_eq!(selection(&mut editor, view).0, start);
        assert_eq!(editor.echo(), "");
    }

    editor
        .run_action(view, "find-next", &ActionArgs::default())
        .unwrap();
    assert_eq!(selection(&mut editor, view).0, 0);
    assert_eq!(editor.echo(), "Search wrapped");

    editor
        .run_action(view, "find-prev", &ActionArgs::default())
        .unwrap();
    assert_eq!(selection(&mut editor, view).0, 21);

    editor
        .run_action(view, "find-next", &ActionArgs::with_argument("missing"))
        .unwrap();
    assert_eq!(editor.echo(), "Search string not found");
}

#[test]
fn test_replace_all_is_one_undo_step() {
    let mut editor = editor();
    let view = open(&mut editor, "mem:r.txt", "line 0\nline 1\nother\n");
    editor
        .run_action(view, "find-next", &ActionArgs::with_argument("line"))
        .unwrap();
    editor
        .run_action(view, "replace-all", &ActionArgs::with_argument("row"))
        .unwrap();
    assert_eq!(text(&editor, view), "row 0\nrow 1\nother\n");
    assert_eq!(editor.echo(), "Replaced 2 occurrences");

    editor.handle_key(view, "C-Z").unwrap();
    assert_eq!(text(&editor, view), "line 0\nline 1\nother\n");
    editor.handle_key(view, "C-Y").unwrap();
    assert_eq!(text(&editor, view), "row 0\nrow 1\nother\n");
}

#[test]
fn test_convert_eols_through_keys() {
    let mut editor = editor();
    let view = open(&mut editor, "mem:eol.txt", "a\r\nb\r\nc\n");
    assert_eq!(editor.document_of(view).unwrap().eol_mode(), EolMode::Crlf);

    assert_eq!(editor.handle_key(view, "C-E").unwrap(), KeyResult::Pending);
    editor.handle_key(view, "C-L").unwrap();
    assert_eq!(text(&editor, view), "a\nb\nc\n");
    assert_eq!(editor.document_of(view).unwrap().eol_mode(), EolMode::Lf);
    let convert = editor.actions().get("convert-eols-lf").unwrap();
    assert_eq!(convert.is_checked(&editor, view), Some(true));

    editor.handle_key(view, "C-Z").unwrap();
    assert_eq!(text(&editor, view), "a\r\nb\r\nc\n");
}

#[test]
fn test_copy_and_paste() {
    let mut editor = editor();
    let view = open(&mut editor, "mem:clip.txt", "hello world");
    assert!(matches!(
        editor.run_action(view, "copy", &ActionArgs::default()),
        Err(ActionError::Disabled(name)) if name == "copy"
    ));

    editor
        .workspace_mut()
        .session(view)
        .unwrap()
        .set_selection(0, 5);
    editor.handle_key(view, "C-C").unwrap();
    editor.workspace_mut().session(view).unwrap().goto_position(11);
    editor.handle_key(view, "C-V").unwrap();
    assert_eq!(text(&editor, view), "hello worldhello");
}

#[test]
fn test_unknown_and_disabled_actions() {
    let mut editor = editor();
    let view = editor.open_text(None, "scratch").unwrap();
    assert!(matches!(
        editor.run_action(view, "frobnicate", &ActionArgs::default()),
        Err(ActionError::Unknown(name)) if name == "frobnicate"
    ));
    assert!(matches!(
        editor.run_action(view, "undo", &ActionArgs::default()),
        Err(ActionError::Disabled(_))
    ));
    // No URL to save to.
    assert!(matches!(
        editor.run_action(view, "save-file", &ActionArgs::default()),
        Err(ActionError::Disabled(_))
    ));
    assert!(matches!(
        editor.run_action(view, "open-file", &ActionArgs::default()),
        Err(ActionError::MissingArgument(_))
    ));
    assert_eq!(editor.echo(), "action 'open-file' needs an argument");
}

#[test]
fn test_fold_explorer_toggle_and_goto() {
    let mut editor = editor();
    let view = open(
        &mut editor,
        "mem:outline.py",
        "class A:\n    def f(self):\n        pass\n\ndef g():\n    pass\n",
    );
    assert!(matches!(
        editor.run_action(view, "fold-explorer-goto", &ActionArgs::with_index(0)),
        Err(ActionError::Disabled(_))
    ));

    editor
        .run_action(view, "toggle-minor-mode", &ActionArgs::with_argument("FoldExplorer"))
        .unwrap();
    editor
        .run_action(view, "fold-explorer-goto", &ActionArgs::with_index(2))
        .unwrap();
    let caret = editor.workspace_mut().session(view).unwrap().current_position();
    assert_eq!(caret, 40);
    assert_eq!(editor.workspace().view(view).unwrap().first_visible_line, 4);

    editor
        .run_action(view, "toggle-minor-mode", &ActionArgs::with_argument("FoldExplorer"))
        .unwrap();
    assert!(editor.run_action(view, "fold-explorer-goto", &ActionArgs::default()).is_err());
}

#[test]
fn test_minor_mode_pref_enables_completion() {
    let mut editor = editor();
    editor
        .load_prefs("Fundamental:\n  minor_modes: TabCompletion\n")
        .unwrap();
    let view = open(&mut editor, "mem:words.txt", "zebra\nze");
    editor.workspace_mut().session(view).unwrap().goto_position(8);

    editor.handle_key(view, "C-SPC").unwrap();
    assert_eq!(text(&editor, view), "zebra\nzebra");
}

#[test]
fn test_change_major_mode() {
    let mut editor = editor();
    let view = open(&mut editor, "mem:x.txt", "int x;\n");
    assert_eq!(editor.view_modes(view).unwrap().major(), "Fundamental");

    editor
        .run_action(view, "change-major-mode", &ActionArgs::with_argument("C"))
        .unwrap();
    assert_eq!(editor.view_modes(view).unwrap().major(), "C");
    assert_eq!(
        editor.workspace().view(view).unwrap().major_mode.as_deref(),
        Some("C")
    );

    assert!(matches!(
        editor.run_action(view, "change-major-mode", &ActionArgs::with_argument("cobol")),
        Err(ActionError::Mode(ModeError::UnknownMode(name))) if name == "cobol"
    ));
}

#[test]
fn test_unreadable_url_opens_error_buffer() {
    let mut editor = editor();
    let view = editor.open_url("mem:missing.txt").unwrap();
    let doc = editor.document_of(view).unwrap();
    assert!(doc.text().starts_with("Failed opening mem:missing.txt"));
    assert!(doc.is_read_only());
    assert_eq!(editor.view_modes(view).unwrap().major(), "Fundamental");
}

#[test]
fn test_session_round_trip() {
    let vfs = Arc::new(VfsRegistry::new());
    vfs.mem().insert("a.txt", "alpha\n", None);
    vfs.mem().insert("b.py", "import os\n", None);

    let options = StartupOptions::default();
    let keymap = scribe_keymap::preset_keymap(options.key_bindings).unwrap();
    let mut first = Editor::with_keymap(Workspace::with_vfs(vfs.clone()), keymap.clone());
    first.open_url("mem:a.txt").unwrap();
    first.open_url("mem:b.py").unwrap();
    first.open_text(None, "unsaved").unwrap();

    let session = first.session_state();
    assert_eq!(
        session.frames(),
        &[vec!["mem:a.txt".to_string(), "mem:b.py".to_string()]]
    );

    let mut second = Editor::with_keymap(Workspace::with_vfs(vfs), keymap);
    let views = second.restore_session(&session).unwrap();
    let majors: Vec<&str> = views
        .iter()
        .map(|v| second.view_modes(*v).unwrap().major())
        .collect();
    assert_eq!(majors, vec!["Fundamental", "Python"]);
}

#[test]
fn test_startup_respects_no_session() {
    let vfs = Arc::new(VfsRegistry::new());
    vfs.mem().insert("saved.txt", "from last time\n", None);
    vfs.mem().insert("arg.c", "int x;\n", None);
    let session = scribe_modes::Session::parse("--- frame\nurl mem:saved.txt\n");

    let (options, urls) = StartupOptions::parse(["mem:arg.c"]).unwrap();
    let keymap = scribe_keymap::preset_keymap(options.key_bindings).unwrap();
    let mut editor = Editor::with_keymap(Workspace::with_vfs(vfs.clone()), keymap.clone());
    let views = editor.startup(&options, &session, &urls).unwrap();
    assert_eq!(views.len(), 2);
    assert_eq!(editor.workspace().active_view_id(), Some(views[1]));
    assert_eq!(editor.view_modes(views[1]).unwrap().major(), "C");

    let (options, urls) = StartupOptions::parse(["--no-session", "mem:arg.c"]).unwrap();
    let mut editor = Editor::with_keymap(Workspace::with_vfs(vfs), keymap);
    let views = editor.startup(&options, &session, &urls).unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(text(&editor, views[0]), "int x;\n");
}
