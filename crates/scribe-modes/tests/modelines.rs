use pretty_assertions::assert_eq;
use scribe_core::{ViewId, ViewSettings};
use scribe_modes::{Editor, StartupOptions};
use url::Url;

fn open(editor: &mut Editor, url: &str, text: &str) -> ViewId {
    editor
        .open_text(Some(Url::parse(url).unwrap()), text)
        .unwrap()
}

fn settings(editor: &Editor, view: ViewId) -> ViewSettings {
    editor.workspace().view(view).unwrap().settings.clone()
}

#[test]
fn test_vim_modeline_overrides_mode_defaults() {
    let mut editor = Editor::new(&StartupOptions::default()).unwrap();
    let view = open(
        &mut editor,
        "mem:tabs.py",
        "x = 1\n\n# vim: set ts=4 sw=2 noet:\n",
    );
    let s = settings(&editor, view);
    assert_eq!(s.tab_width, 4);
    assert_eq!(s.indent, 2);
    assert!(s.use_tabs);

    let modes = editor.view_modes(view).unwrap();
    assert_eq!(modes.modeline().tab_width, Some(4));
    assert_eq!(modes.modeline().mode, None);
}

#[test]
fn test_emacs_header_picks_mode_and_width() {
    let mut editor = Editor::new(&StartupOptions::default()).unwrap();
    let view = open(
        &mut editor,
        "mem:notes.txt",
        "/* -*- mode: C; tab-width: 3 -*- */\nint x;\n",
    );
    assert_eq!(editor.view_modes(view).unwrap().major(), "C");
    assert_eq!(settings(&editor, view).tab_width, 3);
}

#[test]
fn test_kate_line_beats_makefile_tabs() {
    let mut editor = Editor::new(&StartupOptions::default()).unwrap();
    let plain = open(&mut editor, "mem:Makefile", "all:\n");
    assert!(settings(&editor, plain).use_tabs);

    let spaced = open(
        &mut editor,
        "mem:other/Makefile",
        "# kate: space-indent on; show-tabs on;\nall:\n",
    );
    let s = settings(&editor, spaced);
    assert!(!s.use_tabs);
    assert!(s.view_whitespace);
}

#[test]
fn test_user_prefs_apply_below_modelines() {
    let mut editor = Editor::new(&StartupOptions::default()).unwrap();
    editor
        .load_prefs("PythonMode:\n  tab_size: 6\n  edge_column: 100\nFundamental:\n  edge_column: 60\n")
        .unwrap();

    let view = open(&mut editor, "mem:a.py", "pass\n");
    let s = settings(&editor, view);
    assert_eq!(s.tab_width, 6);
    assert_eq!(s.edge_column, 100);

    let text = open(&mut editor, "mem:a.txt", "words\n");
    assert_eq!(settings(&editor, text).edge_column, 60);

    let overridden = open(&mut editor, "mem:b.py", "pass\n# vim: ts=2:\n");
    assert_eq!(settings(&editor, overridden).tab_width, 2);
}
