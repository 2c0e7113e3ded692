use pretty_assertions::assert_eq;
use scribe_core::{StyledTextCtrl, ViewId};
use scribe_modes::{ActionArgs, Editor, StartupOptions};
use url::Url;

/// Open `marked` as `url` with the caret at the `|` marker.
fn prepare(url: &str, marked: &str) -> (Editor, ViewId) {
    let marker = marked.find('|').expect("caret marker");
    let caret = marked[..marker].chars().count();
    let text = marked.replacen('|', "", 1);
    let mut editor = Editor::new(&StartupOptions::default()).unwrap();
    let view = editor
        .open_text(Some(Url::parse(url).unwrap()), &text)
        .unwrap();
    editor
        .workspace_mut()
        .session(view)
        .unwrap()
        .goto_position(caret);
    (editor, view)
}

fn text(editor: &Editor, view: ViewId) -> String {
    editor.document_of(view).unwrap().text()
}

fn caret(editor: &Editor, view: ViewId) -> usize {
    editor
        .document_of(view)
        .unwrap()
        .view_cursor(view)
        .unwrap()
        .caret
}

/// Buffer text with `|` at the caret.
fn marked(editor: &Editor, view: ViewId) -> String {
    let mut text = text(editor, view);
    let at = text
        .char_indices()
        .nth(caret(editor, view))
        .map_or(text.len(), |(i, _)| i);
    text.insert(at, '|');
    text
}

/// Run `action` on each `(before, after)` pair opened as `url`.
fn check_action(url: &str, action: &str, cases: &[(&str, &str)]) {
    for (before, after) in cases {
        let (mut editor, view) = prepare(url, before);
        editor
            .run_action(view, action, &ActionArgs::default())
            .unwrap();
        assert_eq!(marked(&editor, view), *after, "{before:?}");
    }
}

#[test]
fn test_python_return_indents_block_body() {
    let (mut editor, view) = prepare("mem:foo.py", "class Foo:\n    def bar():|");
    assert_eq!(editor.view_modes(view).unwrap().autoindent().name(), "python");

    editor.handle_key(view, "RET").unwrap();
    assert_eq!(text(&editor, view), "class Foo:\n    def bar():\n        ");
    assert_eq!(caret(&editor, view), 34);

    let cx = editor.context(view).unwrap();
    assert_eq!(cx.autoindent.find_indent(&cx.session, 2), Some(8));
}

#[test]
fn test_python_electric_colon_dedents_else() {
    let (mut editor, view) = prepare("mem:cond.py", "if x:\n    y = 1\n    else|");
    editor.handle_key(view, ":").unwrap();
    assert_eq!(text(&editor, view), "if x:\n    y = 1\nelse:");

    // One undo step removes the colon and restores the indentation.
    editor.handle_key(view, "C-Z").unwrap();
    assert_eq!(text(&editor, view), "if x:\n    y = 1\n    else");
}

#[test]
fn test_python_bracket_continuation_aligns() {
    let (mut editor, view) = prepare("mem:call.py", "result = call(first,|");
    editor.handle_key(view, "RET").unwrap();
    assert_eq!(text(&editor, view), "result = call(first,\n              ");
}

#[test]
fn test_fortran_digit_goes_into_label_field() {
    let (mut editor, view) = prepare("mem:hello.f", "   10|  WRITE(*,*) 'HI'");
    assert_eq!(editor.view_modes(view).unwrap().major(), "Fortran77");

    editor.handle_key(view, "2").unwrap();
    assert_eq!(text(&editor, view), "  102  WRITE(*,*) 'HI'");
    assert_eq!(caret(&editor, view), 6);
    assert_eq!(text(&editor, view).chars().nth(5), Some(' '));
}

#[test]
fn test_fortran_digit_in_code_is_plain_text() {
    let (mut editor, view) = prepare("mem:hello.f", "      X = |");
    editor.handle_key(view, "4").unwrap();
    assert_eq!(text(&editor, view), "      X = 4");
}

#[test]
fn test_c_return_after_open_brace() {
    let (mut editor, view) = prepare("mem:main.c", "int main() {|\n}\n");
    editor.handle_key(view, "RET").unwrap();
    assert_eq!(text(&editor, view), "int main() {\n    \n}\n");
    assert_eq!(caret(&editor, view), 17);
}

#[test]
fn test_makefile_recipe_uses_tab() {
    let (mut editor, view) = prepare("mem:Makefile", "all: main.o|\n");
    assert_eq!(editor.view_modes(view).unwrap().major(), "Makefile");
    editor.handle_key(view, "RET").unwrap();
    assert_eq!(text(&editor, view), "all: main.o\n\t\n");
}

#[test]
fn test_fundamental_return_keeps_indentation() {
    let (mut editor, view) = prepare("mem:notes.txt", "  first|");
    editor.handle_key(view, "RET").unwrap();
    assert_eq!(text(&editor, view), "  first\n  ");
}

#[test]
fn test_prefix_argument_repeats_insertion() {
    let (mut editor, view) = prepare("mem:notes.txt", "|");
    editor.handle_key(view, "C-U").unwrap();
    editor.handle_key(view, "3").unwrap();
    editor.handle_key(view, "x").unwrap();
    assert_eq!(text(&editor, view), "xxx");
}

#[test]
fn test_read_only_buffer_rejects_typing() {
    let (mut editor, view) = prepare("mem:notes.txt", "text|");
    let doc = editor.workspace().view(view).unwrap().document_id();
    editor
        .workspace_mut()
        .document_mut(doc)
        .unwrap()
        .set_read_only(true);
    assert!(editor.handle_key(view, "x").is_err());
    assert_eq!(text(&editor, view), "text");
}

#[test]
fn test_python_reindent_line() {
    check_action(
        "mem:reindent.py",
        "reindent-line",
        &[
            ("if blah:\n    pass\n    else:|", "if blah:\n    pass\nelse:|"),
            ("if blah:\n  pass|", "if blah:\n    pass|"),
            ("if blah:\npass|", "if blah:\n    pass|"),
            ("if blah:\n  pa|ss", "if blah:\n    pa|ss"),
            ("if blah:\n  |  pass", "if blah:\n    |pass"),
            ("if blah:\n | pass", "if blah:\n    |pass"),
            ("if blah:\n  |            pass", "if blah:\n    |pass"),
            ("if blah:\n    stuff\n  |pass", "if blah:\n    stuff\n    |pass"),
        ],
    );
}

#[test]
fn test_python_reindent_skips_blank_lines() {
    check_action(
        "mem:blank.py",
        "reindent-line",
        &[
            (
                "if blah:\n\n\n\n  |            pass",
                "if blah:\n\n\n\n    |pass",
            ),
            (
                "if blah:\n         \n\n                       \n  |            pass",
                "if blah:\n         \n\n                       \n    |pass",
            ),
            (
                "        if blah:\n         \n\n                       \n  |            pass",
                "        if blah:\n         \n\n                       \n            |pass",
            ),
        ],
    );
}

#[test]
fn test_python_comment_sets_dedent_baseline() {
    let before = "class Blah\n    def func(self):\n        if True:\n            if True:\n                pass\n            elif True:\n                pass\n        # new baseline\n|else:";
    let after = "class Blah\n    def func(self):\n        if True:\n            if True:\n                pass\n            elif True:\n                pass\n        # new baseline\n    |else:";
    check_action("mem:base.py", "reindent-line", &[(before, after)]);
}

#[test]
fn test_fortran_return_indents_blocks() {
    check_action(
        "mem:ret.f",
        "electric-return",
        &[
            ("      PROGRAM sample|", "      PROGRAM sample\n      |"),
            ("      IF (BLAH) THEN|", "      IF (BLAH) THEN\n          |"),
            (
                "      IF (BLAH) THEN\n          B=1.0|",
                "      IF (BLAH) THEN\n          B=1.0\n          |",
            ),
            (
                "      IF (BLAH) THEN\n          B=1.0\n      ENDIF|",
                "      IF (BLAH) THEN\n          B=1.0\n      ENDIF\n      |",
            ),
        ],
    );
}

#[test]
fn test_fortran_reindent_line() {
    check_action(
        "mem:tab.f",
        "reindent-line",
        &[
            ("          |PROGRAM sample", "      |PROGRAM sample"),
            ("      \n20  |  CALL SOMEFUNC(B)", "      \n20    |CALL SOMEFUNC(B)"),
            (
                "      \n10    CALL SOMEFUNC(B)\n20  |  CONTINUE",
                "      \n10    CALL SOMEFUNC(B)\n20    |CONTINUE",
            ),
            ("      IF (BLAH) THEN\n             |B=1.0", "      IF (BLAH) THEN\n          |B=1.0"),
            ("      IF (BLAH) THEN\n      |    B=1.0", "      IF (BLAH) THEN\n          |B=1.0"),
            ("      IF (BLAH) THEN\n          B=|1.0", "      IF (BLAH) THEN\n          B=|1.0"),
            (
                "      IF (BLAH) THEN\n                      B=|1.0",
                "      IF (BLAH) THEN\n          B=|1.0",
            ),
            (
                "      IF (BLAH) THEN\n          B=1.0\n          |ENDIF",
                "      IF (BLAH) THEN\n          B=1.0\n      |ENDIF",
            ),
        ],
    );
}

#[test]
fn test_fortran_comment_region_uses_star() {
    let (mut editor, view) = prepare("mem:c.f", "|      X = 1\n");
    editor
        .run_action(view, "comment-region", &ActionArgs::default())
        .unwrap();
    assert_eq!(text(&editor, view), "      *X = 1\n");
}
