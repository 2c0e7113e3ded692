use pretty_assertions::assert_eq;
use scribe_core::{StyledTextCtrl, ViewId};
use scribe_modes::{ActionArgs, Editor, StartupOptions};
use url::Url;

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

fn run(editor: &mut Editor, view: ViewId, action: &str) {
    editor
        .run_action(view, action, &ActionArgs::default())
        .unwrap();
}

#[test]
fn test_c_block_comment_fills_to_one_line() {
    let (mut editor, view) = prepare("mem:a.c", "/* aoeu| aoeu\n * aoeu aoeu\n */");
    run(&mut editor, view, "fill-paragraph");
    assert_eq!(text(&editor, view), "/* aoeu aoeu aoeu aoeu */");

    assert!(editor.workspace_mut().session(view).unwrap().undo());
    assert_eq!(text(&editor, view), "/* aoeu aoeu\n * aoeu aoeu\n */");
}

#[test]
fn test_c_long_block_comment_wraps_with_stars() {
    let words = vec!["word"; 20].join(" ");
    let (mut editor, view) = prepare("mem:b.c", &format!("/* |{words} */\n"));
    editor
        .workspace_mut()
        .view_mut(view)
        .unwrap()
        .settings
        .edge_column = 30;
    run(&mut editor, view, "fill-paragraph");

    let filled = text(&editor, view);
    let lines: Vec<&str> = filled.lines().collect();
    assert!(lines[0].starts_with("/* word"));
    assert!(lines[1..lines.len() - 1].iter().all(|l| l.starts_with(" * word")));
    assert_eq!(lines[lines.len() - 1], " */");
    assert!(lines.iter().all(|l| l.chars().count() <= 30));
    assert_eq!(filled.matches("word").count(), 20);
}

#[test]
fn test_python_comment_paragraph_keeps_leader() {
    let (mut editor, view) = prepare(
        "mem:c.py",
        "x = 1\n    # one two three\n    # four| five six\n\n    # other\n",
    );
    editor
        .workspace_mut()
        .view_mut(view)
        .unwrap()
        .settings
        .edge_column = 20;
    run(&mut editor, view, "fill-paragraph");
    assert_eq!(
        text(&editor, view),
        "x = 1\n    # one two three\n    # four five six\n\n    # other\n"
    );

    editor
        .workspace_mut()
        .view_mut(view)
        .unwrap()
        .settings
        .edge_column = 80;
    run(&mut editor, view, "fill-paragraph");
    assert_eq!(
        text(&editor, view),
        "x = 1\n    # one two three four five six\n\n    # other\n"
    );
}

#[test]
fn test_plain_text_paragraph_stops_at_blank_line() {
    let (mut editor, view) = prepare(
        "mem:d.txt",
        "alpha beta\ngamma| delta\n\nkept apart\n",
    );
    run(&mut editor, view, "fill-paragraph");
    assert_eq!(text(&editor, view), "alpha beta gamma delta\n\nkept apart\n");
}

#[test]
fn test_comment_region_round_trip() {
    let (mut editor, view) = prepare("mem:e.py", "|def f():\n    return 1\n");
    editor
        .workspace_mut()
        .session(view)
        .unwrap()
        .set_selection(0, 20);
    run(&mut editor, view, "comment-region");
    assert_eq!(text(&editor, view), "#def f():\n    #return 1\n");

    run(&mut editor, view, "uncomment-region");
    assert_eq!(text(&editor, view), "def f():\n    return 1\n");
}

#[test]
fn test_comment_region_uses_block_delimiters_in_c() {
    let (mut editor, view) = prepare("mem:f.c", "int x;|\n");
    run(&mut editor, view, "comment-region");
    assert_eq!(text(&editor, view), "/*int x;*/\n");
}
