use pretty_assertions::assert_eq;
use scribe_core::{
    DocumentId, FindFlavor, FindService, StyledTextCtrl, ViewId, ViewSettings, Workspace,
};

const TEXT: &str = "line 0\nline 1\nline 2\nline 3\nblah blah blah\nstuff\nthings";

fn open(text: &str) -> (Workspace, DocumentId, ViewId) {
    let mut ws = Workspace::new();
    let doc = ws.open_text(None, text);
    let view = ws.attach_view(doc, ViewSettings::default()).unwrap();
    (ws, doc, view)
}

fn pairs(outcomes: &[scribe_core::FindOutcome]) -> Vec<(isize, usize)> {
    outcomes.iter().map(|o| (o.match_start(), o.start)).collect()
}

#[test]
fn test_find_next_walks_forward() {
    let (mut ws, _, view) = open(TEXT);
    let mut session = ws.session(view).unwrap();
    let mut find = FindService::new(FindFlavor::Literal);
    find.set_find_string("line").unwrap();

    let outcomes: Vec<_> = (0..5)
        .map(|_| find.do_find_next(&mut session, None, false).unwrap())
        .collect();
    assert_eq!(
        pairs(&outcomes),
        vec![(0, 0), (7, 4), (14, 11), (21, 18), (-1, 25)]
    );
}

#[test]
fn test_find_prev_walks_backward() {
    let (mut ws, _, view) = open(TEXT);
    let mut session = ws.session(view).unwrap();
    let mut find = FindService::new(FindFlavor::Literal);
    find.set_find_string("line").unwrap();

    let mut outcomes = vec![find.do_find_prev(&mut session, Some(1000), false).unwrap()];
    for _ in 0..4 {
        outcomes.push(find.do_find_prev(&mut session, None, false).unwrap());
    }
    assert_eq!(pairs(&outcomes[..1]), vec![(21, 1000)]);
    assert_eq!(
        pairs(&outcomes[1..]),
        vec![(14, 21), (7, 14), (0, 7), (-1, 0)]
    );
}

#[test]
fn test_regex_find() {
    let (mut ws, _, view) = open(TEXT);
    let mut session = ws.session(view).unwrap();
    let mut find = FindService::new(FindFlavor::Regex);
    find.set_find_string("line [13]").unwrap();

    let outcomes: Vec<_> = (0..3)
        .map(|_| find.do_find_next(&mut session, None, false).unwrap())
        .collect();
    assert_eq!(pairs(&outcomes), vec![(7, 0), (21, 13), (-1, 27)]);
}

#[test]
fn test_smart_case_search() {
    let (mut ws, _, view) = open("Blah blah BLAH");
    let mut session = ws.session(view).unwrap();
    let mut find = FindService::new(FindFlavor::Literal);

    find.set_find_string("blah").unwrap();
    let first = find.do_find_next(&mut session, Some(0), false).unwrap();
    assert_eq!(first.match_start(), 0);

    find.set_find_string("BLAH").unwrap();
    let upper = find.do_find_next(&mut session, Some(0), false).unwrap();
    assert_eq!(upper.match_start(), 10);
}

#[test]
fn test_invalid_regex_is_reported() {
    let mut find = FindService::new(FindFlavor::Regex);
    assert!(find.set_find_string("line (").is_err());
}

#[test]
fn test_replace_selected_match() {
    let (mut ws, doc, view) = open("blah Blah BLAH");
    let mut find = FindService::new(FindFlavor::Literal);
    find.set_find_string("blah").unwrap();
    find.set_replace_string("stuff");

    let mut session = ws.session(view).unwrap();
    for _ in 0..3 {
        find.do_find_next(&mut session, None, false).unwrap();
        assert!(find.do_replace(&mut session).unwrap());
    }
    drop(session);
    assert_eq!(ws.document(doc).unwrap().text(), "stuff Stuff STUFF");
}

#[test]
fn test_replace_all_is_one_undo_step() {
    let (mut ws, _, view) = open(TEXT);
    let mut session = ws.session(view).unwrap();
    let mut find = FindService::new(FindFlavor::Literal);
    find.set_find_string("blah").unwrap();
    find.set_replace_string("x");

    assert_eq!(find.replace_all(&mut session).unwrap(), 3);
    assert_eq!(session.get_line_text(4), "x x x");
    assert!(session.undo());
    assert_eq!(session.get_text(), TEXT);
}

#[test]
fn test_wildcard_replacement_uses_groups() {
    let (mut ws, _, view) = open("key=value; other=thing;");
    let mut session = ws.session(view).unwrap();
    let mut find = FindService::new(FindFlavor::Wildcard);
    find.set_find_string("*=*;").unwrap();
    find.set_replace_string("* -> *,");

    let outcome = find.do_find_next(&mut session, Some(0), false).unwrap();
    assert_eq!(outcome.match_start(), 0);
    assert!(find.do_replace(&mut session).unwrap());
    assert_eq!(session.get_text(), "key -> value, other=thing;");
}

#[test]
fn test_regex_replacement_with_groups_and_case() {
    let (mut ws, _, view) = open("first_name = 1\nlast_name = 2\n");
    let mut session = ws.session(view).unwrap();
    let mut find = FindService::new(FindFlavor::Regex);
    find.set_find_string(r"(\w+)_name = (\d)").unwrap();
    find.set_replace_string(r"\U\1\E[\2]");

    assert_eq!(find.replace_all(&mut session).unwrap(), 2);
    assert_eq!(session.get_text(), "FIRST[1]\nLAST[2]\n");
}

#[test]
fn test_whole_word() {
    let (mut ws, _, view) = open("cat concat cat");
    let mut session = ws.session(view).unwrap();
    let mut find = FindService::new(FindFlavor::Literal);
    find.settings_mut().whole_word = true;
    find.set_find_string("cat").unwrap();

    let hits: Vec<_> = (0..3)
        .map(|_| find.do_find_next(&mut session, None, false).unwrap().match_start())
        .collect();
    assert_eq!(hits, vec![0, 11, -1]);
}
