use scribe_core::{Document, ModificationEvent, ModificationFlags, ModificationKind};
use std::cell::RefCell;
use std::rc::Rc;

fn record(doc: &mut Document) -> Rc<RefCell<Vec<ModificationEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    doc.subscribe(Box::new(move |event: &ModificationEvent| {
        sink.borrow_mut().push(event.clone());
    }));
    events
}

#[test]
fn test_undo_redo_single_insert() {
    let mut doc = Document::new();
    doc.insert(0, "a").unwrap();
    assert_eq!(doc.text(), "a");
    assert!(doc.can_undo());
    assert!(!doc.can_redo());

    assert!(doc.undo());
    assert_eq!(doc.text(), "");
    assert!(!doc.can_undo());
    assert!(doc.can_redo());

    assert!(doc.redo());
    assert_eq!(doc.text(), "a");
    assert!(!doc.can_redo());
}

#[test]
fn test_group_is_undone_atomically() {
    let mut doc = Document::from_text("hello world");
    doc.begin_undo();
    doc.delete(0, 5).unwrap();
    doc.insert(0, "goodbye").unwrap();
    doc.insert(doc.length(), "!").unwrap();
    doc.end_undo();
    assert_eq!(doc.text(), "goodbye world!");
    assert_eq!(doc.undo_depth(), 1);

    assert!(doc.undo());
    assert_eq!(doc.text(), "hello world");
    assert_eq!(doc.redo_depth(), 1);
    assert!(doc.redo());
    assert_eq!(doc.text(), "goodbye world!");
}

#[test]
fn test_nested_groups_only_outermost_counts() {
    let mut doc = Document::new();
    doc.begin_undo();
    doc.insert(0, "a").unwrap();
    doc.begin_undo();
    doc.insert(1, "b").unwrap();
    doc.end_undo();
    doc.insert(2, "c").unwrap();
    doc.end_undo();
    assert_eq!(doc.undo_depth(), 1);
    assert!(doc.undo());
    assert_eq!(doc.text(), "");
}

#[test]
fn test_last_step_flag_marks_end_of_group() {
    let mut doc = Document::from_text("abc");
    let events = record(&mut doc);

    doc.begin_undo();
    doc.insert(0, "x").unwrap();
    doc.insert(0, "y").unwrap();
    assert!(events.borrow().is_empty(), "notifications are held until the group closes");
    doc.end_undo();

    let events = events.borrow();
    let changes: Vec<_> = events.iter().filter(|e| e.is_text_change()).collect();
    assert_eq!(changes.len(), 2);
    assert!(changes.iter().all(|e| e.flags.contains(ModificationFlags::MULTI_STEP)));
    assert!(!changes[0].is_last_step());
    assert!(changes[1].is_last_step());
    assert_eq!(events.iter().filter(|e| e.is_last_step()).count(), 1);
}

#[test]
fn test_undo_events_carry_undo_flag() {
    let mut doc = Document::from_text("abc");
    doc.delete(1, 1).unwrap();
    let events = record(&mut doc);
    assert!(doc.undo());

    let events = events.borrow();
    let insert = events
        .iter()
        .find(|e| e.kind == ModificationKind::Insert)
        .unwrap();
    assert_eq!(insert.position, 1);
    assert_eq!(insert.text.as_deref(), Some("b"));
    assert!(insert.flags.contains(ModificationFlags::UNDO));
    assert!(events.last().unwrap().is_last_step());
}

#[test]
fn test_styles_restored_by_undo() {
    let mut doc = Document::from_text("let x = 1;");
    doc.set_style_range(0, 3, 5).unwrap();
    doc.set_style_range(4, 1, 11).unwrap();
    let before = doc.get_styled_range(0, doc.length()).unwrap();

    doc.delete(0, 6).unwrap();
    doc.insert(0, "abc").unwrap();
    assert!(doc.undo());
    assert!(doc.undo());

    assert_eq!(doc.get_styled_range(0, doc.length()).unwrap(), before);
}

#[test]
fn test_new_edit_discards_redo() {
    let mut doc = Document::new();
    doc.insert(0, "one").unwrap();
    doc.undo();
    assert!(doc.can_redo());
    doc.insert(0, "two").unwrap();
    assert!(!doc.can_redo());
    assert!(!doc.redo());
}

#[test]
fn test_save_point_tracks_modification() {
    let mut doc = Document::from_text("text");
    assert!(!doc.is_modified());
    doc.insert(4, "!").unwrap();
    assert!(doc.is_modified());
    doc.set_save_point();
    assert!(!doc.is_modified());
    doc.undo();
    assert!(doc.is_modified());
    doc.redo();
    assert!(!doc.is_modified());
}

#[test]
fn test_empty_document_boundaries() {
    let mut doc = Document::new();
    doc.insert(0, "x").unwrap();
    doc.undo();
    assert!(doc.is_empty());

    let mut out = Vec::new();
    assert_eq!(doc.save_to(&mut out).unwrap(), 0);
    assert!(out.is_empty());
}

#[test]
fn test_random_edits_undo_to_original() {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    let original = "fn main() {\n    println!(\"hi\");\n}\n";
    let mut doc = Document::from_text(original);
    let mut rng = StdRng::seed_from_u64(7);
    let mut edits = 0;
    for _ in 0..50 {
        let len = doc.length();
        if len > 0 && rng.gen_bool(0.4) {
            let pos = rng.gen_range(0..len);
            let n = rng.gen_range(1..=(len - pos).min(4));
            doc.delete(pos, n).unwrap();
        } else {
            let pos = rng.gen_range(0..=len);
            doc.insert(pos, ["a", "\n", "é", "\r\n"][rng.gen_range(0..4)]).unwrap();
        }
        edits += 1;
    }
    let edited = doc.text();
    for _ in 0..edits {
        assert!(doc.undo());
    }
    assert_eq!(doc.text(), original);
    for _ in 0..edits {
        assert!(doc.redo());
    }
    assert_eq!(doc.text(), edited);
}
