use pretty_assertions::assert_eq;
use scribe_core::{
    Clipboard, ClipboardKind, EolMode, ModificationEvent, StyledTextCtrl, ViewService, ViewSettings,
    Workspace,
};
use std::any::Any;

#[derive(Default)]
struct Counter {
    text_changes: usize,
    last_steps: usize,
}

impl ViewService for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    fn on_event(&mut self, event: &ModificationEvent) {
        if event.is_text_change() {
            self.text_changes += 1;
        }
        if event.is_last_step() {
            self.last_steps += 1;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn test_edit_in_one_view_reaches_all_views() {
    let mut ws = Workspace::new();
    let doc = ws.open_text(None, "alpha\nbeta\n");
    let v1 = ws.attach_view(doc, ViewSettings::default()).unwrap();
    let v2 = ws.attach_view(doc, ViewSettings::default()).unwrap();
    ws.view_mut(v1).unwrap().add_service(Box::new(Counter::default()));
    ws.view_mut(v2).unwrap().add_service(Box::new(Counter::default()));

    {
        let mut session = ws.session(v2).unwrap();
        session.goto_position(6);
    }
    {
        let mut session = ws.session(v1).unwrap();
        session.insert_text(0, "zero\n").unwrap();
    }

    for view in [v1, v2] {
        let counter = ws.view(view).unwrap().service::<Counter>().unwrap();
        assert_eq!(counter.text_changes, 1);
        assert_eq!(counter.last_steps, 1);
    }

    let session = ws.session(v2).unwrap();
    assert_eq!(session.current_position(), 11);
    assert_eq!(session.get_line_text(session.get_current_line()), "beta");
}

#[test]
fn test_caret_inside_deleted_range_collapses() {
    let mut ws = Workspace::new();
    let doc = ws.open_text(None, "0123456789");
    let v1 = ws.attach_view(doc, ViewSettings::default()).unwrap();
    let v2 = ws.attach_view(doc, ViewSettings::default()).unwrap();
    ws.session(v2).unwrap().set_selection(8, 4);

    ws.session(v1).unwrap().delete_range(2, 4).unwrap();

    let session = ws.session(v2).unwrap();
    assert_eq!(session.get_anchor(), 4);
    assert_eq!(session.current_position(), 2);
}

#[test]
fn test_views_keep_independent_settings() {
    let mut ws = Workspace::new();
    let doc = ws.open_text(None, "\tx\n");
    let narrow = ViewSettings {
        tab_width: 4,
        ..ViewSettings::default()
    };
    let v1 = ws.attach_view(doc, narrow).unwrap();
    let v2 = ws.attach_view(doc, ViewSettings::default()).unwrap();

    assert_eq!(ws.session(v1).unwrap().line_indentation(0), 4);
    assert_eq!(ws.session(v2).unwrap().line_indentation(0), 8);
}

#[test]
fn test_grouped_session_edits_notify_once() {
    let mut ws = Workspace::new();
    let doc = ws.open_text(None, "a b c");
    let view = ws.attach_view(doc, ViewSettings::default()).unwrap();
    ws.view_mut(view).unwrap().add_service(Box::new(Counter::default()));

    {
        let mut session = ws.session(view).unwrap();
        session.begin_undo_action();
        session.set_target_range(0, 1);
        session.replace_target("A").unwrap();
        session.set_target_range(4, 5);
        session.replace_target("C").unwrap();
        session.end_undo_action();
        assert_eq!(session.get_text(), "A b C");
    }

    let counter = ws.view(view).unwrap().service::<Counter>().unwrap();
    assert_eq!(counter.text_changes, 4);
    assert_eq!(counter.last_steps, 1);
}

#[test]
fn test_with_service_lends_session() {
    let mut ws = Workspace::new();
    let doc = ws.open_text(None, "x");
    let view = ws.attach_view(doc, ViewSettings::default()).unwrap();
    ws.view_mut(view).unwrap().add_service(Box::new(Counter::default()));

    let mut session = ws.session(view).unwrap();
    let seen = session
        .with_service::<Counter, _>(|counter, session| {
            session.add_text("y").unwrap();
            counter.text_changes
        })
        .unwrap();
    // The lent service is detached while it runs.
    assert_eq!(seen, 0);
    assert_eq!(session.get_text(), "yx");
    assert!(session.view().unwrap().service::<Counter>().is_some());
}

#[test]
fn test_paste_converts_line_endings() {
    let mut ws = Workspace::new();
    let doc = ws.open_text(None, "a\r\nb\r\n");
    let view = ws.attach_view(doc, ViewSettings::default()).unwrap();
    let mut clipboard = Clipboard::default();
    clipboard.set_text(ClipboardKind::Normal, "x\ny\n".to_string());

    let mut session = ws.session(view).unwrap();
    assert_eq!(session.get_eol_mode(), EolMode::Crlf);
    session.goto_position(3);
    assert!(session.paste(&mut clipboard, ClipboardKind::Normal).unwrap());
    assert_eq!(session.get_text(), "a\r\nx\r\ny\r\nb\r\n");

    session.set_selection(3, 4);
    assert!(session.cut(&mut clipboard).unwrap());
    assert_eq!(clipboard.get_text(ClipboardKind::Normal).as_deref(), Some("x"));
    assert_eq!(session.get_text(), "a\r\n\r\ny\r\nb\r\n");
}

#[test]
fn test_set_line_indentation_keeps_caret_with_text() {
    let mut ws = Workspace::new();
    let doc = ws.open_text(None, "  foo(bar)\n");
    let view = ws.attach_view(doc, ViewSettings::default()).unwrap();
    let mut session = ws.session(view).unwrap();
    session.goto_position(6);

    session.set_line_indentation(0, 8).unwrap();
    assert_eq!(session.get_line_text(0), "        foo(bar)");
    assert_eq!(session.current_position(), 12);
    assert!(session.undo());
    assert_eq!(session.get_line_text(0), "  foo(bar)");
}

#[test]
fn test_selection_ending_at_column_zero_excludes_line() {
    let mut ws = Workspace::new();
    let doc = ws.open_text(None, "one\ntwo\nthree\n");
    let view = ws.attach_view(doc, ViewSettings::default()).unwrap();
    let mut session = ws.session(view).unwrap();
    session.set_selection(0, 8);
    assert_eq!(session.get_line_region(), (0, 1));
    assert_eq!(session.get_selection2(), (0, 7));
}
