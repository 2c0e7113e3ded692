use pretty_assertions::assert_eq;
use scribe_core::{Document, EolMode};

#[test]
fn test_mixed_line_endings_detect_majority() {
    let doc = Document::from_text("a\r\nb\r\nc\n");
    assert_eq!(doc.eol_mode(), EolMode::Crlf);
    assert_eq!(doc.line_count(), 4);
    assert_eq!(doc.get_line_text(2), "c");
    assert_eq!(doc.get_line_text(3), "");
}

#[test]
fn test_convert_eols_is_one_undo_step_and_undo_restores_mode() {
    let mut doc = Document::from_text("a\r\nb\r\nc\n");

    assert!(doc.convert_eols(EolMode::Lf).unwrap());
    assert_eq!(doc.text(), "a\nb\nc\n");
    assert_eq!(doc.eol_mode(), EolMode::Lf);
    assert_eq!(doc.undo_depth(), 1);

    assert!(doc.undo());
    assert_eq!(doc.text(), "a\r\nb\r\nc\n");
    assert_eq!(doc.eol_mode(), EolMode::Crlf);

    assert!(doc.redo());
    assert_eq!(doc.text(), "a\nb\nc\n");
    assert_eq!(doc.eol_mode(), EolMode::Lf);
}

#[test]
fn test_convert_eols_is_idempotent() {
    let mut doc = Document::from_text("one\rtwo\r\nthree\n");
    assert!(doc.convert_eols(EolMode::Crlf).unwrap());
    let converted = doc.text();
    let depth = doc.undo_depth();

    assert!(!doc.convert_eols(EolMode::Crlf).unwrap());
    assert_eq!(doc.text(), converted);
    assert_eq!(doc.undo_depth(), depth);
}

#[test]
fn test_cr_only_file_round_trips() {
    let doc = Document::from_text("a\rb\rc");
    assert_eq!(doc.eol_mode(), EolMode::Cr);
    assert_eq!(doc.line_count(), 3);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    assert_eq!(out, b"a\rb\rc");
}

#[test]
fn test_line_of_line_start_is_stable() {
    let doc = Document::from_text("x\r\n\ryy\n\r\nz");
    for pos in 0..=doc.length() {
        let line = doc.line_from_position(pos);
        assert_eq!(
            doc.line_from_position(doc.position_from_line(line)),
            line,
            "pos {pos}"
        );
    }
}

#[test]
fn test_text_without_line_endings_uses_platform_default() {
    let doc = Document::from_text("no newline here");
    assert_eq!(doc.eol_mode(), EolMode::platform_default());
    assert_eq!(doc.line_count(), 1);
}
