use pretty_assertions::assert_eq;
use scribe_core::vfs::parse_url;
use scribe_core::{EolMode, TextEncoding, Workspace, WorkspaceError};

fn write_temp(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_load_save_load_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let cases: &[(&str, &[u8])] = &[
        ("lf.txt", b"one\ntwo\n"),
        ("crlf.txt", b"one\r\ntwo\r\n"),
        ("cr.txt", b"one\rtwo\r"),
        ("mixed.txt", b"a\r\nb\r\nc\n"),
        ("bom.txt", b"\xEF\xBB\xBFcaf\xC3\xA9\n"),
        ("latin1.py", b"# -*- coding: latin-1 -*-\nx = '\xE9'\n"),
    ];

    for (name, bytes) in cases {
        let path = write_temp(&dir, name, bytes);
        let mut ws = Workspace::new();
        let doc = ws.open_url(&path).unwrap();
        assert!(!ws.document(doc).unwrap().is_modified());
        ws.save(doc).unwrap();
        assert_eq!(&std::fs::read(&path).unwrap(), bytes, "{name}");
    }
}

#[test]
fn test_detected_encodings() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = Workspace::new();

    let bom = ws
        .open_url(&write_temp(&dir, "a.txt", b"\xEF\xBB\xBFhi"))
        .unwrap();
    assert_eq!(ws.document(bom).unwrap().encoding(), TextEncoding::Utf8Sig);
    assert_eq!(ws.document(bom).unwrap().text(), "hi");

    let latin = ws
        .open_url(&write_temp(&dir, "b.py", b"# coding: latin-1\nx = '\xE9'\n"))
        .unwrap();
    assert_eq!(ws.document(latin).unwrap().encoding(), TextEncoding::Latin1);
    assert!(ws.document(latin).unwrap().text().contains('\u{e9}'));

    let mut binary: Vec<u8> = [0x00, 0xFF, 0x01, 0x02].repeat(16);
    binary.extend_from_slice(b"tail");
    let bin = ws.open_url(&write_temp(&dir, "c.bin", &binary)).unwrap();
    assert!(ws.document(bin).unwrap().is_binary());
}

#[test]
fn test_save_after_edit_uses_document_line_endings() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "mixed.txt", b"a\r\nb\r\n");
    let mut ws = Workspace::new();
    let doc = ws.open_url(&path).unwrap();

    let document = ws.document_mut(doc).unwrap();
    assert_eq!(document.eol_mode(), EolMode::Crlf);
    let line = format!("c{}", document.eol_mode().as_str());
    document.insert(document.length(), &line).unwrap();
    assert!(document.is_modified());

    ws.save(doc).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"a\r\nb\r\nc\r\n");
    assert!(!ws.document(doc).unwrap().is_modified());
}

#[test]
fn test_opening_same_url_reuses_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "x.txt", b"x");
    let mut ws = Workspace::new();
    let first = ws.open_url(&path).unwrap();
    let second = ws.open_url(&path).unwrap();
    assert_eq!(first, second);
    assert_eq!(ws.len(), 1);
}

#[test]
fn test_unencodable_text_keeps_destination() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "l.py", b"# coding: latin-1\nx = 1\n");
    let mut ws = Workspace::new();
    let doc = ws.open_url(&path).unwrap();
    ws.document_mut(doc).unwrap().insert(0, "\u{263a}").unwrap();

    let err = ws.save(doc).unwrap_err();
    assert!(matches!(err, WorkspaceError::Document(_)));
    assert_eq!(std::fs::read(&path).unwrap(), b"# coding: latin-1\nx = 1\n");
}

#[test]
fn test_save_without_url_is_an_error() {
    let mut ws = Workspace::new();
    let doc = ws.open_text(None, "x");
    assert!(matches!(ws.save(doc), Err(WorkspaceError::NoUrl(_))));

    let url = parse_url("mem:saved.txt").unwrap();
    ws.save_as(doc, url.clone()).unwrap();
    assert_eq!(ws.document(doc).unwrap().url(), Some(&url));
}
