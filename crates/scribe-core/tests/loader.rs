use pretty_assertions::assert_eq;
use scribe_core::vfs::parse_url;
use scribe_core::{
    EolMode, LoadMessage, LoadStatus, Loader, TextEncoding, Vfs, VfsRegistry, ViewSettings,
    Workspace,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn wait_for_load(ws: &mut Workspace, doc: scribe_core::DocumentId) -> Vec<LoadStatus> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut statuses = Vec::new();
    while ws.is_loading(doc) && Instant::now() < deadline {
        statuses.extend(ws.poll_loads().into_iter().map(|(_, s)| s));
        std::thread::sleep(Duration::from_millis(5));
    }
    statuses
}

#[test]
fn test_loader_reports_progress_and_bytes() {
    let vfs = Arc::new(VfsRegistry::new());
    let data = "x".repeat(200_000);
    vfs.mem().insert("big.txt", data.as_bytes(), None);
    let url = parse_url("mem:big.txt").unwrap();

    let handle = Loader::spawn(vfs, url, None);
    let mut percents = Vec::new();
    let finished = loop {
        let message = handle.progress().recv().unwrap();
        match message {
            LoadMessage::Progress { percent, .. } => percents.push(percent),
            other => break other,
        }
    };

    assert_eq!(percents.len(), 4);
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    let LoadMessage::Finished { bytes, .. } = finished else {
        panic!("expected a finished load");
    };
    assert_eq!(bytes.len(), 200_000);
}

#[test]
fn test_cancelled_load_discards_data() {
    let vfs = Arc::new(VfsRegistry::new());
    vfs.mem().insert("file.txt", b"abc".to_vec(), None);
    let handle = Loader::spawn(vfs, parse_url("mem:file.txt").unwrap(), None);
    handle.cancel();
    assert!(handle.is_cancelled());
    // The worker may already be done; either way no partial document is produced.
    match handle.wait() {
        LoadMessage::Cancelled { .. } | LoadMessage::Finished { .. } => {}
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_workspace_background_open_installs_text() {
    let vfs = Arc::new(VfsRegistry::new());
    vfs.mem()
        .insert("notes.txt", b"one\r\ntwo\r\nthree".to_vec(), None);
    let mut ws = Workspace::with_vfs(vfs);

    let (doc, _view) = ws
        .open_url_async("mem:notes.txt", ViewSettings::default(), None)
        .unwrap();
    let statuses = wait_for_load(&mut ws, doc);
    assert!(statuses.iter().any(|s| matches!(s, LoadStatus::Finished)));

    let doc = ws.document(doc).unwrap();
    assert_eq!(doc.text(), "one\r\ntwo\r\nthree");
    assert_eq!(doc.eol_mode(), EolMode::Crlf);
    assert_eq!(doc.encoding(), TextEncoding::Utf8);
    assert!(!doc.is_modified());
    assert!(!doc.can_undo());
}

#[test]
fn test_closing_view_cancels_load_and_destroys_document() {
    let vfs = Arc::new(VfsRegistry::new());
    vfs.mem().insert("a.txt", vec![b'a'; 1 << 20], None);
    let mut ws = Workspace::with_vfs(vfs);
    let (doc, view) = ws
        .open_url_async("mem:a.txt", ViewSettings::default(), None)
        .unwrap();

    assert!(ws.detach_view(view).unwrap());
    assert!(ws.document(doc).is_err());
    assert!(ws.poll_loads().is_empty());
}

#[test]
fn test_unknown_scheme_fails_before_spawning() {
    let mut ws = Workspace::new();
    let err = ws
        .open_url_async("ftp://example.org/x", ViewSettings::default(), None)
        .unwrap_err();
    assert!(err.to_string().contains("unknown URL scheme"));
    assert!(ws.is_empty());
}

#[test]
fn test_about_pages_exist() {
    let vfs = VfsRegistry::new();
    for page in ["about:blank", "about:scratch"] {
        assert!(vfs.exists(&parse_url(page).unwrap()));
    }
}
