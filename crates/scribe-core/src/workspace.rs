//! Workspace: open documents and the views onto them.
//!
//! A document lives as long as something references it: each attached view counts, and so
//! does each explicit [`Workspace::pin`]. Detaching the last view of an unpinned document
//! destroys it (cancelling a background load still in flight).
//!
//! All editing goes through an [`EditSession`] obtained from [`Workspace::session`], which
//! propagates document notifications to the services of every view of that document.

use crate::document::{Document, DocumentError};
use crate::encoding::decode_auto;
use crate::line_ending::EolMode;
use crate::loader::{LoadHandle, LoadMessage, Loader};
use crate::view::{EditSession, ViewId, ViewSettings, ViewState};
use crate::vfs::{Vfs, VfsError, VfsRegistry, parse_url};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use std::time::SystemTime;
use url::Url;

/// Opaque identifier for an open document in a [`Workspace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Get the underlying numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Workspace-level errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// A document id was not found.
    #[error("document not found: {0:?}")]
    DocumentNotFound(DocumentId),
    /// A view id was not found.
    #[error("view not found: {0:?}")]
    ViewNotFound(ViewId),
    /// The document has no URL to save to.
    #[error("document {0:?} has no URL")]
    NoUrl(DocumentId),
    /// A document operation failed.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// Resource access failed.
    #[error(transparent)]
    Vfs(#[from] VfsError),
}

/// Progress of a background load, as reported by [`Workspace::poll_loads`].
#[derive(Debug)]
pub enum LoadStatus {
    /// Percentage read so far.
    Progress(u8),
    /// The text was installed in the document.
    Finished,
    /// Reading failed; the document stays empty.
    Failed(VfsError),
}

struct DocumentEntry {
    doc: Document,
    pins: usize,
    loading: Option<LoadHandle>,
}

/// A collection of open documents and their views.
pub struct Workspace {
    next_document_id: u64,
    documents: BTreeMap<DocumentId, DocumentEntry>,

    next_view_id: u64,
    views: BTreeMap<ViewId, ViewState>,
    active_view: Option<ViewId>,

    vfs: Arc<dyn Vfs>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("document_count", &self.documents.len())
            .field("view_count", &self.views.len())
            .field("active_view", &self.active_view)
            .finish()
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// Create an empty workspace using the built-in [`VfsRegistry`].
    pub fn new() -> Self {
        Self::with_vfs(Arc::new(VfsRegistry::new()))
    }

    /// Create an empty workspace reading and writing through `vfs`.
    pub fn with_vfs(vfs: Arc<dyn Vfs>) -> Self {
        Self {
            next_document_id: 0,
            documents: BTreeMap::new(),
            next_view_id: 0,
            views: BTreeMap::new(),
            active_view: None,
            vfs,
        }
    }

    /// The resource layer.
    pub fn vfs(&self) -> &Arc<dyn Vfs> {
        &self.vfs
    }

    /// Returns the number of open documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if there are no open documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns the number of open views.
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Ids of all open documents.
    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.documents.keys().copied().collect()
    }

    /// Return the active view id (if any).
    pub fn active_view_id(&self) -> Option<ViewId> {
        self.active_view
    }

    /// Set the active view.
    pub fn set_active_view(&mut self, id: ViewId) -> Result<(), WorkspaceError> {
        if !self.views.contains_key(&id) {
            return Err(WorkspaceError::ViewNotFound(id));
        }
        self.active_view = Some(id);
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Documents

    /// Add a document and return its id. It has no views and no pins yet.
    pub fn add_document(&mut self, doc: Document) -> DocumentId {
        let id = DocumentId(self.next_document_id);
        self.next_document_id = self.next_document_id.saturating_add(1);
        tracing::debug!(document = id.get(), url = ?doc.url().map(Url::as_str), "document added");
        self.documents.insert(
            id,
            DocumentEntry {
                doc,
                pins: 0,
                loading: None,
            },
        );
        id
    }

    /// Create a document holding `text`.
    pub fn open_text(&mut self, url: Option<Url>, text: &str) -> DocumentId {
        let mut doc = Document::from_text(text);
        doc.set_url(url);
        self.add_document(doc)
    }

    /// Create a read-only document whose text is a diagnostic message.
    pub fn open_error_buffer(&mut self, message: &str) -> DocumentId {
        tracing::warn!(%message, "opening error buffer");
        let mut doc = Document::from_text(message);
        doc.set_read_only(true);
        doc.set_permanent(false);
        self.add_document(doc)
    }

    /// Borrow a document.
    pub fn document(&self, id: DocumentId) -> Result<&Document, WorkspaceError> {
        self.documents
            .get(&id)
            .map(|e| &e.doc)
            .ok_or(WorkspaceError::DocumentNotFound(id))
    }

    /// Mutably borrow a document.
    ///
    /// Notifications raised through this borrow reach view services on the next
    /// [`EditSession::sync`].
    pub fn document_mut(&mut self, id: DocumentId) -> Result<&mut Document, WorkspaceError> {
        self.documents
            .get_mut(&id)
            .map(|e| &mut e.doc)
            .ok_or(WorkspaceError::DocumentNotFound(id))
    }

    /// Find an open document by URL.
    pub fn find_document(&self, url: &Url) -> Option<DocumentId> {
        self.documents
            .iter()
            .find(|(_, e)| e.doc.url() == Some(url))
            .map(|(id, _)| *id)
    }

    /// Keep a document alive independently of its views.
    pub fn pin(&mut self, id: DocumentId) -> Result<(), WorkspaceError> {
        let entry = self
            .documents
            .get_mut(&id)
            .ok_or(WorkspaceError::DocumentNotFound(id))?;
        entry.pins += 1;
        Ok(())
    }

    /// Release a pin. Returns `true` if the document was destroyed.
    pub fn unpin(&mut self, id: DocumentId) -> Result<bool, WorkspaceError> {
        let entry = self
            .documents
            .get_mut(&id)
            .ok_or(WorkspaceError::DocumentNotFound(id))?;
        entry.pins = entry.pins.saturating_sub(1);
        Ok(self.destroy_if_unreferenced(id))
    }

    fn destroy_if_unreferenced(&mut self, id: DocumentId) -> bool {
        let Some(entry) = self.documents.get(&id) else {
            return false;
        };
        if entry.pins > 0 || !entry.doc.view_ids().is_empty() {
            return false;
        }
        if let Some(entry) = self.documents.remove(&id)
            && let Some(load) = entry.loading
        {
            load.cancel();
        }
        tracing::debug!(document = id.get(), "document destroyed");
        true
    }

    // ---------------------------------------------------------------------------------------
    // Views

    /// Attach a new view to a document.
    pub fn attach_view(
        &mut self,
        document: DocumentId,
        settings: ViewSettings,
    ) -> Result<ViewId, WorkspaceError> {
        let entry = self
            .documents
            .get_mut(&document)
            .ok_or(WorkspaceError::DocumentNotFound(document))?;

        let view_id = ViewId(self.next_view_id);
        self.next_view_id = self.next_view_id.saturating_add(1);

        entry.doc.attach_view(view_id);
        self.views
            .insert(view_id, ViewState::new(view_id, document, settings));
        if self.active_view.is_none() {
            self.active_view = Some(view_id);
        }
        Ok(view_id)
    }

    /// Detach a view. Returns `true` if its document was destroyed as a result.
    pub fn detach_view(&mut self, id: ViewId) -> Result<bool, WorkspaceError> {
        let Some(view) = self.views.remove(&id) else {
            return Err(WorkspaceError::ViewNotFound(id));
        };
        if self.active_view == Some(id) {
            self.active_view = self.views.keys().next().copied();
        }

        let document = view.document_id();
        let Some(entry) = self.documents.get_mut(&document) else {
            return Ok(false);
        };
        entry.doc.detach_view(id);
        Ok(self.destroy_if_unreferenced(document))
    }

    /// Borrow a view.
    pub fn view(&self, id: ViewId) -> Result<&ViewState, WorkspaceError> {
        self.views.get(&id).ok_or(WorkspaceError::ViewNotFound(id))
    }

    /// Mutably borrow a view.
    pub fn view_mut(&mut self, id: ViewId) -> Result<&mut ViewState, WorkspaceError> {
        self.views
            .get_mut(&id)
            .ok_or(WorkspaceError::ViewNotFound(id))
    }

    /// Views of a document, in creation order.
    pub fn views_of(&self, document: DocumentId) -> Vec<ViewId> {
        self.views
            .iter()
            .filter(|(_, v)| v.document_id() == document)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Open an editing session through `view`.
    pub fn session(&mut self, view: ViewId) -> Result<EditSession<'_>, WorkspaceError> {
        let document = self
            .views
            .get(&view)
            .ok_or(WorkspaceError::ViewNotFound(view))?
            .document_id();
        let entry = self
            .documents
            .get_mut(&document)
            .ok_or(WorkspaceError::DocumentNotFound(document))?;
        let mut session = EditSession {
            doc: &mut entry.doc,
            views: &mut self.views,
            view,
        };
        session.sync();
        Ok(session)
    }

    // ---------------------------------------------------------------------------------------
    // Loading and saving

    /// Read `url` synchronously into a new document, or return the one already open.
    pub fn open_url(&mut self, url: &str) -> Result<DocumentId, WorkspaceError> {
        let url = parse_url(url)?;
        if let Some(id) = self.find_document(&url) {
            return Ok(id);
        }
        let mut bytes = Vec::new();
        self.vfs.open_read(&url)?.read_to_end(&mut bytes).map_err(VfsError::from)?;

        let mut doc = Document::new();
        doc.set_url(Some(url));
        install_bytes(&mut doc, &bytes);
        self.stamp(&mut doc);
        Ok(self.add_document(doc))
    }

    /// Like [`Workspace::open_url`], but failures produce an error buffer.
    pub fn open_url_or_error(&mut self, url: &str) -> DocumentId {
        match self.open_url(url) {
            Ok(id) => id,
            Err(err) => self.open_error_buffer(&format!("Failed opening {url}: {err}")),
        }
    }

    /// Create an empty document for `url`, attach a view and read the resource in the
    /// background. Poll with [`Workspace::poll_loads`].
    pub fn open_url_async(
        &mut self,
        url: &str,
        settings: ViewSettings,
        chunk_hint: Option<usize>,
    ) -> Result<(DocumentId, ViewId), WorkspaceError> {
        let url = parse_url(url)?;
        if !self.vfs.exists(&url) {
            // Surface unknown schemes before spawning anything.
            self.vfs.metadata(&url)?;
        }
        let mut doc = Document::new();
        doc.set_url(Some(url.clone()));
        let document = self.add_document(doc);
        let view = self.attach_view(document, settings)?;

        let handle = Loader::spawn(Arc::clone(&self.vfs), url, chunk_hint);
        if let Some(entry) = self.documents.get_mut(&document) {
            entry.loading = Some(handle);
        }
        Ok((document, view))
    }

    /// Returns `true` while a background load for the document is running.
    pub fn is_loading(&self, document: DocumentId) -> bool {
        self.documents
            .get(&document)
            .is_some_and(|e| e.loading.is_some())
    }

    /// Drain loader messages, installing finished loads. Returns what happened per document.
    pub fn poll_loads(&mut self) -> Vec<(DocumentId, LoadStatus)> {
        let mut finished = Vec::new();
        let mut statuses = Vec::new();
        for (id, entry) in &self.documents {
            let Some(handle) = entry.loading.as_ref() else {
                continue;
            };
            while let Ok(message) = handle.progress().try_recv() {
                match message {
                    LoadMessage::Progress { percent, .. } => {
                        statuses.push((*id, LoadStatus::Progress(percent)));
                    }
                    other => finished.push((*id, other)),
                }
            }
        }
        for (id, message) in finished {
            if let Some(entry) = self.documents.get_mut(&id) {
                entry.loading = None;
            }
            match self.finish_load(id, message) {
                Ok(true) => statuses.push((id, LoadStatus::Finished)),
                Ok(false) => {}
                Err(WorkspaceError::Vfs(err)) => statuses.push((id, LoadStatus::Failed(err))),
                Err(err) => tracing::warn!(document = id.get(), error = %err, "finishing load"),
            }
        }
        statuses
    }

    /// Install the result of a background load. Returns `true` if text was installed.
    ///
    /// Encoding and line endings are detected, the text replaces the document content without
    /// an undo record and the document is left unmodified.
    pub fn finish_load(
        &mut self,
        document: DocumentId,
        message: LoadMessage,
    ) -> Result<bool, WorkspaceError> {
        match message {
            LoadMessage::Finished { bytes, .. } => {
                let vfs = Arc::clone(&self.vfs);
                let entry = self
                    .documents
                    .get_mut(&document)
                    .ok_or(WorkspaceError::DocumentNotFound(document))?;
                entry.loading = None;
                install_bytes(&mut entry.doc, &bytes);
                if let Some(url) = entry.doc.url().cloned() {
                    let modified = vfs.metadata(&url).ok().and_then(|m| m.modified);
                    entry.doc.set_saved_timestamp(modified);
                }
                // Opening a session forwards the reset notifications to every view.
                if let Some(view) = self.views_of(document).first().copied() {
                    self.session(view)?;
                }
                Ok(true)
            }
            LoadMessage::Failed { error, .. } => Err(error.into()),
            LoadMessage::Cancelled { .. } | LoadMessage::Progress { .. } => Ok(false),
        }
    }

    /// Write a document to its URL, leaving it unmodified. Returns the number of bytes written.
    pub fn save(&mut self, document: DocumentId) -> Result<usize, WorkspaceError> {
        let url = self
            .document(document)?
            .url()
            .cloned()
            .ok_or(WorkspaceError::NoUrl(document))?;
        self.save_as(document, url)
    }

    /// Write a document to `url` and make that its URL.
    pub fn save_as(&mut self, document: DocumentId, url: Url) -> Result<usize, WorkspaceError> {
        let vfs = Arc::clone(&self.vfs);
        let doc = self.document_mut(document)?;
        let mut bytes = Vec::new();
        let written = doc.save_to(&mut bytes)?;
        vfs.write_all(&url, &bytes)?;
        doc.set_url(Some(url.clone()));
        doc.set_save_point();
        let stamp = vfs
            .metadata(&url)
            .ok()
            .and_then(|m| m.modified)
            .or_else(|| Some(SystemTime::now()));
        doc.set_saved_timestamp(stamp);
        tracing::info!(%url, bytes = written, "document saved");
        Ok(written)
    }

    fn stamp(&self, doc: &mut Document) {
        if let Some(url) = doc.url() {
            let modified = self.vfs.metadata(url).ok().and_then(|m| m.modified);
            doc.set_saved_timestamp(modified);
        }
    }
}

fn install_bytes(doc: &mut Document, bytes: &[u8]) {
    let decoded = decode_auto(bytes, None);
    if let Some(err) = &decoded.decode_error {
        tracing::warn!(error = %err, encoding = %decoded.encoding, "falling back while decoding");
    }
    doc.set_encoding(decoded.encoding);
    let eol = if decoded.is_binary() {
        EolMode::platform_default()
    } else {
        EolMode::detect(&decoded.text)
    };
    doc.reset_text(&decoded.text);
    doc.set_eol_mode(eol);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_view_destroys_unpinned_document() {
        let mut ws = Workspace::new();
        let doc = ws.open_text(None, "hello");
        let v1 = ws.attach_view(doc, ViewSettings::default()).unwrap();
        let v2 = ws.attach_view(doc, ViewSettings::default()).unwrap();
        assert!(!ws.detach_view(v1).unwrap());
        assert!(ws.detach_view(v2).unwrap());
        assert!(ws.document(doc).is_err());
    }

    #[test]
    fn test_pinned_document_survives_views() {
        let mut ws = Workspace::new();
        let doc = ws.open_text(None, "hello");
        ws.pin(doc).unwrap();
        let v = ws.attach_view(doc, ViewSettings::default()).unwrap();
        assert!(!ws.detach_view(v).unwrap());
        assert_eq!(ws.document(doc).unwrap().text(), "hello");
        assert!(ws.unpin(doc).unwrap());
        assert!(ws.is_empty());
    }

    #[test]
    fn test_unknown_scheme_opens_error_buffer() {
        let mut ws = Workspace::new();
        let doc = ws.open_url_or_error("gopher://example.org/file");
        let doc = ws.document(doc).unwrap();
        assert!(doc.is_read_only());
        assert!(doc.text().contains("unknown URL scheme"));
    }
}
