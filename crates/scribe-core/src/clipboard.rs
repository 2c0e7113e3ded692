//! Process-wide clipboard service.
//!
//! Two clipboards are distinguished: the normal clipboard (explicit copy/cut/paste) and the
//! selection clipboard (updated on mouse selection, pasted with the middle button). Platform
//! integration goes through [`ClipboardBackend`]; when the backend has no primary selection the
//! selection clipboard is kept in-process.

/// Which clipboard to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipboardKind {
    /// The normal clipboard.
    Normal,
    /// The primary selection.
    Selection,
}

/// Platform clipboard access.
pub trait ClipboardBackend {
    /// Returns `true` if the platform has a primary selection.
    fn supports_selection(&self) -> bool;
    /// Read a clipboard.
    fn get_text(&mut self, kind: ClipboardKind) -> Option<String>;
    /// Write a clipboard.
    fn set_text(&mut self, kind: ClipboardKind, text: String);
}

/// In-process backend holding both clipboards in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    normal: Option<String>,
    selection: Option<String>,
}

impl ClipboardBackend for MemoryClipboard {
    fn supports_selection(&self) -> bool {
        true
    }

    fn get_text(&mut self, kind: ClipboardKind) -> Option<String> {
        match kind {
            ClipboardKind::Normal => self.normal.clone(),
            ClipboardKind::Selection => self.selection.clone(),
        }
    }

    fn set_text(&mut self, kind: ClipboardKind, text: String) {
        match kind {
            ClipboardKind::Normal => self.normal = Some(text),
            ClipboardKind::Selection => self.selection = Some(text),
        }
    }
}

/// The clipboard service handed to editing sessions.
pub struct Clipboard {
    backend: Box<dyn ClipboardBackend>,
    emulated_selection: Option<String>,
}

impl std::fmt::Debug for Clipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clipboard")
            .field("emulated_selection", &self.emulated_selection.is_some())
            .finish()
    }
}

impl Default for Clipboard {
    fn default() -> Self {
        Self::new(Box::new(MemoryClipboard::default()))
    }
}

impl Clipboard {
    /// Wrap a platform backend.
    pub fn new(backend: Box<dyn ClipboardBackend>) -> Self {
        Self {
            backend,
            emulated_selection: None,
        }
    }

    /// Read a clipboard.
    pub fn get_text(&mut self, kind: ClipboardKind) -> Option<String> {
        if kind == ClipboardKind::Selection && !self.backend.supports_selection() {
            return self.emulated_selection.clone();
        }
        self.backend.get_text(kind)
    }

    /// Write a clipboard.
    pub fn set_text(&mut self, kind: ClipboardKind, text: String) {
        if kind == ClipboardKind::Selection && !self.backend.supports_selection() {
            self.emulated_selection = Some(text);
            return;
        }
        self.backend.set_text(kind, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSelection(Option<String>);

    impl ClipboardBackend for NoSelection {
        fn supports_selection(&self) -> bool {
            false
        }
        fn get_text(&mut self, _kind: ClipboardKind) -> Option<String> {
            self.0.clone()
        }
        fn set_text(&mut self, _kind: ClipboardKind, text: String) {
            self.0 = Some(text);
        }
    }

    #[test]
    fn test_selection_is_emulated_without_platform_support() {
        let mut clipboard = Clipboard::new(Box::new(NoSelection(None)));
        clipboard.set_text(ClipboardKind::Selection, "sel".to_string());
        clipboard.set_text(ClipboardKind::Normal, "norm".to_string());
        assert_eq!(clipboard.get_text(ClipboardKind::Selection).as_deref(), Some("sel"));
        assert_eq!(clipboard.get_text(ClipboardKind::Normal).as_deref(), Some("norm"));
    }
}
