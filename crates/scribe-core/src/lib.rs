#![warn(missing_docs)]
//! Scribe Core - document buffer and view kernel of a programmable text editor
//!
//! # Overview
//!
//! `scribe-core` owns the state a text editor's language services operate on: styled text with
//! undo, views onto that text, fold outlines and find/replace. It draws nothing; a host renders
//! views and feeds edits back in.
//!
//! # Core Features
//!
//! - **Styled document**: rope text with one style byte per character, fold levels and markers
//!   per line, grouped undo/redo and encoding / line-ending awareness
//! - **Views**: several views per document, each with its own caret, selection and settings;
//!   every edit is forwarded to the services of all views
//! - **Styling interface**: lexers style ranges on demand through [`Styler`]
//! - **Fold explorer**: hierarchy of fold headers rebuilt lazily from fold levels
//! - **Find/replace**: literal, wildcard and regex search with smart casing
//! - **Resources**: URL based VFS and a background loader
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Workspace (documents, views, load/save)    │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  EditSession / StyledTextCtrl               │  ← Service contract
//! ├─────────────────────────────────────────────┤
//! │  Search, Folds, Styling                     │  ← Language services
//! ├─────────────────────────────────────────────┤
//! │  Document (undo, events, markers)           │  ← Text model
//! ├─────────────────────────────────────────────┤
//! │  Rope + encodings + line endings            │  ← Storage
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use scribe_core::{StyledTextCtrl, ViewSettings, Workspace};
//!
//! let mut workspace = Workspace::new();
//! let doc = workspace.open_text(None, "hello\nworld\n");
//! let view = workspace.attach_view(doc, ViewSettings::default()).unwrap();
//!
//! let mut session = workspace.session(view).unwrap();
//! session.goto_position(5);
//! session.add_text(", there").unwrap();
//! assert_eq!(session.get_line_text(0), "hello, there");
//! assert!(session.undo());
//! assert_eq!(session.get_text(), "hello\nworld\n");
//! ```
//!
//! # Module Description
//!
//! - [`document`] - styled text, undo groups, notifications, markers
//! - [`view`] - view state, services and editing sessions
//! - [`stc`] - the styled text control contract used by language services
//! - [`styling`] - lexer and style table interfaces
//! - [`fold`] - fold levels and the fold explorer hierarchy
//! - [`search`] - find and replace
//! - [`workspace`] - document lifetimes, loading and saving
//! - [`vfs`] / [`loader`] - resource access and background reads

pub mod clipboard;
pub mod document;
pub mod encoding;
pub mod event;
pub mod fold;
pub mod line_ending;
pub mod loader;
pub mod search;
pub mod stc;
pub mod styling;
mod undo;
pub mod vfs;
pub mod view;
pub mod workspace;

pub use clipboard::{Clipboard, ClipboardBackend, ClipboardKind, MemoryClipboard};
pub use document::{
    DEFAULT_MAX_UNDO, Document, DocumentError, MARKER_MAX, MarkerSymbol, SharedInfo, ViewCursor,
};
pub use encoding::{DecodedText, EncodingError, EncodingSource, TextEncoding, decode_auto};
pub use event::{
    ModificationEvent, ModificationFlags, ModificationKind, ModificationListener, SubscriberId,
};
pub use fold::{
    FOLD_LEVEL_BASE, FOLD_LEVEL_HEADER_FLAG, FOLD_LEVEL_NUMBER_MASK, FOLD_LEVEL_WHITE_FLAG,
    FoldEngine, FoldEntryNamer, FoldNode, build_fold_hierarchy, copy_expansion, fold_level_number,
    is_fold_header,
};
pub use line_ending::{EolCounts, EolMode};
pub use loader::{LoadHandle, LoadMessage, Loader};
pub use search::{
    FindFlavor, FindOutcome, FindService, FindSettings, SearchError, SearchMatch, SearchOptions,
};
pub use stc::StyledTextCtrl;
pub use styling::{
    LEXER_CONTAINER, LEXER_NULL, Lexer, LexerFactory, LexerRegistry, NullLexer, StyleCategory,
    StyleTable, Styler,
};
pub use vfs::{FileVfs, MemVfs, Vfs, VfsError, VfsMetadata, VfsRegistry};
pub use view::{EditSession, ViewId, ViewService, ViewSettings, ViewState};
pub use workspace::{DocumentId, LoadStatus, Workspace, WorkspaceError};
