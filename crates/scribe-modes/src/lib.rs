#![warn(missing_docs)]
//! `scribe-modes` - the language-aware layer of the scribe editor core.
//!
//! # Overview
//!
//! `scribe-core` provides documents, views and editing sessions; this crate decides how a view
//! behaves:
//!
//! - [`major`] / [`matcher`]: major modes and the rules that choose one for a resource
//! - [`modeline`]: emacs, vim and kate modelines that override view settings
//! - [`prefs`]: per-class preferences walked along the mode hierarchy
//! - [`autoindent`]: indentation strategies (basic, regex, C-style, Python, Fortran 77, make)
//! - [`paragraph`] / [`comment`]: paragraph fill and comment region
//! - [`minor`]: minor modes (fold explorer, output log, word completion)
//! - [`actions`] / [`editor`]: named actions and the key dispatch loop tying it together
//! - [`session`] / [`startup`]: saved sessions and host command line options
//!
//! # Example
//!
//! ```rust
//! use scribe_core::StyledTextCtrl;
//! use scribe_modes::{Editor, StartupOptions};
//!
//! let mut editor = Editor::new(&StartupOptions::default()).unwrap();
//! let url = url::Url::parse("mem:hello.py").unwrap();
//! let view = editor.open_text(Some(url), "def f():\n").unwrap();
//! assert_eq!(editor.view_modes(view).unwrap().major(), "Python");
//!
//! editor.workspace_mut().session(view).unwrap().goto_position(9);
//! editor.handle_key(view, "x").unwrap();
//! assert_eq!(editor.document_of(view).unwrap().text(), "def f():\nx");
//! ```

pub mod actions;
pub mod autoindent;
pub mod comment;
pub mod editor;
pub mod error;
pub mod major;
pub mod matcher;
pub mod minor;
pub mod modeline;
pub mod paragraph;
pub mod prefs;
pub mod session;
pub mod startup;

pub use actions::{Action, ActionArgs, ActionRegistry, Builtin};
pub use autoindent::{
    Autoindent, BasicAutoindent, CStyleAutoindent, Fortran77Autoindent, MakefileAutoindent,
    NullAutoindent, PythonAutoindent, RegexAutoindent,
};
pub use comment::comment_region;
pub use editor::{Editor, EditorContext, ViewModes};
pub use error::{ActionError, ModeError, ModelineError, PrefsError, StartupError};
pub use major::{EditraMatch, MajorMode, MajorModeRegistry};
pub use matcher::{MAGIC_SIZE, MatchRule, ModeMatch, ModeMatcher};
pub use minor::{
    CompletionScope, FoldExplorer, MinorMode, MinorModeRegistry, OutputLog, Placement, Side,
    TabCompletion,
};
pub use modeline::Modeline;
pub use paragraph::{ParagraphStyle, fill_paragraph};
pub use prefs::{ClassPrefs, PrefDefault, PrefValue};
pub use session::Session;
pub use startup::StartupOptions;
