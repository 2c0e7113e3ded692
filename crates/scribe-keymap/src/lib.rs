#![warn(missing_docs)]
//! `scribe-keymap` - keystroke canonicalization, multi-stroke keymaps and key dispatch.
//!
//! # Overview
//!
//! ```text
//! raw key spec ("Ctrl+x", "C-X", "^x")
//!        │  KeyStroke::parse
//!        ▼
//! ┌─────────────────────────────────────────────┐
//! │ KeyProcessor                                │
//! │  abort key (C-G) · sticky meta (ESCAPE)     │
//! │  numeric prefix (C-U [-] digits)            │
//! │  minor keymaps → major keymap → global      │
//! └─────────────────────────────────────────────┘
//!        │
//!        ▼
//! KeyResult::{Dispatch, Pending, PassThrough, Undefined, Quit}
//! ```
//!
//! Keymaps map key *sequences* to action names. The processor does not know what actions do; the
//! host (see `scribe-modes`) looks the name up in its action registry and invokes it with the
//! multiplier carried by [`KeyResult::Dispatch`].
//!
//! # Example
//!
//! ```rust
//! use scribe_keymap::{KeyMap, KeyProcessor, KeyResult};
//!
//! let mut global = KeyMap::new("global");
//! global.bind("C-X C-S", "save-file").unwrap();
//! global.bind("C-X C-F", "open-file").unwrap();
//!
//! let mut processor = KeyProcessor::new(global);
//! assert_eq!(processor.process("C-x").unwrap(), KeyResult::Pending);
//! assert_eq!(processor.echo(), "C-X");
//! assert_eq!(
//!     processor.process("Ctrl+S").unwrap(),
//!     KeyResult::Dispatch { action: "save-file".into(), multiplier: 1 }
//! );
//! ```

pub mod bindings;
pub mod error;
pub mod key;
pub mod keymap;
pub mod processor;

pub use bindings::{KeyBindingPreset, preset_keymap, show_key_bindings};
pub use error::KeymapError;
pub use key::{KeyStroke, Modifiers, canonical, format_sequence, parse_sequence};
pub use keymap::{KeyMap, Lookup};
pub use processor::{KeyProcessor, KeyResult};
