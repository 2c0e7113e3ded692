#![warn(missing_docs)]
//! `scribe-lang` - data-driven language helpers for `scribe`.
//!
//! This crate stays lightweight: it knows nothing about documents, views or styling. It provides
//! the small pieces of per-language data that the editing services consume:
//!
//! - [`CommentDelimiters`]: the line comment start/end tokens of a language, and the
//!   [`CommentSplitter`] built from them, which splits a line into
//!   `(leader, body, trailer)` for paragraph fill and comment toggling.
//! - [`FileTypeRegistry`]: maps filename extensions to Editra-style language names so that
//!   major modes can be matched by file type.

pub mod comment;
pub mod filetype;

pub use comment::{CommentDelimiters, CommentSplitter, SplitLine};
pub use filetype::FileTypeRegistry;
