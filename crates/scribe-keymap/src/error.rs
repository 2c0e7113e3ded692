//! Keymap errors.

use thiserror::Error;

/// Errors raised while building keymaps or decoding key specs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeymapError {
    /// The sequence is already bound (only returned by strict keymaps).
    #[error("duplicate key binding: {keys}")]
    DuplicateKeyBinding {
        /// Canonical key sequence.
        keys: String,
    },

    /// A bound sequence would be a prefix of another binding, or the reverse.
    #[error("key sequence {keys} conflicts with an existing prefix binding")]
    PrefixConflict {
        /// Canonical key sequence.
        keys: String,
    },

    /// The key spec could not be decoded.
    #[error("invalid key spec: {0:?}")]
    InvalidKeySpec(String),
}
