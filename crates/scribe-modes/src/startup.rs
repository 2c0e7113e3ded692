//! Options a host program forwards from its command line.

use crate::error::StartupError;
use scribe_keymap::{KeyBindingPreset, preset_keymap, show_key_bindings};

/// Parsed startup options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartupOptions {
    /// Global binding preset (`--key-bindings=`).
    pub key_bindings: KeyBindingPreset,
    /// Print the binding table and exit (`--show-key-bindings`).
    pub show_key_bindings: bool,
    /// Do not restore the previous session (`--no-session`).
    pub no_session: bool,
}

impl StartupOptions {
    /// Parse `args` (without the program name). Arguments not starting with `--` are left for
    /// the host and returned in order.
    pub fn parse<I, S>(args: I) -> Result<(Self, Vec<String>), StartupError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        let mut rest = Vec::new();
        for arg in args {
            let arg = arg.as_ref();
            if let Some(name) = arg.strip_prefix("--key-bindings=") {
                options.key_bindings = KeyBindingPreset::from_name(name)
                    .ok_or_else(|| StartupError::UnknownPreset(name.to_string()))?;
            } else if arg == "--show-key-bindings" {
                options.show_key_bindings = true;
            } else if arg == "--no-session" {
                options.no_session = true;
            } else if arg.starts_with("--") {
                return Err(StartupError::UnknownOption(arg.to_string()));
            } else {
                rest.push(arg.to_string());
            }
        }
        tracing::debug!(?options, "startup options");
        Ok((options, rest))
    }

    /// The `--show-key-bindings` table of the selected preset.
    pub fn key_binding_table(&self) -> Result<Vec<String>, StartupError> {
        Ok(show_key_bindings(&preset_keymap(self.key_bindings)?))
    }
}
