//! Built-in global binding presets.

use crate::error::KeymapError;
use crate::keymap::KeyMap;
use std::fmt;

/// Named global binding preset, selected with `--key-bindings=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyBindingPreset {
    /// Emacs style multi-stroke bindings.
    Emacs,
    /// Windows style single-stroke Ctrl bindings.
    Win,
    /// macOS style Command bindings.
    Mac,
    /// Platform default (the Windows table).
    #[default]
    Default,
}

impl KeyBindingPreset {
    /// Parse a preset name (`emacs`, `win`, `mac`, `default`, `system default`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "emacs" => Some(Self::Emacs),
            "win" | "windows" => Some(Self::Win),
            "mac" | "macos" | "osx" => Some(Self::Mac),
            "default" | "system default" | "system-default" => Some(Self::Default),
            _ => None,
        }
    }

    /// Preset name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Emacs => "emacs",
            Self::Win => "win",
            Self::Mac => "mac",
            Self::Default => "default",
        }
    }

    fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Emacs => EMACS,
            Self::Win | Self::Default => WIN,
            Self::Mac => MAC,
        }
    }
}

impl fmt::Display for KeyBindingPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const EMACS: &[(&str, &str)] = &[
    ("C-X C-S", "save-file"),
    ("C-X C-F", "open-file"),
    ("C-X C-W", "save-file-as"),
    ("C-_", "undo"),
    ("C-/", "undo"),
    ("C-X R", "redo"),
    ("C-S", "find-next"),
    ("C-R", "find-prev"),
    ("M-%", "replace-all"),
    ("M-Q", "fill-paragraph"),
    ("C-C C-C", "comment-region"),
    ("C-C C-U", "uncomment-region"),
    ("M-/", "complete-word"),
    ("TAB", "reindent-line"),
    ("RET", "electric-return"),
    ("M-W", "copy"),
    ("C-W", "cut"),
    ("C-Y", "paste"),
    ("C-X C-E C-L", "convert-eols-lf"),
    ("C-X C-E C-D", "convert-eols-crlf"),
    ("C-X C-E C-M", "convert-eols-cr"),
    ("C-C C-F", "fold-explorer-goto"),
];

const WIN: &[(&str, &str)] = &[
    ("C-S", "save-file"),
    ("C-O", "open-file"),
    ("C-S-S", "save-file-as"),
    ("C-Z", "undo"),
    ("C-Y", "redo"),
    ("F3", "find-next"),
    ("S-F3", "find-prev"),
    ("C-H", "replace-all"),
    ("A-Q", "fill-paragraph"),
    ("C-K C-C", "comment-region"),
    ("C-K C-U", "uncomment-region"),
    ("C-SPC", "complete-word"),
    ("TAB", "reindent-line"),
    ("RET", "electric-return"),
    ("C-C", "copy"),
    ("C-X", "cut"),
    ("C-V", "paste"),
    ("C-E C-L", "convert-eols-lf"),
    ("C-E C-D", "convert-eols-crlf"),
    ("C-E C-M", "convert-eols-cr"),
];

const MAC: &[(&str, &str)] = &[
    ("M-S", "save-file"),
    ("M-O", "open-file"),
    ("S-M-S", "save-file-as"),
    ("M-Z", "undo"),
    ("S-M-Z", "redo"),
    ("M-G", "find-next"),
    ("S-M-G", "find-prev"),
    ("A-M-F", "replace-all"),
    ("A-M-Q", "fill-paragraph"),
    ("M-/", "comment-region"),
    ("A-M-/", "uncomment-region"),
    ("A-ESC", "complete-word"),
    ("TAB", "reindent-line"),
    ("RET", "electric-return"),
    ("M-C", "copy"),
    ("M-X", "cut"),
    ("M-V", "paste"),
];

/// Build the global keymap of `preset`.
pub fn preset_keymap(preset: KeyBindingPreset) -> Result<KeyMap, KeymapError> {
    let mut keymap = KeyMap::new(preset.name());
    for (keys, action) in preset.table() {
        keymap.bind(keys, action)?;
    }
    Ok(keymap)
}

/// The binding table for `--show-key-bindings`: one `keys<TAB>action` line per binding, sorted
/// by key sequence.
pub fn show_key_bindings(keymap: &KeyMap) -> Vec<String> {
    keymap
        .bindings()
        .into_iter()
        .map(|(keys, action)| format!("{keys}\t{action}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_build_without_conflicts() {
        for preset in [
            KeyBindingPreset::Emacs,
            KeyBindingPreset::Win,
            KeyBindingPreset::Mac,
            KeyBindingPreset::Default,
        ] {
            let mut keymap = KeyMap::strict(preset.name());
            for (keys, action) in preset.table() {
                keymap.bind(keys, action).unwrap();
            }
            assert!(!keymap.is_empty());
        }
    }

    #[test]
    fn test_preset_names() {
        assert_eq!(KeyBindingPreset::from_name("system default"), Some(KeyBindingPreset::Default));
        assert_eq!(KeyBindingPreset::from_name("Emacs"), Some(KeyBindingPreset::Emacs));
        assert_eq!(KeyBindingPreset::from_name("vi"), None);
    }

    #[test]
    fn test_show_key_bindings_is_sorted() {
        let lines = show_key_bindings(&preset_keymap(KeyBindingPreset::Emacs).unwrap());
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
        assert!(lines.contains(&"C-X C-S\tsave-file".to_string()));
    }
}
