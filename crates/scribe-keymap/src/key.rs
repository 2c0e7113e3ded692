//! Keystroke decoding and canonical form.
//!
//! The canonical form of a keystroke is `[C-][S-][A-][M-]KEY`: modifiers always appear in the
//! order Ctrl, Shift, Alt, Meta, whatever spelling the user wrote. `KEY` is either a printable
//! character or one of the named keys (`RETURN`, `SPACE`, `ESCAPE`, `TAB`, `DEL`, `BACK`,
//! `F1`..`F24`, `HOME`, `END`, `UP`, `DOWN`, `LEFT`, `RIGHT`, `PRIOR`, `NEXT`, `INSERT`).
//! Letters are upper-cased when any modifier is present, so `Ctrl+x`, `C-x` and `^X` all become
//! `C-X`, while an unmodified `a` stays `a`.

use crate::error::KeymapError;
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Keystroke modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct Modifiers: u8 {
        /// Control.
        const CTRL = 0b0001;
        /// Shift.
        const SHIFT = 0b0010;
        /// Alt / Option.
        const ALT = 0b0100;
        /// Meta / Command.
        const META = 0b1000;
    }
}

const MODIFIER_PREFIXES: &[(&str, Modifiers)] = &[
    ("control-", Modifiers::CTRL),
    ("control+", Modifiers::CTRL),
    ("ctrl-", Modifiers::CTRL),
    ("ctrl+", Modifiers::CTRL),
    ("c-", Modifiers::CTRL),
    ("^", Modifiers::CTRL),
    ("shift-", Modifiers::SHIFT),
    ("shift+", Modifiers::SHIFT),
    ("s-", Modifiers::SHIFT),
    ("option-", Modifiers::ALT),
    ("option+", Modifiers::ALT),
    ("opt-", Modifiers::ALT),
    ("opt+", Modifiers::ALT),
    ("alt-", Modifiers::ALT),
    ("alt+", Modifiers::ALT),
    ("a-", Modifiers::ALT),
    ("command-", Modifiers::META),
    ("command+", Modifiers::META),
    ("cmd-", Modifiers::META),
    ("cmd+", Modifiers::META),
    ("meta-", Modifiers::META),
    ("meta+", Modifiers::META),
    ("m-", Modifiers::META),
];

const CANONICAL_ORDER: &[(Modifiers, &str)] = &[
    (Modifiers::CTRL, "C-"),
    (Modifiers::SHIFT, "S-"),
    (Modifiers::ALT, "A-"),
    (Modifiers::META, "M-"),
];

/// One decoded keystroke.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyStroke {
    modifiers: Modifiers,
    key: String,
}

impl KeyStroke {
    /// Build a keystroke from already decoded parts.
    pub fn new(modifiers: Modifiers, key: &str) -> Result<Self, KeymapError> {
        let key = normalize_key(key, modifiers)?;
        Ok(Self { modifiers, key })
    }

    /// An unmodified character key.
    pub fn plain(ch: char) -> Self {
        let key = match ch {
            ' ' => "SPACE".to_string(),
            '\t' => "TAB".to_string(),
            '\r' | '\n' => "RETURN".to_string(),
            '\u{1b}' => "ESCAPE".to_string(),
            other => other.to_string(),
        };
        Self {
            modifiers: Modifiers::empty(),
            key,
        }
    }

    /// Decode a key spec such as `Ctrl+x`, `C-M-%`, `^G`, `S-F3` or `RET`.
    pub fn parse(spec: &str) -> Result<Self, KeymapError> {
        if spec.chars().count() == 1 {
            return Self::new(Modifiers::empty(), spec);
        }
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(KeymapError::InvalidKeySpec(spec.to_string()));
        }

        let mut modifiers = Modifiers::empty();
        let mut rest = spec;
        'strip: while rest.chars().count() > 1 {
            for (prefix, flag) in MODIFIER_PREFIXES {
                if rest.len() > prefix.len()
                    && let Some(head) = rest.get(..prefix.len())
                    && head.eq_ignore_ascii_case(prefix)
                {
                    modifiers |= *flag;
                    rest = &rest[prefix.len()..];
                    continue 'strip;
                }
            }
            break;
        }

        Self::new(modifiers, rest).map_err(|_| KeymapError::InvalidKeySpec(spec.to_string()))
    }

    /// Modifier set.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Key name or character, without modifiers.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The same key with `extra` modifiers added.
    pub fn with_modifiers(&self, extra: Modifiers) -> Self {
        let modifiers = self.modifiers | extra;
        Self {
            modifiers,
            key: upper_if_modified(&self.key, modifiers),
        }
    }

    /// The same key with Meta added.
    pub fn with_meta(&self) -> Self {
        self.with_modifiers(Modifiers::META)
    }

    /// Decimal digit value for `0`..`9` and `C-0`..`C-9`.
    pub fn digit(&self) -> Option<u32> {
        if !(self.modifiers.is_empty() || self.modifiers == Modifiers::CTRL) {
            return None;
        }
        let mut chars = self.key.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => ch.to_digit(10),
            _ => None,
        }
    }

    /// Returns `true` for `-` and `C--`.
    pub fn is_minus(&self) -> bool {
        (self.modifiers.is_empty() || self.modifiers == Modifiers::CTRL) && self.key == "-"
    }

    /// Text a view would insert for this keystroke, if it is a plain printable key.
    pub fn as_text(&self) -> Option<String> {
        if !(self.modifiers.is_empty() || self.modifiers == Modifiers::SHIFT) {
            return None;
        }
        match self.key.as_str() {
            "SPACE" => Some(" ".to_string()),
            "TAB" => Some("\t".to_string()),
            key if key.chars().count() == 1 => Some(key.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, prefix) in CANONICAL_ORDER {
            if self.modifiers.contains(*flag) {
                f.write_str(prefix)?;
            }
        }
        f.write_str(&self.key)
    }
}

impl std::str::FromStr for KeyStroke {
    type Err = KeymapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn upper_if_modified(key: &str, modifiers: Modifiers) -> String {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if !modifiers.is_empty() && ch.is_alphabetic() => ch.to_uppercase().collect(),
        _ => key.to_string(),
    }
}

fn normalize_key(key: &str, modifiers: Modifiers) -> Result<String, KeymapError> {
    let mut chars = key.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        let plain = KeyStroke::plain(ch).key;
        return Ok(upper_if_modified(&plain, modifiers));
    }

    let upper = key.to_ascii_uppercase();
    let name = match upper.as_str() {
        "RET" | "RETURN" | "ENTER" => "RETURN",
        "SPC" | "SPACE" => "SPACE",
        "ESC" | "ESCAPE" => "ESCAPE",
        "TAB" => "TAB",
        "DEL" | "DELETE" => "DEL",
        "BACK" | "BACKSPACE" | "BS" => "BACK",
        "HOME" => "HOME",
        "END" => "END",
        "UP" => "UP",
        "DOWN" => "DOWN",
        "LEFT" => "LEFT",
        "RIGHT" => "RIGHT",
        "PRIOR" | "PAGEUP" | "PGUP" => "PRIOR",
        "NEXT" | "PAGEDOWN" | "PGDN" => "NEXT",
        "INSERT" | "INS" => "INSERT",
        other => {
            let is_function_key = other
                .strip_prefix('F')
                .and_then(|n| n.parse::<u8>().ok())
                .is_some_and(|n| (1..=24).contains(&n));
            if is_function_key {
                return Ok(other.to_string());
            }
            return Err(KeymapError::InvalidKeySpec(key.to_string()));
        }
    };
    Ok(name.to_string())
}

/// Canonical spelling of a single keystroke spec.
pub fn canonical(spec: &str) -> Result<String, KeymapError> {
    Ok(KeyStroke::parse(spec)?.to_string())
}

/// Decode a whitespace separated key sequence such as `C-X C-S`.
pub fn parse_sequence(spec: &str) -> Result<Vec<KeyStroke>, KeymapError> {
    let keys = spec
        .split_whitespace()
        .map(KeyStroke::parse)
        .collect::<Result<Vec<_>, _>>()?;
    if keys.is_empty() {
        return Err(KeymapError::InvalidKeySpec(spec.to_string()));
    }
    Ok(keys)
}

/// Canonical spelling of a key sequence.
pub fn format_sequence(keys: &[KeyStroke]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_spellings() {
        for spec in ["Ctrl+x", "ctrl-X", "C-x", "^x", "Control-x"] {
            assert_eq!(canonical(spec).unwrap(), "C-X", "{spec}");
        }
        assert_eq!(canonical("Meta-Ctrl-a").unwrap(), "C-M-A");
        assert_eq!(canonical("Cmd-Shift-z").unwrap(), "S-M-Z");
        assert_eq!(canonical("Opt-f").unwrap(), "A-F");
        assert_eq!(canonical("C--").unwrap(), "C--");
        assert_eq!(canonical("M-%").unwrap(), "M-%");
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(canonical("RET").unwrap(), "RETURN");
        assert_eq!(canonical("spc").unwrap(), "SPACE");
        assert_eq!(canonical("Esc").unwrap(), "ESCAPE");
        assert_eq!(canonical("S-f3").unwrap(), "S-F3");
        assert_eq!(canonical(" ").unwrap(), "SPACE");
        assert!(canonical("F25").is_err());
        assert!(canonical("C-Bogus").is_err());
    }

    #[test]
    fn test_canonical_is_idempotent() {
        for spec in ["a", "A", "C-x", "M-S-TAB", "^g", "alt+RET", "C-M-%", "F12", "-", "C-7"] {
            let once = canonical(spec).unwrap();
            assert_eq!(canonical(&once).unwrap(), once, "{spec}");
        }
    }

    #[test]
    fn test_digits_and_text() {
        assert_eq!(KeyStroke::parse("7").unwrap().digit(), Some(7));
        assert_eq!(KeyStroke::parse("C-3").unwrap().digit(), Some(3));
        assert_eq!(KeyStroke::parse("M-3").unwrap().digit(), None);
        assert!(KeyStroke::parse("C--").unwrap().is_minus());
        assert_eq!(KeyStroke::plain('a').as_text().as_deref(), Some("a"));
        assert_eq!(KeyStroke::parse("C-a").unwrap().as_text(), None);
        assert_eq!(format_sequence(&parse_sequence("C-x   C-s").unwrap()), "C-X C-S");
    }
}
