//! Class preferences.
//!
//! Every major mode names a class hierarchy such as `["PythonMode", "Fundamental"]`. A lookup
//! walks that hierarchy in order; for each class the user layer (loaded from YAML) is checked
//! before the built-in defaults, and the first hit wins.
//!
//! ```yaml
//! Fundamental:
//!   edge_column: 72
//! PythonMode:
//!   use_tabs: false
//!   minor_modes: "FoldExplorer, TabCompletion"
//! ```

use crate::error::PrefsError;
use scribe_core::ViewSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root class of every hierarchy.
pub const FUNDAMENTAL: &str = "Fundamental";

/// A typed preference value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// String.
    Str(String),
}

impl PrefValue {
    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PrefValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PrefValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

type Table = BTreeMap<String, BTreeMap<String, PrefValue>>;

const FUNDAMENTAL_DEFAULTS: &[(&str, PrefDefault)] = &[
    ("tab_size", PrefDefault::Int(8)),
    ("indent_size", PrefDefault::Int(4)),
    ("use_tabs", PrefDefault::Bool(false)),
    ("word_wrap", PrefDefault::Bool(false)),
    ("edge_column", PrefDefault::Int(80)),
    ("caret_blink_rate", PrefDefault::Int(500)),
    ("caret_line_highlight", PrefDefault::Bool(false)),
    ("view_whitespace", PrefDefault::Bool(false)),
    ("minor_modes", PrefDefault::Str("")),
];

/// Const-friendly spelling of a default value.
#[derive(Debug, Clone, Copy)]
pub enum PrefDefault {
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Int(i64),
    /// String default.
    Str(&'static str),
}

impl From<PrefDefault> for PrefValue {
    fn from(value: PrefDefault) -> Self {
        match value {
            PrefDefault::Bool(b) => Self::Bool(b),
            PrefDefault::Int(i) => Self::Int(i),
            PrefDefault::Str(s) => Self::Str(s.to_string()),
        }
    }
}

/// Two-layer preference registry keyed by class name.
#[derive(Debug, Clone)]
pub struct ClassPrefs {
    defaults: Table,
    user: Table,
}

impl Default for ClassPrefs {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassPrefs {
    /// Registry holding only the `Fundamental` defaults.
    pub fn new() -> Self {
        let mut prefs = Self {
            defaults: Table::new(),
            user: Table::new(),
        };
        prefs.register_defaults(FUNDAMENTAL, FUNDAMENTAL_DEFAULTS);
        prefs
    }

    /// Add static defaults for `class`. Existing defaults for the same keys are replaced.
    pub fn register_defaults(&mut self, class: &str, defaults: &[(&str, PrefDefault)]) {
        let table = self.defaults.entry(class.to_string()).or_default();
        for (key, value) in defaults {
            table.insert(key.to_string(), (*value).into());
        }
    }

    /// Set a user value.
    pub fn set(&mut self, class: &str, key: &str, value: impl Into<PrefValue>) {
        self.user
            .entry(class.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Remove a user value, falling back to the defaults again.
    pub fn unset(&mut self, class: &str, key: &str) -> Option<PrefValue> {
        self.user.get_mut(class)?.remove(key)
    }

    /// First value of `key` along `hierarchy`.
    pub fn get(&self, hierarchy: &[&str], key: &str) -> Option<&PrefValue> {
        hierarchy.iter().find_map(|class| {
            self.user
                .get(*class)
                .and_then(|t| t.get(key))
                .or_else(|| self.defaults.get(*class).and_then(|t| t.get(key)))
        })
    }

    /// Boolean lookup; a value of another type is an error.
    pub fn get_bool(&self, hierarchy: &[&str], key: &str) -> Result<Option<bool>, PrefsError> {
        self.typed(hierarchy, key, "a boolean", PrefValue::as_bool)
    }

    /// Integer lookup; a value of another type is an error.
    pub fn get_int(&self, hierarchy: &[&str], key: &str) -> Result<Option<i64>, PrefsError> {
        self.typed(hierarchy, key, "an integer", PrefValue::as_int)
    }

    /// String lookup; a value of another type is an error.
    pub fn get_str(&self, hierarchy: &[&str], key: &str) -> Result<Option<String>, PrefsError> {
        self.typed(hierarchy, key, "a string", |v| v.as_str().map(str::to_string))
    }

    fn typed<T>(
        &self,
        hierarchy: &[&str],
        key: &str,
        expected: &'static str,
        convert: impl Fn(&PrefValue) -> Option<T>,
    ) -> Result<Option<T>, PrefsError> {
        match self.get(hierarchy, key) {
            None => Ok(None),
            Some(value) => convert(value).map(Some).ok_or_else(|| PrefsError::Type {
                key: key.to_string(),
                expected,
            }),
        }
    }

    // ---------------------------------------------------------------------------------------
    // Persistence

    /// Merge user values from YAML text.
    pub fn load_yaml(&mut self, text: &str) -> Result<(), PrefsError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let table: Table = serde_yaml::from_str(text)?;
        for (class, values) in table {
            let entry = self.user.entry(class).or_default();
            entry.extend(values);
        }
        Ok(())
    }

    /// Merge user values from a YAML file. A missing file is not an error.
    pub fn load_file(&mut self, path: &Path) -> Result<(), PrefsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "loading preferences");
                self.load_yaml(&text)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// The user layer as YAML.
    pub fn to_yaml(&self) -> Result<String, PrefsError> {
        Ok(serde_yaml::to_string(&self.user)?)
    }

    /// Write the user layer to `path`.
    pub fn save_file(&self, path: &Path) -> Result<(), PrefsError> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Derived settings

    /// View settings for a mode with class `hierarchy`.
    ///
    /// Missing or mistyped values fall back to [`ViewSettings::default`].
    pub fn view_settings(&self, hierarchy: &[&str]) -> ViewSettings {
        let defaults = ViewSettings::default();
        let int = |key: &str, fallback: usize| -> usize {
            match self.get_int(hierarchy, key) {
                Ok(Some(v)) if v > 0 => v as usize,
                Ok(_) => fallback,
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring preference");
                    fallback
                }
            }
        };
        let flag = |key: &str, fallback: bool| -> bool {
            self.get_bool(hierarchy, key).ok().flatten().unwrap_or(fallback)
        };
        ViewSettings {
            tab_width: int("tab_size", defaults.tab_width),
            indent: int("indent_size", defaults.indent),
            use_tabs: flag("use_tabs", defaults.use_tabs),
            edge_column: int("edge_column", defaults.edge_column),
            word_wrap: flag("word_wrap", defaults.word_wrap),
            caret_line_highlight: flag("caret_line_highlight", defaults.caret_line_highlight),
            view_whitespace: flag("view_whitespace", defaults.view_whitespace),
            caret_blink_rate: int("caret_blink_rate", defaults.caret_blink_rate as usize) as u32,
        }
    }

    /// Keywords listed in the comma separated `minor_modes` preference.
    pub fn minor_modes(&self, hierarchy: &[&str]) -> Vec<String> {
        self.get_str(hierarchy, "minor_modes")
            .ok()
            .flatten()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PYTHON: &[&str] = &["PythonMode", FUNDAMENTAL];

    #[test]
    fn test_hierarchy_lookup_order() {
        let mut prefs = ClassPrefs::new();
        prefs.register_defaults("PythonMode", &[("tab_size", PrefDefault::Int(4))]);
        assert_eq!(prefs.get_int(PYTHON, "tab_size").unwrap(), Some(4));
        assert_eq!(prefs.get_int(&[FUNDAMENTAL], "tab_size").unwrap(), Some(8));

        prefs.set(FUNDAMENTAL, "edge_column", 72);
        prefs.set("PythonMode", "tab_size", 2);
        assert_eq!(prefs.get_int(PYTHON, "tab_size").unwrap(), Some(2));
        assert_eq!(prefs.get_int(PYTHON, "edge_column").unwrap(), Some(72));

        prefs.unset("PythonMode", "tab_size");
        assert_eq!(prefs.get_int(PYTHON, "tab_size").unwrap(), Some(4));
    }

    #[test]
    fn test_type_mismatch() {
        let mut prefs = ClassPrefs::new();
        prefs.set(FUNDAMENTAL, "use_tabs", "yes");
        assert!(matches!(
            prefs.get_bool(&[FUNDAMENTAL], "use_tabs"),
            Err(PrefsError::Type { .. })
        ));
        assert!(!prefs.view_settings(&[FUNDAMENTAL]).use_tabs);
    }

    #[test]
    fn test_yaml_layer_and_view_settings() {
        let mut prefs = ClassPrefs::new();
        prefs
            .load_yaml(
                "Fundamental:\n  edge_column: 72\nPythonMode:\n  use_tabs: true\n  minor_modes: \"FoldExplorer, TabCompletion\"\n",
            )
            .unwrap();
        let settings = prefs.view_settings(PYTHON);
        assert_eq!(settings.edge_column, 72);
        assert!(settings.use_tabs);
        assert_eq!(settings.tab_width, 8);
        assert_eq!(prefs.minor_modes(PYTHON), vec!["FoldExplorer", "TabCompletion"]);
        assert!(prefs.minor_modes(&[FUNDAMENTAL]).is_empty());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.yaml");

        let mut prefs = ClassPrefs::new();
        prefs.load_file(&path).unwrap();
        prefs.set("CMode", "indent_size", 2);
        prefs.save_file(&path).unwrap();

        let mut reloaded = ClassPrefs::new();
        reloaded.load_file(&path).unwrap();
        assert_eq!(reloaded.get_int(&["CMode"], "indent_size").unwrap(), Some(2));

        std::fs::write(&path, "Fundamental: [1, 2").unwrap();
        assert!(matches!(reloaded.load_file(&path), Err(PrefsError::Parse(_))));
    }
}
