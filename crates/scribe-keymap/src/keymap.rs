//! Trie of key sequences.

use crate::error::KeymapError;
use crate::key::{KeyStroke, format_sequence, parse_sequence};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Node {
    action: Option<String>,
    children: BTreeMap<KeyStroke, Node>,
}

/// Result of looking up a (possibly partial) key sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// The sequence is bound to an action.
    Action(&'a str),
    /// The sequence is a proper prefix of at least one binding.
    Prefix,
    /// Nothing is bound on this path.
    None,
}

/// A named keymap: key sequences to action names.
///
/// Rebinding a sequence replaces the old action with a warning; strict keymaps refuse instead.
/// A sequence can never be both bound and a prefix of a longer binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    name: String,
    root: Node,
    strict: bool,
}

impl KeyMap {
    /// Empty keymap.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            root: Node::default(),
            strict: false,
        }
    }

    /// Empty keymap that rejects duplicate bindings.
    pub fn strict(name: &str) -> Self {
        Self {
            strict: true,
            ..Self::new(name)
        }
    }

    /// Keymap name (usually the owning mode's keyword).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind `keys` (e.g. `"C-X C-S"`) to `action`.
    pub fn bind(&mut self, keys: &str, action: &str) -> Result<(), KeymapError> {
        let strokes = parse_sequence(keys)?;
        self.bind_strokes(&strokes, action)
    }

    /// Bind an already decoded sequence.
    pub fn bind_strokes(&mut self, strokes: &[KeyStroke], action: &str) -> Result<(), KeymapError> {
        let keys = format_sequence(strokes);
        let Some((last, prefix)) = strokes.split_last() else {
            return Err(KeymapError::InvalidKeySpec(keys));
        };

        let mut node = &mut self.root;
        for stroke in prefix {
            node = node.children.entry(stroke.clone()).or_default();
            if node.action.is_some() {
                return Err(KeymapError::PrefixConflict { keys });
            }
        }
        let leaf = node.children.entry(last.clone()).or_default();
        if !leaf.children.is_empty() {
            return Err(KeymapError::PrefixConflict { keys });
        }
        if let Some(previous) = &leaf.action {
            if self.strict {
                return Err(KeymapError::DuplicateKeyBinding { keys });
            }
            tracing::warn!(
                keymap = %self.name,
                keys = %keys,
                previous = %previous,
                action,
                "duplicate key binding; latest wins"
            );
        }
        leaf.action = Some(action.to_string());
        Ok(())
    }

    /// Remove the binding of `keys`. Returns the action it was bound to.
    pub fn unbind(&mut self, keys: &str) -> Result<Option<String>, KeymapError> {
        let strokes = parse_sequence(keys)?;
        Ok(remove(&mut self.root, &strokes))
    }

    /// Look up a key sequence.
    pub fn lookup(&self, strokes: &[KeyStroke]) -> Lookup<'_> {
        let mut node = &self.root;
        for stroke in strokes {
            let Some(child) = node.children.get(stroke) else {
                return Lookup::None;
            };
            node = child;
        }
        match &node.action {
            Some(action) => Lookup::Action(action),
            None if !node.children.is_empty() => Lookup::Prefix,
            None => Lookup::None,
        }
    }

    /// All `(key sequence, action)` pairs, sorted by canonical sequence.
    pub fn bindings(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        collect(&self.root, &mut path, &mut out);
        out.sort();
        out
    }

    /// Number of bound sequences.
    pub fn len(&self) -> usize {
        self.bindings().len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

fn remove(node: &mut Node, strokes: &[KeyStroke]) -> Option<String> {
    let Some((first, rest)) = strokes.split_first() else {
        return node.action.take();
    };
    let child = node.children.get_mut(first)?;
    let removed = remove(child, rest);
    if child.action.is_none() && child.children.is_empty() {
        node.children.remove(first);
    }
    removed
}

fn collect(node: &Node, path: &mut Vec<KeyStroke>, out: &mut Vec<(String, String)>) {
    if let Some(action) = &node.action {
        out.push((format_sequence(path), action.clone()));
    }
    for (stroke, child) in &node.children {
        path.push(stroke.clone());
        collect(child, path, out);
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(spec: &str) -> Vec<KeyStroke> {
        parse_sequence(spec).unwrap()
    }

    #[test]
    fn test_lookup_walks_the_trie() {
        let mut map = KeyMap::new("global");
        map.bind("C-x C-s", "save-file").unwrap();
        map.bind("C-X C-F", "open-file").unwrap();

        assert_eq!(map.lookup(&keys("C-X")), Lookup::Prefix);
        assert_eq!(map.lookup(&keys("C-X C-S")), Lookup::Action("save-file"));
        assert_eq!(map.lookup(&keys("C-X C-Q")), Lookup::None);
        assert_eq!(map.lookup(&keys("C-X C-S C-S")), Lookup::None);
    }

    #[test]
    fn test_duplicate_binding_latest_wins() {
        let mut map = KeyMap::new("global");
        map.bind("C-S", "find-next").unwrap();
        map.bind("Ctrl+s", "save-file").unwrap();
        assert_eq!(map.lookup(&keys("C-S")), Lookup::Action("save-file"));
        assert_eq!(map.len(), 1);

        let mut strict = KeyMap::strict("global");
        strict.bind("C-S", "find-next").unwrap();
        assert_eq!(
            strict.bind("C-S", "save-file"),
            Err(KeymapError::DuplicateKeyBinding { keys: "C-S".into() })
        );
    }

    #[test]
    fn test_prefix_conflicts() {
        let mut map = KeyMap::new("global");
        map.bind("C-X", "cut").unwrap();
        assert!(matches!(
            map.bind("C-X C-S", "save-file"),
            Err(KeymapError::PrefixConflict { .. })
        ));

        let mut map = KeyMap::new("global");
        map.bind("C-X C-S", "save-file").unwrap();
        assert!(matches!(
            map.bind("C-X", "cut"),
            Err(KeymapError::PrefixConflict { .. })
        ));
    }

    #[test]
    fn test_unbind() {
        let mut map = KeyMap::new("global");
        map.bind("C-X C-S", "save-file").unwrap();
        assert_eq!(map.unbind("C-X C-S").unwrap().as_deref(), Some("save-file"));
        assert_eq!(map.lookup(&keys("C-X")), Lookup::None);
        assert!(map.is_empty());
        assert_eq!(map.unbind("C-Q").unwrap(), None);
    }
}
