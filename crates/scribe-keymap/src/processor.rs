//! Keystroke dispatcher.
//!
//! A [`KeyProcessor`] owns the global keymap plus the keymaps contributed by the current major
//! mode and any minor modes, and turns a stream of keystrokes into [`KeyResult`]s. Minor mode
//! keymaps are consulted first, then the major mode keymap, then the global keymap; the first
//! keymap that binds the full sequence wins.

use crate::error::KeymapError;
use crate::key::{KeyStroke, Modifiers, format_sequence};
use crate::keymap::{KeyMap, Lookup};

/// Outcome of feeding one keystroke to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult {
    /// A bound sequence completed.
    Dispatch {
        /// Action name from the keymap.
        action: String,
        /// Numeric prefix argument (1 when none was given).
        multiplier: i64,
    },
    /// More keystrokes are needed (sequence prefix, sticky meta or numeric prefix).
    Pending,
    /// No keymap knows the first keystroke; the view should handle it (e.g. insert text).
    PassThrough {
        /// The keystroke, with any sticky meta applied.
        key: KeyStroke,
        /// Numeric prefix argument (1 when none was given).
        multiplier: i64,
    },
    /// A multi-stroke sequence matched nothing. The echo area says `"<seq> not defined."`.
    Undefined(String),
    /// The abort key or the escape-escape-escape sequence cancelled everything.
    Quit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PrefixArg {
    negative: bool,
    digits: String,
    universal_count: u32,
    closed: bool,
}

impl PrefixArg {
    fn value(&self) -> i64 {
        let magnitude = if self.digits.is_empty() {
            if self.negative && self.universal_count <= 1 {
                1
            } else {
                4_i64.saturating_pow(self.universal_count.max(1))
            }
        } else {
            self.digits.parse::<i64>().unwrap_or(i64::MAX)
        };
        if self.negative { -magnitude } else { magnitude }
    }

    fn echo(&self) -> String {
        let mut out = String::from("C-U");
        for _ in 1..self.universal_count {
            out.push_str(" C-U");
        }
        if self.negative {
            out.push_str(" -");
        }
        for digit in self.digits.chars() {
            out.push(' ');
            out.push(digit);
        }
        out
    }
}

/// Multi-keymap keystroke dispatcher with numeric prefix and abort handling.
#[derive(Debug, Clone)]
pub struct KeyProcessor {
    global: KeyMap,
    major: Option<KeyMap>,
    minors: Vec<KeyMap>,
    pending: Vec<KeyStroke>,
    prefix: Option<PrefixArg>,
    meta_pending: bool,
    escape_count: u32,
    abort_key: KeyStroke,
    meta_key: Option<KeyStroke>,
    universal_key: KeyStroke,
    echo: String,
}

impl KeyProcessor {
    /// Processor with the default abort (`C-G`), sticky meta (`ESCAPE`) and universal argument
    /// (`C-U`) keys.
    pub fn new(global: KeyMap) -> Self {
        Self {
            global,
            major: None,
            minors: Vec::new(),
            pending: Vec::new(),
            prefix: None,
            meta_pending: false,
            escape_count: 0,
            abort_key: control('G'),
            meta_key: Some(KeyStroke::plain('\u{1b}')),
            universal_key: control('U'),
            echo: String::new(),
        }
    }

    /// Change the abort key.
    pub fn set_abort_key(&mut self, spec: &str) -> Result<(), KeymapError> {
        self.abort_key = KeyStroke::parse(spec)?;
        Ok(())
    }

    /// Change (or disable) the sticky meta key.
    pub fn set_meta_key(&mut self, spec: Option<&str>) -> Result<(), KeymapError> {
        self.meta_key = spec.map(KeyStroke::parse).transpose()?;
        Ok(())
    }

    /// Global keymap.
    pub fn global(&self) -> &KeyMap {
        &self.global
    }

    /// Mutable global keymap.
    pub fn global_mut(&mut self) -> &mut KeyMap {
        &mut self.global
    }

    /// Install the keymap of the current major mode.
    pub fn set_major_keymap(&mut self, keymap: Option<KeyMap>) {
        self.major = keymap;
        self.reset();
    }

    /// Add a minor mode keymap. Later additions take priority.
    pub fn add_minor_keymap(&mut self, keymap: KeyMap) {
        self.minors.retain(|k| k.name() != keymap.name());
        self.minors.insert(0, keymap);
        self.reset();
    }

    /// Remove the minor mode keymap named `name`.
    pub fn remove_minor_keymap(&mut self, name: &str) -> bool {
        let before = self.minors.len();
        self.minors.retain(|k| k.name() != name);
        self.reset();
        self.minors.len() != before
    }

    /// Text of the echo area.
    pub fn echo(&self) -> &str {
        &self.echo
    }

    /// Returns `true` while a sequence, prefix argument or sticky meta is in progress.
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty() || self.prefix.is_some() || self.meta_pending
    }

    /// Forget any partial sequence and prefix argument.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.prefix = None;
        self.meta_pending = false;
        self.escape_count = 0;
    }

    /// Decode `spec` and process it.
    pub fn process(&mut self, spec: &str) -> Result<KeyResult, KeymapError> {
        let key = KeyStroke::parse(spec)?;
        Ok(self.process_key(key))
    }

    /// Process one keystroke.
    pub fn process_key(&mut self, key: KeyStroke) -> KeyResult {
        if key == self.abort_key {
            return self.quit();
        }

        let mut key = key;
        if self.meta_key.as_ref() == Some(&key) {
            self.escape_count += 1;
            if self.escape_count >= 3 {
                return self.quit();
            }
            self.meta_pending = true;
            self.echo = self.echo_with(&["ESC"]);
            return KeyResult::Pending;
        }
        if self.meta_pending {
            key = key.with_meta();
            self.meta_pending = false;
        }
        self.escape_count = 0;

        if self.pending.is_empty() && let Some(result) = self.numeric_prefix(&key) {
            return result;
        }

        self.pending.push(key);
        let mut found_prefix = false;
        let mut found_action = None;
        for keymap in self.keymaps() {
            match keymap.lookup(&self.pending) {
                Lookup::Action(action) => {
                    found_action = Some(action.to_string());
                    break;
                }
                Lookup::Prefix => found_prefix = true,
                Lookup::None => {}
            }
        }

        if let Some(action) = found_action {
            let multiplier = self.multiplier();
            tracing::debug!(keys = %format_sequence(&self.pending), %action, multiplier, "dispatch");
            self.reset();
            self.echo.clear();
            return KeyResult::Dispatch { action, multiplier };
        }
        if found_prefix {
            self.echo = self.echo_with(&[]);
            return KeyResult::Pending;
        }

        let mut keys = std::mem::take(&mut self.pending);
        let multiplier = self.multiplier();
        self.reset();
        if keys.len() == 1
            && let Some(key) = keys.pop()
        {
            self.echo.clear();
            return KeyResult::PassThrough { key, multiplier };
        }
        let sequence = format_sequence(&keys);
        self.echo = format!("{sequence} not defined.");
        KeyResult::Undefined(sequence)
    }

    fn keymaps(&self) -> impl Iterator<Item = &KeyMap> {
        self.minors
            .iter()
            .chain(self.major.as_ref())
            .chain(std::iter::once(&self.global))
    }

    fn quit(&mut self) -> KeyResult {
        self.reset();
        self.echo = "Quit".to_string();
        KeyResult::Quit
    }

    fn multiplier(&self) -> i64 {
        self.prefix.as_ref().map_or(1, PrefixArg::value)
    }

    /// Handle the universal argument and its digits; `None` lets the key through.
    fn numeric_prefix(&mut self, key: &KeyStroke) -> Option<KeyResult> {
        if *key == self.universal_key {
            let prefix = self.prefix.get_or_insert_with(PrefixArg::default);
            if prefix.closed || !prefix.digits.is_empty() || prefix.negative {
                prefix.closed = true;
                return None;
            }
            prefix.universal_count += 1;
            self.echo = prefix.echo();
            return Some(KeyResult::Pending);
        }

        let prefix = self.prefix.as_mut()?;
        if prefix.closed {
            return None;
        }
        if key.digit().is_some() {
            prefix.digits.push_str(key.key());
            self.echo = prefix.echo();
            return Some(KeyResult::Pending);
        }
        if key.is_minus() && prefix.digits.is_empty() && !prefix.negative {
            prefix.negative = true;
            self.echo = prefix.echo();
            return Some(KeyResult::Pending);
        }
        prefix.closed = true;
        None
    }

    fn echo_with(&self, extra: &[&str]) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(prefix) = &self.prefix {
            parts.push(prefix.echo());
        }
        if !self.pending.is_empty() {
            parts.push(format_sequence(&self.pending));
        }
        parts.extend(extra.iter().map(|s| s.to_string()));
        parts.join(" ")
    }
}

fn control(ch: char) -> KeyStroke {
    KeyStroke::plain(ch).with_modifiers(Modifiers::CTRL)
}
