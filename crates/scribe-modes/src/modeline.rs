//! File-local settings in emacs, vim and kate syntax.
//!
//! ```text
//! # -*- mode: python; tab-width: 4; indent-tabs-mode: nil -*-
//! # vim: set ts=8 sw=4 et tw=79:
//! // kate: tab-width 4; space-indent on; show-tabs on;
//! ```
//!
//! Each parser is pure: it reads candidate lines and returns a [`Modeline`]. Applying the result
//! to a view's [`ViewSettings`] reports which settings changed. In lenient mode malformed entries
//! are skipped (this is what mode matching uses); in strict mode they are a
//! [`ModelineError::Parse`].

use crate::error::ModelineError;
use regex::Regex;
use scribe_core::ViewSettings;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Number of lines at the top and at the bottom of a file scanned for vim and kate modelines.
pub const DEFAULT_SCAN_LINES: usize = 20;

static EMACS_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\*-\s*(.*?)\s*-\*-").expect("static pattern"));
static VIM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s+)vim?:(?:\s*set?\s+)?(.+):").expect("static pattern"));
static KATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*kate:\s*(.+)").expect("static pattern"));

/// Settings found in modelines. `None` means "not mentioned".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modeline {
    /// Major mode named by the file (`mode:` or `ft=`).
    pub mode: Option<String>,
    /// Encoding named by the file (`coding:`).
    pub encoding: Option<String>,
    /// Tab stop width.
    pub tab_width: Option<usize>,
    /// Indent width.
    pub indent: Option<usize>,
    /// Indent with tabs.
    pub use_tabs: Option<bool>,
    /// Fill / edge column.
    pub edge_column: Option<usize>,
    /// Highlight the caret line.
    pub caret_line_highlight: Option<bool>,
    /// Show whitespace.
    pub view_whitespace: Option<bool>,
    /// Every raw `name -> value` pair seen, including the ones not understood.
    pub variables: BTreeMap<String, String>,
}

impl Modeline {
    /// Returns `true` if nothing was found.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the settings this modeline mentions.
    pub fn changed(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut note = |set: bool, name| {
            if set {
                out.push(name);
            }
        };
        note(self.mode.is_some(), "mode");
        note(self.encoding.is_some(), "encoding");
        note(self.tab_width.is_some(), "tab_width");
        note(self.indent.is_some(), "indent");
        note(self.use_tabs.is_some(), "use_tabs");
        note(self.edge_column.is_some(), "edge_column");
        note(self.caret_line_highlight.is_some(), "caret_line_highlight");
        note(self.view_whitespace.is_some(), "view_whitespace");
        out
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(&mut self, other: Modeline) {
        fn over<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        over(&mut self.mode, other.mode);
        over(&mut self.encoding, other.encoding);
        over(&mut self.tab_width, other.tab_width);
        over(&mut self.indent, other.indent);
        over(&mut self.use_tabs, other.use_tabs);
        over(&mut self.edge_column, other.edge_column);
        over(&mut self.caret_line_highlight, other.caret_line_highlight);
        over(&mut self.view_whitespace, other.view_whitespace);
        self.variables.extend(other.variables);
    }

    /// Apply to `settings`, returning the names of the view settings that changed value.
    pub fn apply(&self, settings: &mut ViewSettings) -> Vec<&'static str> {
        let mut changed = Vec::new();
        fn set<T: PartialEq + Copy>(
            slot: &mut T,
            value: Option<T>,
            name: &'static str,
            changed: &mut Vec<&'static str>,
        ) {
            if let Some(value) = value
                && *slot != value
            {
                *slot = value;
                changed.push(name);
            }
        }
        set(&mut settings.tab_width, self.tab_width, "tab_width", &mut changed);
        set(&mut settings.indent, self.indent, "indent", &mut changed);
        set(&mut settings.use_tabs, self.use_tabs, "use_tabs", &mut changed);
        set(&mut settings.edge_column, self.edge_column, "edge_column", &mut changed);
        set(
            &mut settings.caret_line_highlight,
            self.caret_line_highlight,
            "caret_line_highlight",
            &mut changed,
        );
        set(
            &mut settings.view_whitespace,
            self.view_whitespace,
            "view_whitespace",
            &mut changed,
        );
        changed
    }
}

fn malformed(strict: bool, line: usize, reason: String) -> Result<(), ModelineError> {
    if strict {
        return Err(ModelineError::Parse { line, reason });
    }
    tracing::debug!(line, %reason, "skipping modeline entry");
    Ok(())
}

fn parse_count(
    value: &str,
    key: &str,
    strict: bool,
    line: usize,
) -> Result<Option<usize>, ModelineError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => {
            malformed(strict, line, format!("{key} expects a positive number, got '{value}'"))?;
            Ok(None)
        }
    }
}

// -------------------------------------------------------------------------------------------
// Emacs

fn apply_emacs_variable(
    out: &mut Modeline,
    name: &str,
    value: &str,
    strict: bool,
    line: usize,
) -> Result<(), ModelineError> {
    let name = name.trim().to_ascii_lowercase();
    let value = value.trim().trim_matches('"');
    out.variables.insert(name.clone(), value.to_string());
    match name.as_str() {
        "mode" => out.mode = Some(value.to_string()),
        "coding" => out.encoding = Some(value.to_string()),
        "tab-width" => out.tab_width = parse_count(value, &name, strict, line)?.or(out.tab_width),
        "c-basic-offset" | "python-indent" | "python-indent-offset" | "indent-width"
        | "sh-basic-offset" | "standard-indent" => {
            out.indent = parse_count(value, &name, strict, line)?.or(out.indent);
        }
        "fill-column" => {
            out.edge_column = parse_count(value, &name, strict, line)?.or(out.edge_column);
        }
        "indent-tabs-mode" => out.use_tabs = Some(value != "nil"),
        _ => {}
    }
    Ok(())
}

/// Parse the `-*- ... -*-` header on the first two of `lines` and any trailing
/// `Local Variables:` block.
pub fn parse_emacs(lines: &[&str], strict: bool) -> Result<Modeline, ModelineError> {
    let mut out = Modeline::default();

    for (idx, line) in lines.iter().take(2).enumerate() {
        let Some(caps) = EMACS_HEADER.captures(line) else {
            continue;
        };
        let body = caps.get(1).map_or("", |m| m.as_str());
        for (pos, entry) in body.split(';').map(str::trim).enumerate() {
            if entry.is_empty() {
                continue;
            }
            match entry.split_once(':') {
                Some((name, value)) => apply_emacs_variable(&mut out, name, value, strict, idx)?,
                // `-*-C++-*-` names the mode without a key.
                None if pos == 0 => out.mode = Some(entry.to_string()),
                None => malformed(strict, idx, format!("'{entry}' is not 'name: value'"))?,
            }
        }
        break;
    }

    let Some((start, first)) = lines
        .iter()
        .enumerate()
        .find(|(_, line)| line.contains("Local Variables:"))
    else {
        return Ok(out);
    };
    let (prefix, rest) = first.split_once("Local Variables:").unwrap_or((first, ""));
    let suffix = rest.trim();
    for (idx, line) in lines.iter().enumerate().skip(start + 1) {
        let mut entry = line.trim_end();
        if let Some(stripped) = entry.strip_prefix(prefix) {
            entry = stripped;
        } else if let Some(stripped) = entry.strip_prefix(prefix.trim_end()) {
            entry = stripped;
        }
        if !suffix.is_empty() {
            entry = entry.strip_suffix(suffix).unwrap_or(entry);
        }
        let entry = entry.trim();
        if entry == "End:" {
            break;
        }
        match entry.split_once(':') {
            Some((name, value)) => apply_emacs_variable(&mut out, name, value, strict, idx)?,
            None => malformed(strict, idx, format!("'{entry}' is not 'name: value'"))?,
        }
    }
    Ok(out)
}

// -------------------------------------------------------------------------------------------
// Vim

#[derive(Clone, Copy, PartialEq, Eq)]
enum VimKey {
    CaretLine,
    UseTabs,
    ShiftWidth,
    SoftTabStop,
    TabStop,
    TextWidth,
    FileType,
}

fn vim_key(option: &str) -> Option<(VimKey, bool)> {
    // (key, inverted)
    Some(match option {
        "cursorline" | "cul" | "hcl" => (VimKey::CaretLine, false),
        "nocursorline" | "nocul" | "nohcl" => (VimKey::CaretLine, true),
        "expandtab" | "et" => (VimKey::UseTabs, true),
        "noexpandtab" | "noet" => (VimKey::UseTabs, false),
        "shiftwidth" | "sw" => (VimKey::ShiftWidth, false),
        "softtabstop" | "sts" => (VimKey::SoftTabStop, false),
        "tabstop" | "ts" => (VimKey::TabStop, false),
        "textwidth" | "tw" => (VimKey::TextWidth, false),
        "filetype" | "ft" | "syntax" | "syn" => (VimKey::FileType, false),
        _ => return None,
    })
}

/// Parse `vim:` modelines in `lines`.
///
/// `shiftwidth` wins over `softtabstop` for the indent width whatever their order.
pub fn parse_vim(lines: &[&str], strict: bool) -> Result<Modeline, ModelineError> {
    let mut out = Modeline::default();
    let mut saw_shiftwidth = false;

    for (idx, line) in lines.iter().enumerate() {
        let Some(caps) = VIM.captures(line.trim_end()) else {
            continue;
        };
        let commands = caps.get(1).map_or("", |m| m.as_str()).replace(':', " ");
        for raw in commands.split_whitespace() {
            out.variables.insert(raw.to_string(), String::new());
            let lowered = raw.to_ascii_lowercase();
            let mut inverted = false;
            let mut option = lowered.as_str();
            if let Some(rest) = option.strip_prefix("inv") {
                option = rest;
                inverted = true;
            }
            let owned;
            if option.contains('!') {
                inverted = !inverted;
                owned = option.replace('!', "");
                option = &owned;
            }
            let (option, value) = match option.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (option, None),
            };
            let Some((key, negated)) = vim_key(option) else {
                continue;
            };
            match (key, value) {
                (VimKey::CaretLine, None) => out.caret_line_highlight = Some(negated == inverted),
                (VimKey::UseTabs, None) => out.use_tabs = Some(negated == inverted),
                (VimKey::FileType, Some(name)) if !name.is_empty() => {
                    out.mode = Some(name.to_string());
                }
                (VimKey::ShiftWidth, Some(v)) => {
                    if let Some(n) = parse_count(v, option, strict, idx)? {
                        out.indent = Some(n);
                        saw_shiftwidth = true;
                    }
                }
                (VimKey::SoftTabStop, Some(v)) => {
                    if let Some(n) = parse_count(v, option, strict, idx)?
                        && !saw_shiftwidth
                    {
                        out.indent = Some(n);
                    }
                }
                (VimKey::TabStop, Some(v)) => {
                    out.tab_width = parse_count(v, option, strict, idx)?.or(out.tab_width);
                }
                (VimKey::TextWidth, Some(v)) => {
                    out.edge_column = parse_count(v, option, strict, idx)?.or(out.edge_column);
                }
                _ => malformed(strict, idx, format!("bad value for vim option '{raw}'"))?,
            }
        }
    }
    Ok(out)
}

/// A vim modeline reproducing `settings`, e.g. ` vim: hcl sw=4 ts=8 tw=80:`.
pub fn create_vim_modeline(settings: &ViewSettings) -> String {
    let mut entries = Vec::new();
    entries.push(if settings.caret_line_highlight { "hcl" } else { "nohcl" }.to_string());
    if !settings.use_tabs {
        entries.push("et".to_string());
    }
    entries.push(format!("sw={}", settings.indent));
    entries.push(format!("ts={}", settings.tab_width));
    if settings.edge_column > 0 {
        entries.push(format!("tw={}", settings.edge_column));
    }
    format!(" vim: {}:", entries.join(" "))
}

// -------------------------------------------------------------------------------------------
// Kate

fn kate_truth(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "on" | "true")
}

/// Parse `kate:` variable lines in `lines`.
pub fn parse_kate(lines: &[&str], strict: bool) -> Result<Modeline, ModelineError> {
    let mut out = Modeline::default();
    for (idx, line) in lines.iter().enumerate() {
        let Some(caps) = KATE.captures(line) else {
            continue;
        };
        let vars = caps.get(1).map_or("", |m| m.as_str());
        for entry in vars.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((name, value)) = entry.split_once(char::is_whitespace) else {
                malformed(strict, idx, format!("kate variable '{entry}' has no value"))?;
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            out.variables.insert(name.to_string(), value.to_string());
            match name {
                "tab-width" => out.tab_width = parse_count(value, name, strict, idx)?.or(out.tab_width),
                "indent-width" => out.indent = parse_count(value, name, strict, idx)?.or(out.indent),
                "word-wrap-column" => {
                    out.edge_column = parse_count(value, name, strict, idx)?.or(out.edge_column);
                }
                "space-indent" | "replace-tabs" => out.use_tabs = Some(!kate_truth(value)),
                "show-tabs" => out.view_whitespace = Some(kate_truth(value)),
                "encoding" => out.encoding = Some(value.to_string()),
                _ => {}
            }
        }
    }
    Ok(out)
}

// -------------------------------------------------------------------------------------------
// Whole files

/// Scan `text` leniently with all three parsers.
///
/// Emacs headers are read from the first two lines and its `Local Variables:` block from the
/// last `scan_lines`; vim and kate lines from the first and last `scan_lines`. Later parsers
/// override earlier ones: emacs, then vim, then kate.
pub fn scan(text: &str, scan_lines: usize) -> Modeline {
    let lines: Vec<&str> = text.lines().collect();
    let candidates: Vec<&str> = if lines.len() <= scan_lines * 2 {
        lines.clone()
    } else {
        lines[..scan_lines]
            .iter()
            .chain(&lines[lines.len() - scan_lines..])
            .copied()
            .collect()
    };
    let tail = &lines[lines.len().saturating_sub(scan_lines)..];

    let mut out = Modeline::default();
    if let Ok(header) = parse_emacs(&lines[..lines.len().min(2)], false) {
        out.merge(header);
    }
    if let Ok(local) = parse_emacs(tail, false) {
        out.merge(Modeline {
            // The header's mode is authoritative; the tail block only adds variables.
            mode: out.mode.clone().or(local.mode.clone()),
            ..local
        });
    }
    if let Ok(vim) = parse_vim(&candidates, false) {
        out.merge(vim);
    }
    if let Ok(kate) = parse_kate(&candidates, false) {
        out.merge(kate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_emacs_header_forms() {
        let m = parse_emacs(&["/* -*-C++-*- */"], false).unwrap();
        assert_eq!(m.mode.as_deref(), Some("C++"));

        let m = parse_emacs(&["#!/bin/sh", "# -*- mode: Ksh; tab-width: 4; indent-tabs-mode: nil -*-"], false)
            .unwrap();
        assert_eq!(m.mode.as_deref(), Some("Ksh"));
        assert_eq!(m.tab_width, Some(4));
        assert_eq!(m.use_tabs, Some(false));
        assert_eq!(m.changed(), vec!["mode", "tab_width", "use_tabs"]);
    }

    #[test]
    fn test_vim_toggles() {
        let m = parse_vim(&["# vim: set invhcl noet:"], false).unwrap();
        assert_eq!(m.caret_line_highlight, Some(false));
        assert_eq!(m.use_tabs, Some(true));

        let m = parse_vim(&["# vim: hcl! et!:"], false).unwrap();
        assert_eq!(m.caret_line_highlight, Some(false));
        assert_eq!(m.use_tabs, Some(true));
    }

    #[test]
    fn test_strict_rejects_bad_numbers() {
        assert!(parse_vim(&["vim: ts=abc:"], false).unwrap().tab_width.is_none());
        assert_eq!(
            parse_vim(&["x", "vim: ts=abc:"], true),
            Err(ModelineError::Parse {
                line: 1,
                reason: "ts expects a positive number, got 'abc'".to_string()
            })
        );
        assert!(parse_kate(&["kate: tab-width;"], true).is_err());
    }

    #[test]
    fn test_create_vim_modeline() {
        let settings = ViewSettings {
            caret_line_highlight: true,
            indent: 4,
            tab_width: 8,
            edge_column: 72,
            ..ViewSettings::default()
        };
        let line = create_vim_modeline(&settings);
        assert_eq!(line, " vim: hcl et sw=4 ts=8 tw=72:");
        let parsed = parse_vim(&[&line], true).unwrap();
        let mut applied = ViewSettings::default();
        parsed.apply(&mut applied);
        assert_eq!(applied.indent, 4);
        assert_eq!(applied.edge_column, 72);
        assert!(applied.caret_line_highlight);
    }
}
