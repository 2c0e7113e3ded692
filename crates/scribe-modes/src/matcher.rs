//! Choosing the major mode of a resource.
//!
//! The checks run in a fixed order and the first decisive one wins:
//!
//! 1. a mode that claims the URL outright (`about:` pages);
//! 2. a `mode:` (emacs) or `ft=` (vim) modeline, which overrides the filename;
//! 3. a shell bangpath naming a mode;
//! 4. any mode whose magic-byte test claims the header;
//! 5. modes matched by mimetype, filename or filetype registry language, specific matches
//!    before generic ones; a candidate whose magic test claims the header beats the first
//!    one without an opinion, and candidates refusing the header are dropped;
//! 6. the `text/plain` mode.
//!
//! A resource that does not exist yet is matched on its URL alone.

use crate::major::{EditraMatch, MajorMode, MajorModeRegistry};
use crate::modeline::{self, DEFAULT_SCAN_LINES};
use regex::Regex;
use scribe_core::VfsMetadata;
use scribe_core::vfs::guess_mimetype;
use scribe_lang::FileTypeRegistry;
use url::Url;

/// Number of leading bytes read for magic and modeline checks.
pub const MAGIC_SIZE: usize = 1024;

/// Which check picked the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// The mode claims the URL itself.
    Protocol,
    /// Filename, mimetype or filetype language, confirmed by magic bytes.
    MagicOverUrl,
    /// A modeline named the mode.
    Modeline,
    /// A `#!` line named the mode.
    Bangpath,
    /// The mode recognized the header bytes.
    Magic,
    /// Filename, mimetype or filetype language.
    Url,
    /// Nothing matched.
    Fallback,
}

/// Outcome of [`ModeMatcher::match_mode`].
#[derive(Debug, Clone, Copy)]
pub struct ModeMatch<'a> {
    /// The chosen mode.
    pub mode: &'a MajorMode,
    /// The deciding check.
    pub rule: MatchRule,
}

/// Maps resources to major modes.
#[derive(Debug, Clone)]
pub struct ModeMatcher {
    modes: MajorModeRegistry,
    filetypes: FileTypeRegistry,
}

impl Default for ModeMatcher {
    fn default() -> Self {
        Self::new(MajorModeRegistry::with_builtins(), FileTypeRegistry::with_defaults())
    }
}

fn file_name(url: &Url) -> String {
    url.path().rsplit('/').next().unwrap_or_default().to_string()
}

fn found(mode: &MajorMode, rule: MatchRule) -> Option<ModeMatch<'_>> {
    tracing::debug!(mode = %mode.keyword(), ?rule, "matched major mode");
    Some(ModeMatch { mode, rule })
}

impl ModeMatcher {
    /// Create a matcher over `modes`, resolving filename languages with `filetypes`.
    pub fn new(modes: MajorModeRegistry, filetypes: FileTypeRegistry) -> Self {
        Self { modes, filetypes }
    }

    /// The registered modes.
    pub fn modes(&self) -> &MajorModeRegistry {
        &self.modes
    }

    /// Mutable access to the registered modes.
    pub fn modes_mut(&mut self) -> &mut MajorModeRegistry {
        &mut self.modes
    }

    /// The mode named `keyword`, as typed by the user.
    pub fn match_keyword(&self, keyword: &str) -> Option<&MajorMode> {
        self.modes.find_by_keyword(keyword)
    }

    /// The mode that handles plain text.
    pub fn fallback(&self) -> Option<&MajorMode> {
        self.modes
            .find_by_mimetype("text/plain")
            .or_else(|| self.modes.iter().next())
    }

    /// Choose the mode of a resource.
    ///
    /// `header` holds the first [`MAGIC_SIZE`] bytes, or is `None` when the resource does not
    /// exist yet; then only the URL is considered. Returns `None` only if no mode is registered.
    pub fn match_mode(
        &self,
        url: Option<&Url>,
        metadata: Option<&VfsMetadata>,
        header: Option<&[u8]>,
    ) -> Option<ModeMatch<'_>> {
        if let Some(url) = url
            && let Some(mode) = self.modes.iter().find(|m| m.verify_protocol(url))
        {
            return found(mode, MatchRule::Protocol);
        }

        let candidates = url.map(|url| self.scan_url(url, metadata)).unwrap_or_default();
        let Some(header) = header else {
            return match candidates.first() {
                Some(mode) => found(mode, MatchRule::Url),
                None => found(self.fallback()?, MatchRule::Fallback),
            };
        };

        let verdicts: Vec<Option<bool>> = candidates.iter().map(|m| m.verify_magic(header)).collect();
        let url_match = verdicts
            .iter()
            .position(|v| *v == Some(true))
            .map(|i| (candidates[i], MatchRule::MagicOverUrl))
            .or_else(|| {
                verdicts
                    .iter()
                    .position(Option::is_none)
                    .map(|i| (candidates[i], MatchRule::Url))
            });
        if let Some(mode) = self.scan_modeline(header) {
            return found(mode, MatchRule::Modeline);
        }
        if let Some(mode) = self.scan_shell(header) {
            return found(mode, MatchRule::Bangpath);
        }
        if let Some(mode) = self.modes.iter().find(|m| m.verify_magic(header) == Some(true)) {
            return found(mode, MatchRule::Magic);
        }
        if let Some((mode, rule)) = url_match {
            return found(mode, rule);
        }
        found(self.fallback()?, MatchRule::Fallback)
    }

    /// Modes matching the URL: specific matches in registration order, then generic ones.
    fn scan_url(&self, url: &Url, metadata: Option<&VfsMetadata>) -> Vec<&MajorMode> {
        let name = file_name(url);
        let mimetype = metadata
            .and_then(|m| m.mimetype.clone())
            .or_else(|| guess_mimetype(&name).map(str::to_string));
        let language = self.filetypes.lookup(&name).map(|(_, lang)| lang);

        let mut specific: Vec<&MajorMode> = Vec::new();
        let mut generic: Vec<&MajorMode> = Vec::new();
        for mode in self.modes.iter() {
            let by_name = mimetype.as_deref().is_some_and(|mt| mode.verify_mimetype(mt))
                || mode.verify_filename(&name);
            match mode.verify_editra_type(language) {
                EditraMatch::Specific => specific.push(mode),
                EditraMatch::Generic if !by_name => generic.push(mode),
                _ if by_name => specific.push(mode),
                _ => {}
            }
        }
        if specific.len() > 1 {
            tracing::warn!(
                url = %url,
                modes = ?specific.iter().map(|m| m.keyword()).collect::<Vec<_>>(),
                "several major modes match; using the first registered"
            );
        }
        specific.extend(generic);
        specific
    }

    fn scan_modeline(&self, header: &[u8]) -> Option<&MajorMode> {
        let text = String::from_utf8_lossy(header);
        let name = modeline::scan(&text, DEFAULT_SCAN_LINES).mode?;
        let mode = self.modes.find_by_keyword(&name);
        if mode.is_none() {
            tracing::debug!(%name, "modeline names an unknown mode");
        }
        mode
    }

    /// A mode whose name appears as a whole word on the `#!` line.
    fn scan_shell(&self, header: &[u8]) -> Option<&MajorMode> {
        if !header.starts_with(b"#!") {
            return None;
        }
        let text = String::from_utf8_lossy(header);
        let bangpath = text.lines().next()?.to_lowercase();
        self.modes.iter().find(|mode| {
            mode.shell_names().any(|name| {
                let pattern = format!(r"\W{}(\W|$)", regex::escape(&name));
                Regex::new(&pattern).is_ok_and(|re| re.is_match(&bangpath))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> ModeMatcher {
        ModeMatcher::default()
    }

    #[test]
    fn test_bangpath_word_boundaries() {
        let m = matcher();
        let keyword = |h: &[u8]| m.scan_shell(h).map(|mode| mode.keyword().to_string());
        assert_eq!(keyword(b"#!/usr/bin/env python\n"), Some("Python".to_string()));
        assert_eq!(keyword(b"#!/bin/sh -e\n"), Some("Bash".to_string()));
        assert_eq!(keyword(b"#!/usr/bin/pythonista\n"), None);
        assert_eq!(keyword(b"no bangpath python\n"), None);
    }

    #[test]
    fn test_file_name() {
        let url = Url::parse("file:///tmp/src/main.c").unwrap();
        assert_eq!(file_name(&url), "main.c");
        assert_eq!(file_name(&Url::parse("about:blank").unwrap()), "blank");
        assert_eq!(file_name(&Url::parse("mem:notes/todo.txt").unwrap()), "todo.txt");
    }
}
