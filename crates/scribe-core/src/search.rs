//! Find and replace.
//!
//! The low-level helpers ([`find_next`], [`find_prev`], [`find_all`]) search a `&str` with a
//! compiled [`Regex`] and report **character offsets**. [`FindService`] builds on them to drive
//! interactive searching through a [`StyledTextCtrl`]:
//!
//! - [`FindFlavor::Literal`] matches the text as typed;
//! - [`FindFlavor::Wildcard`] maps `*` to `.*?` and `?` to `.`;
//! - [`FindFlavor::Regex`] uses the pattern as a regular expression.
//!
//! Searching is smart-cased: a pattern containing an uppercase letter is always case sensitive.
//! Each search selects the match, so the next forward search resumes at the end of the previous
//! match and the next backward search at its start.

use crate::document::DocumentError;
use crate::event::ModificationEvent;
use crate::stc::StyledTextCtrl;
use crate::view::ViewService;
use regex::{Captures, Regex, RegexBuilder};
use std::any::Any;

/// Options that control how search is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// If `true`, performs a case-sensitive search.
    pub case_sensitive: bool,
    /// If `true`, matches only whole words (alphanumeric and `_`).
    pub whole_word: bool,
    /// If `true`, treats the query as a regex pattern.
    pub regex: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            whole_word: false,
            regex: false,
        }
    }
}

/// A match, expressed as a half-open character range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    /// Inclusive start character offset.
    pub start: usize,
    /// Exclusive end character offset.
    pub end: usize,
}

impl SearchMatch {
    /// Returns the length of the match in characters.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if the match is empty.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Search errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The pattern failed to compile.
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),
    /// The replacement could not be applied.
    #[error(transparent)]
    Edit(#[from] DocumentError),
}

#[derive(Debug)]
pub(crate) struct CharIndex {
    char_to_byte: Vec<usize>,
    text_len: usize,
}

impl CharIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut char_to_byte: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        char_to_byte.push(text.len());
        Self {
            char_to_byte,
            text_len: text.len(),
        }
    }

    pub(crate) fn char_count(&self) -> usize {
        self.char_to_byte.len().saturating_sub(1)
    }

    pub(crate) fn char_to_byte(&self, char_offset: usize) -> usize {
        let clamped = char_offset.min(self.char_count());
        self.char_to_byte
            .get(clamped)
            .copied()
            .unwrap_or(self.text_len)
    }

    pub(crate) fn byte_to_char(&self, byte_offset: usize) -> usize {
        let clamped = byte_offset.min(self.text_len);
        match self.char_to_byte.binary_search(&clamped) {
            Ok(idx) | Err(idx) => idx,
        }
    }

    pub(crate) fn char_at(&self, text: &str, char_offset: usize) -> Option<char> {
        if char_offset >= self.char_count() {
            return None;
        }
        let start = self.char_to_byte[char_offset];
        let end = self.char_to_byte[char_offset + 1];
        text.get(start..end)?.chars().next()
    }
}

/// Compile `query` with `options` (escaping it unless `options.regex`).
pub fn compile_search_regex(query: &str, options: SearchOptions) -> Result<Regex, SearchError> {
    let pattern = if options.regex {
        query.to_string()
    } else {
        regex::escape(query)
    };

    Ok(RegexBuilder::new(&pattern)
        .case_insensitive(!options.case_sensitive)
        .multi_line(true)
        .build()?)
}

fn is_word_char(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

fn is_whole_word(text: &str, index: &CharIndex, m: SearchMatch) -> bool {
    if m.is_empty() {
        return false;
    }

    let before = if m.start == 0 {
        None
    } else {
        index.char_at(text, m.start - 1)
    };
    let after = index.char_at(text, m.end);

    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

/// Find the first match of `re` in `text` starting at or after `from_char`.
///
/// Empty matches are skipped.
pub fn find_next(text: &str, re: &Regex, whole_word: bool, from_char: usize) -> Option<SearchMatch> {
    let index = CharIndex::new(text);

    let mut start_char = from_char.min(index.char_count());
    loop {
        let start_byte = index.char_to_byte(start_char);
        let m = re.find_at(text, start_byte)?;

        let start = index.byte_to_char(m.start());
        let end = index.byte_to_char(m.end());
        let candidate = SearchMatch { start, end };

        if candidate.is_empty() {
            if end >= index.char_count() {
                return None;
            }
            start_char = end + 1;
            continue;
        }

        if whole_word && !is_whole_word(text, &index, candidate) {
            start_char = candidate.start + 1;
            continue;
        }

        return Some(candidate);
    }
}

/// Find the last match of `re` in `text` that ends at or before `before_char`.
pub fn find_prev(
    text: &str,
    re: &Regex,
    whole_word: bool,
    before_char: usize,
) -> Option<SearchMatch> {
    let index = CharIndex::new(text);
    let limit_byte = index.char_to_byte(before_char.min(index.char_count()));

    let mut last: Option<SearchMatch> = None;
    for m in re.find_iter(&text[..limit_byte]) {
        let candidate = SearchMatch {
            start: index.byte_to_char(m.start()),
            end: index.byte_to_char(m.end()),
        };
        if candidate.is_empty() {
            continue;
        }
        if whole_word && !is_whole_word(text, &index, candidate) {
            continue;
        }
        last = Some(candidate);
    }
    last
}

/// Find all non-overlapping, non-empty matches of `re` in `text`.
pub fn find_all(text: &str, re: &Regex, whole_word: bool) -> Vec<SearchMatch> {
    let index = CharIndex::new(text);
    re.find_iter(text)
        .map(|m| SearchMatch {
            start: index.byte_to_char(m.start()),
            end: index.byte_to_char(m.end()),
        })
        .filter(|m| !m.is_empty() && (!whole_word || is_whole_word(text, &index, *m)))
        .collect()
}

/// How the find string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindFlavor {
    /// Exact text.
    Literal,
    /// Shell-style `*` and `?` wildcards.
    Wildcard,
    /// Regular expression.
    Regex,
}

/// Translate shell wildcards into a regex; each wildcard becomes a capture group.
pub fn wildcard_to_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        match ch {
            '*' => out.push_str("(.*?)"),
            '?' => out.push_str("(.)"),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out
}

/// Search state shared between successive find and replace calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindSettings {
    /// Case-sensitive unless smart casing forces it.
    pub match_case: bool,
    /// Adapt the case of replacements to the replaced text (literal flavor).
    pub smart_case: bool,
    /// Match whole words only.
    pub whole_word: bool,
    /// Find string as typed.
    pub find: String,
    /// Replacement string as typed.
    pub replace: String,
    /// Position of the first match of the current search.
    pub first_found: Option<usize>,
    /// Set once the search wrapped around the document end.
    pub wrapped: bool,
}

impl Default for FindSettings {
    fn default() -> Self {
        Self {
            match_case: false,
            smart_case: true,
            whole_word: false,
            find: String::new(),
            replace: String::new(),
            first_found: None,
            wrapped: false,
        }
    }
}

/// Result of one find step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOutcome {
    /// The match, if any.
    pub found: Option<SearchMatch>,
    /// Position the search started from.
    pub start: usize,
}

impl FindOutcome {
    /// Match start, or `-1` when nothing was found.
    pub fn match_start(&self) -> isize {
        self.found.map_or(-1, |m| m.start as isize)
    }
}

/// Interactive find/replace over a styled text control.
#[derive(Debug, Clone)]
pub struct FindService {
    flavor: FindFlavor,
    settings: FindSettings,
    regex: Option<Regex>,
}

impl FindService {
    /// Create a service of the given flavor with default settings.
    pub fn new(flavor: FindFlavor) -> Self {
        Self::with_settings(flavor, FindSettings::default())
    }

    /// Create a service reusing existing settings (e.g. when switching flavor).
    pub fn with_settings(flavor: FindFlavor, settings: FindSettings) -> Self {
        let mut service = Self {
            flavor,
            settings,
            regex: None,
        };
        if let Err(err) = service.compile() {
            tracing::warn!(error = %err, "discarding invalid find pattern");
        }
        service
    }

    /// The flavor in use.
    pub fn flavor(&self) -> FindFlavor {
        self.flavor
    }

    /// Current settings.
    pub fn settings(&self) -> &FindSettings {
        &self.settings
    }

    /// Mutable settings; call [`FindService::set_find_string`] again after changing options.
    pub fn settings_mut(&mut self) -> &mut FindSettings {
        &mut self.settings
    }

    /// Whether backward searching is supported.
    pub fn allow_backward(&self) -> bool {
        true
    }

    /// Set the find string and compile it.
    pub fn set_find_string(&mut self, text: &str) -> Result<(), SearchError> {
        self.settings.find = text.to_string();
        self.reset_first_found();
        self.compile()
    }

    /// Set the replacement string.
    pub fn set_replace_string(&mut self, text: &str) {
        self.settings.replace = text.to_string();
    }

    /// Forget where the current search began.
    pub fn reset_first_found(&mut self) {
        self.settings.first_found = None;
        self.settings.wrapped = false;
    }

    /// Returns `true` if `pos` is where the search began after having wrapped.
    pub fn is_entire_document_checked(&self, pos: usize) -> bool {
        self.settings.wrapped && self.settings.first_found == Some(pos)
    }

    fn case_sensitive(&self) -> bool {
        let find = &self.settings.find;
        find.to_lowercase() != *find || self.settings.match_case
    }

    fn compile(&mut self) -> Result<(), SearchError> {
        self.regex = None;
        if self.settings.find.is_empty() {
            return Ok(());
        }
        let (pattern, regex) = match self.flavor {
            FindFlavor::Literal => (self.settings.find.clone(), false),
            FindFlavor::Wildcard => (wildcard_to_regex(&self.settings.find), true),
            FindFlavor::Regex => (self.settings.find.clone(), true),
        };
        let options = SearchOptions {
            case_sensitive: self.case_sensitive(),
            whole_word: self.settings.whole_word,
            regex,
        };
        self.regex = Some(compile_search_regex(&pattern, options)?);
        Ok(())
    }

    fn record_first(&mut self, found: Option<SearchMatch>) {
        if let Some(m) = found
            && self.settings.first_found.is_none()
        {
            self.settings.first_found = Some(m.start);
        }
    }

    /// Find and select the next match.
    ///
    /// `start` defaults to the end of the selection (the start of it for `incremental`
    /// searches). Returns `None` if there is no usable find string.
    pub fn do_find_next(
        &mut self,
        stc: &mut dyn StyledTextCtrl,
        start: Option<usize>,
        incremental: bool,
    ) -> Option<FindOutcome> {
        let re = self.regex.as_ref()?;
        let start = start.unwrap_or_else(|| {
            let (sel_start, sel_end) = stc.get_selection();
            if incremental { sel_start } else { sel_end }
        });
        let text = stc.get_text();
        let found = find_next(&text, re, self.settings.whole_word, start);
        if let Some(m) = found {
            stc.set_selection(m.start, m.end);
        }
        self.record_first(found);
        Some(FindOutcome { found, start })
    }

    /// Find and select the previous match.
    pub fn do_find_prev(
        &mut self,
        stc: &mut dyn StyledTextCtrl,
        start: Option<usize>,
        incremental: bool,
    ) -> Option<FindOutcome> {
        let re = self.regex.as_ref()?;
        let start = start.unwrap_or_else(|| {
            let (sel_start, _) = stc.get_selection();
            if incremental {
                sel_start + self.settings.find.chars().count()
            } else {
                sel_start
            }
        });
        let text = stc.get_text();
        let found = find_prev(&text, re, self.settings.whole_word, start);
        if let Some(m) = found {
            stc.set_selection(m.start, m.end);
        }
        self.record_first(found);
        Some(FindOutcome { found, start })
    }

    /// Returns `true` if something is selected (a match to replace).
    pub fn has_match(&self, stc: &dyn StyledTextCtrl) -> bool {
        let (start, end) = stc.get_selection();
        start != end
    }

    /// The text that replaces `replacing` (a complete match).
    pub fn replacement(&self, replacing: &str) -> String {
        match self.flavor {
            FindFlavor::Literal => self.smart_case_replacement(replacing),
            FindFlavor::Wildcard => self.wildcard_replacement(replacing),
            FindFlavor::Regex => self.regex_replacement(replacing),
        }
    }

    fn smart_case_replacement(&self, replacing: &str) -> String {
        let find = &self.settings.find;
        let replace = &self.settings.replace;
        let has_alpha = replacing.to_uppercase() != replacing.to_lowercase();
        if !(self.settings.smart_case
            && find.to_lowercase() == *find
            && replace.to_lowercase() == *replace
            && has_alpha)
        {
            return replace.clone();
        }
        if replacing.to_uppercase() == replacing {
            return replace.to_uppercase();
        }
        if replacing.to_lowercase() == replacing {
            return replace.to_lowercase();
        }
        if replacing.chars().count() == replace.chars().count() {
            return replacing
                .chars()
                .zip(replace.chars())
                .map(|(from, to)| {
                    if from.is_uppercase() {
                        to.to_uppercase().collect::<String>()
                    } else if from.is_lowercase() {
                        to.to_lowercase().collect::<String>()
                    } else {
                        to.to_string()
                    }
                })
                .collect();
        }
        let first_upper = replacing.chars().next().is_some_and(char::is_uppercase);
        let mut chars = replace.chars();
        match chars.next() {
            Some(first) if first_upper => first.to_uppercase().chain(chars).collect(),
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    fn wildcard_replacement(&self, replacing: &str) -> String {
        let groups: Vec<String> = self
            .regex
            .as_ref()
            .and_then(|re| re.captures(replacing))
            .map(|caps| {
                caps.iter()
                    .skip(1)
                    .map(|g| g.map_or(String::new(), |m| m.as_str().to_string()))
                    .collect()
            })
            .unwrap_or_default();
        let mut index = 0;
        let mut out = String::new();
        for ch in self.settings.replace.chars() {
            if ch == '*' || ch == '?' {
                if let Some(group) = groups.get(index) {
                    out.push_str(group);
                }
                index += 1;
            } else {
                out.push(ch);
            }
        }
        out
    }

    fn regex_replacement(&self, replacing: &str) -> String {
        let Some(caps) = self.regex.as_ref().and_then(|re| re.captures(replacing)) else {
            return replacing.to_string();
        };
        expand_regex_replacement(&self.settings.replace, &caps)
    }

    /// Replace the selected match and select the replacement.
    pub fn do_replace(&mut self, stc: &mut dyn StyledTextCtrl) -> Result<bool, SearchError> {
        let (start, end) = stc.get_selection();
        if start == end {
            return Ok(false);
        }
        let replacing = stc.get_text_range(start, end)?;
        let replacement = self.replacement(&replacing);
        stc.set_target_range(start, end);
        let len = stc.replace_target(&replacement)?;
        stc.set_selection(start, start + len);
        if let Some(first) = self.settings.first_found
            && start < first
        {
            let adjusted = first as isize + len as isize - (end - start) as isize;
            self.settings.first_found = Some(adjusted.max(0) as usize);
        }
        Ok(true)
    }

    /// Replace every match in the document as a single undo step. Returns the count.
    pub fn replace_all(&mut self, stc: &mut dyn StyledTextCtrl) -> Result<usize, SearchError> {
        let Some(re) = self.regex.clone() else {
            return Ok(0);
        };
        let text = stc.get_text();
        let matches = find_all(&text, &re, self.settings.whole_word);
        if matches.is_empty() {
            return Ok(0);
        }
        let index = CharIndex::new(&text);
        stc.begin_undo_action();
        let mut delta: isize = 0;
        let mut result = Ok(());
        for m in &matches {
            let replacing = &text[index.char_to_byte(m.start)..index.char_to_byte(m.end)];
            let replacement = self.replacement(replacing);
            let start = (m.start as isize + delta) as usize;
            let end = (m.end as isize + delta) as usize;
            stc.set_target_range(start, end);
            match stc.replace_target(&replacement) {
                Ok(len) => delta += len as isize - m.len() as isize,
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        stc.end_undo_action();
        result?;
        tracing::debug!(count = matches.len(), "replaced all matches");
        Ok(matches.len())
    }
}

/// Expand `\N`, `\g<N>`, `\u`, `\l`, `\U`, `\L` and `\E` in a regex replacement template.
pub fn expand_regex_replacement(template: &str, caps: &Captures<'_>) -> String {
    #[derive(Clone, Copy)]
    enum Once {
        Upper,
        Lower,
    }
    #[derive(Clone, Copy)]
    enum Until {
        Upper,
        Lower,
    }

    let mut out = String::new();
    let mut once: Option<Once> = None;
    let mut until: Option<Until> = None;

    let mut emit = |piece: &str, once: &mut Option<Once>, until: Option<Until>| {
        if piece.is_empty() {
            return;
        }
        if let Some(kind) = once.take() {
            let mut chars = piece.chars();
            if let Some(first) = chars.next() {
                match kind {
                    Once::Upper => out.extend(first.to_uppercase()),
                    Once::Lower => out.extend(first.to_lowercase()),
                }
                out.push_str(chars.as_str());
            }
        } else {
            match until {
                Some(Until::Upper) => out.push_str(&piece.to_uppercase()),
                Some(Until::Lower) => out.push_str(&piece.to_lowercase()),
                None => out.push_str(piece),
            }
        }
    };

    let chars: Vec<char> = template.chars().collect();
    let mut literal = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            literal.push(chars[i]);
            i += 1;
            continue;
        }
        let next = chars[i + 1];
        let mut group: Option<usize> = None;
        let mut consumed = 2;
        match next {
            'u' | 'l' | 'U' | 'L' | 'E' => {}
            'g' if chars.get(i + 2) == Some(&'<') => {
                let digits: String = chars[i + 3..]
                    .iter()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                if !digits.is_empty() && chars.get(i + 3 + digits.len()) == Some(&'>') {
                    group = digits.parse().ok();
                    consumed = 4 + digits.len();
                } else {
                    literal.push(chars[i]);
                    i += 1;
                    continue;
                }
            }
            d if d.is_ascii_digit() => {
                let mut digits = d.to_string();
                if let Some(d2) = chars.get(i + 2).filter(|c| c.is_ascii_digit()) {
                    digits.push(*d2);
                    consumed = 3;
                }
                group = digits.parse().ok();
            }
            _ => {
                literal.push(chars[i]);
                i += 1;
                continue;
            }
        }

        emit(&std::mem::take(&mut literal), &mut once, until);
        match next {
            'u' => once = Some(Once::Upper),
            'l' => once = Some(Once::Lower),
            'U' => until = Some(Until::Upper),
            'L' => until = Some(Until::Lower),
            'E' => until = None,
            _ => {
                if let Some(value) = group.and_then(|g| caps.get(g)) {
                    emit(value.as_str(), &mut once, until);
                }
            }
        }
        i += consumed;
    }
    emit(&literal, &mut once, until);
    out
}

impl ViewService for FindService {
    fn name(&self) -> &str {
        "find"
    }

    fn on_event(&mut self, event: &ModificationEvent) {
        if event.is_text_change()
            && let Some(first) = self.settings.first_found
            && event.position < first
        {
            self.settings.first_found = Some(event.shift_offset(first));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_translation() {
        assert_eq!(wildcard_to_regex("a*b?.c"), r"a(.*?)b(.)\.c");
    }

    #[test]
    fn test_find_prev_requires_match_before_limit() {
        let re = compile_search_regex("ab", SearchOptions::default()).unwrap();
        assert_eq!(find_prev("ab ab", &re, false, 4), Some(SearchMatch { start: 0, end: 2 }));
        assert_eq!(find_prev("ab ab", &re, false, 5), Some(SearchMatch { start: 3, end: 5 }));
    }

    #[test]
    fn test_regex_replacement_case_escapes() {
        let re = Regex::new(r"(\w+) (\w+)").unwrap();
        let caps = re.captures("hello world").unwrap();
        assert_eq!(expand_regex_replacement(r"\u\2 \U\1\E!", &caps), "World HELLO!");
        assert_eq!(expand_regex_replacement(r"\g<1>-\l\2", &caps), "hello-world");
    }

    #[test]
    fn test_smart_case_replacement() {
        let mut service = FindService::new(FindFlavor::Literal);
        service.set_find_string("blah").unwrap();
        service.set_replace_string("stuff");
        assert_eq!(service.replacement("BLAH"), "STUFF");
        assert_eq!(service.replacement("blah"), "stuff");
        assert_eq!(service.replacement("Blah"), "Stuff");
    }
}
