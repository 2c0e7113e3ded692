//! Major modes.
//!
//! A [`MajorMode`] is a descriptor: the names it answers to, the resources it claims, its
//! comment delimiters, lexer, indenter and class preferences. The editor instantiates the
//! per-view pieces (autoindent, keymap) from it; nothing here holds view state.

use crate::autoindent::{
    Autoindent, BasicAutoindent, CStyleAutoindent, Fortran77Autoindent, MakefileAutoindent,
    NullAutoindent, PythonAutoindent, RegexAutoindent,
};
use crate::error::ModeError;
use crate::paragraph::ParagraphStyle;
use crate::prefs::{ClassPrefs, FUNDAMENTAL, PrefDefault};
use regex::Regex;
use scribe_core::{Document, FoldEntryNamer, LEXER_NULL, LexerRegistry, StyleTable, ViewSettings};
use scribe_highlight_simple::{
    LEXER_BASH, LEXER_CPP, LEXER_FORTRAN77, LEXER_MAKEFILE, LEXER_PYTHON, RegexLexer,
    register_builtins, styles,
};
use scribe_keymap::{KeyMap, KeymapError};
use scribe_lang::CommentDelimiters;
use url::Url;

/// Inspects the first bytes of a resource: `Some(true)` claims it, `Some(false)` refuses it,
/// `None` has no opinion.
pub type MagicFn = fn(&[u8]) -> Option<bool>;

/// Builds a fresh indenter for a view.
pub type AutoindentFactory = fn() -> Box<dyn Autoindent>;

/// Answer of [`MajorMode::verify_editra_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditraMatch {
    /// The mode does not handle the language.
    No,
    /// The mode can edit the language but adds nothing specific to it.
    Generic,
    /// The mode is made for the language.
    Specific,
}

/// Descriptor of a major mode.
#[derive(Debug, Clone)]
pub struct MajorMode {
    keyword: String,
    class_name: String,
    editra_synonyms: Vec<String>,
    aliases: Vec<String>,
    extensions: Vec<String>,
    mimetypes: Vec<String>,
    filename_regex: Option<Regex>,
    about_pages: Vec<String>,
    magic: Option<MagicFn>,
    generic: bool,
    comment: CommentDelimiters,
    lexer_id: u32,
    paragraph: ParagraphStyle,
    autoindent: AutoindentFactory,
    defaults: Vec<(&'static str, PrefDefault)>,
    fold_namer: FoldEntryNamer,
    bindings: Vec<(&'static str, &'static str)>,
}

fn null_autoindent() -> Box<dyn Autoindent> {
    Box::new(NullAutoindent)
}

impl MajorMode {
    /// A mode that claims nothing yet. `class_name` names its preferences section.
    pub fn new(keyword: &str, class_name: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            class_name: class_name.to_string(),
            editra_synonyms: Vec::new(),
            aliases: Vec::new(),
            extensions: Vec::new(),
            mimetypes: Vec::new(),
            filename_regex: None,
            about_pages: Vec::new(),
            magic: None,
            generic: false,
            comment: CommentDelimiters::default(),
            lexer_id: LEXER_NULL,
            paragraph: ParagraphStyle::Plain,
            autoindent: null_autoindent,
            defaults: Vec::new(),
            fold_namer: FoldEntryNamer::All,
            bindings: Vec::new(),
        }
    }

    /// Language names from the file type registry this mode handles.
    pub fn with_editra_synonyms(mut self, names: &[&str]) -> Self {
        self.editra_synonyms = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Extra names accepted by [`MajorMode::verify_keyword`] and shell bangpaths.
    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|s| s.to_ascii_lowercase()).collect();
        self
    }

    /// Filename extensions, without the dot.
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|s| s.to_ascii_lowercase()).collect();
        self
    }

    /// MIME types this mode edits.
    pub fn with_mimetypes(mut self, mimetypes: &[&str]) -> Self {
        self.mimetypes = mimetypes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Filename pattern. An invalid pattern is logged and ignored.
    pub fn with_filename_regex(mut self, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => self.filename_regex = Some(regex),
            Err(err) => {
                tracing::warn!(mode = %self.keyword, %pattern, error = %err, "ignoring filename regex");
            }
        }
        self
    }

    /// `about:` pages opened directly in this mode.
    pub fn with_about_pages(mut self, pages: &[&str]) -> Self {
        self.about_pages = pages.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Content sniffer run on the resource header.
    pub fn with_magic(mut self, magic: MagicFn) -> Self {
        self.magic = Some(magic);
        self
    }

    /// Mark the mode as able to edit any language the filetype registry knows.
    pub fn generic(mut self) -> Self {
        self.generic = true;
        self
    }

    /// Comment delimiters used by comment region and paragraph fill.
    pub fn with_comment(mut self, comment: CommentDelimiters) -> Self {
        self.comment = comment;
        self
    }

    /// Built-in lexer id.
    pub fn with_lexer(mut self, lexer_id: u32) -> Self {
        self.lexer_id = lexer_id;
        self
    }

    /// How paragraphs are found and refilled.
    pub fn with_paragraph(mut self, style: ParagraphStyle) -> Self {
        self.paragraph = style;
        self
    }

    /// Constructor of the autoindent strategy.
    pub fn with_autoindent(mut self, factory: AutoindentFactory) -> Self {
        self.autoindent = factory;
        self
    }

    /// Class preference defaults.
    pub fn with_defaults(mut self, defaults: &[(&'static str, PrefDefault)]) -> Self {
        self.defaults = defaults.to_vec();
        self
    }

    /// Naming of fold explorer entries.
    pub fn with_fold_namer(mut self, namer: FoldEntryNamer) -> Self {
        self.fold_namer = namer;
        self
    }

    /// Key bindings active while this mode drives a view.
    pub fn with_bindings(mut self, bindings: &[(&'static str, &'static str)]) -> Self {
        self.bindings = bindings.to_vec();
        self
    }

    // ---------------------------------------------------------------------------------------
    // Accessors

    /// Name shown to the user and matched by modelines.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Preference class.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Preference lookup order: the mode's own class, then `Fundamental`.
    pub fn hierarchy(&self) -> Vec<&str> {
        if self.class_name == FUNDAMENTAL {
            vec![FUNDAMENTAL]
        } else {
            vec![self.class_name.as_str(), FUNDAMENTAL]
        }
    }

    /// Comment delimiters.
    pub fn comment(&self) -> &CommentDelimiters {
        &self.comment
    }

    /// Built-in lexer id.
    pub fn lexer_id(&self) -> u32 {
        self.lexer_id
    }

    /// Paragraph style.
    pub fn paragraph_style(&self) -> ParagraphStyle {
        self.paragraph
    }

    /// Fold entry naming.
    pub fn fold_namer(&self) -> &FoldEntryNamer {
        &self.fold_namer
    }

    /// Returns `true` if the mode accepts any text language as a weak match.
    pub fn is_generic(&self) -> bool {
        self.generic
    }

    /// MIME types claimed by the mode.
    pub fn mimetypes(&self) -> &[String] {
        &self.mimetypes
    }

    /// A new indenter for one view.
    pub fn create_autoindent(&self) -> Box<dyn Autoindent> {
        (self.autoindent)()
    }

    /// The mode's keymap, or `None` if it binds nothing.
    pub fn keymap(&self) -> Result<Option<KeyMap>, KeymapError> {
        if self.bindings.is_empty() {
            return Ok(None);
        }
        let mut keymap = KeyMap::new(&self.keyword);
        for (keys, action) in &self.bindings {
            keymap.bind(keys, action)?;
        }
        Ok(Some(keymap))
    }

    // ---------------------------------------------------------------------------------------
    // Matching hooks

    /// Claim `url` outright, before any content is read.
    pub fn verify_protocol(&self, url: &Url) -> bool {
        url.scheme() == "about" && self.about_pages.iter().any(|p| p == url.path())
    }

    /// Returns `true` if the mode claims `mimetype`.
    pub fn verify_mimetype(&self, mimetype: &str) -> bool {
        self.mimetypes.iter().any(|m| m == mimetype)
    }

    /// Match the last path component against the extensions and the filename regex.
    pub fn verify_filename(&self, filename: &str) -> bool {
        let ext = scribe_lang::FileTypeRegistry::extension_of(filename);
        (!ext.is_empty() && self.extensions.contains(&ext))
            || self
                .filename_regex
                .as_ref()
                .is_some_and(|re| re.is_match(filename))
    }

    /// Whether the mode handles language `language` (as named by the filetype registry).
    pub fn verify_editra_type(&self, language: Option<&str>) -> EditraMatch {
        match language {
            Some(lang) if self.editra_synonyms.iter().any(|s| s == lang) => EditraMatch::Specific,
            Some(_) if self.generic => EditraMatch::Generic,
            _ => EditraMatch::No,
        }
    }

    /// `Some(true)` if the header is recognized, `Some(false)` if it is rejected, `None`
    /// without an opinion.
    pub fn verify_magic(&self, header: &[u8]) -> Option<bool> {
        self.magic.and_then(|magic| magic(header))
    }

    /// Case-insensitive match against the keyword, the language synonyms and the aliases.
    pub fn verify_keyword(&self, name: &str) -> bool {
        let name = name.trim().to_ascii_lowercase();
        !name.is_empty()
            && (self.keyword.to_ascii_lowercase() == name
                || self.editra_synonyms.iter().any(|s| s.to_ascii_lowercase() == name)
                || self.aliases.contains(&name))
    }

    /// Names that a shell bangpath may mention.
    pub(crate) fn shell_names(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.keyword.to_ascii_lowercase()).chain(self.aliases.iter().cloned())
    }

    // ---------------------------------------------------------------------------------------
    // Installation

    /// Install this mode's lexer and style table on `doc`, passing the view's tab width to the
    /// lexer.
    pub fn apply(
        &self,
        doc: &mut Document,
        lexers: &LexerRegistry,
        settings: &ViewSettings,
    ) -> Result<(), ModeError> {
        let lexer = lexers.create(self.lexer_id).ok_or_else(|| ModeError::MajorModeLoad {
            keyword: self.keyword.clone(),
            reason: format!("no lexer registered with id {}", self.lexer_id),
        })?;
        doc.set_style_table(StyleTable::new(styles::TABLE));
        doc.set_lexer(Some(lexer));
        doc.set_lexer_property("tab.size", &settings.tab_width.to_string());
        tracing::debug!(mode = %self.keyword, lexer = self.lexer_id, "applied major mode");
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------
// Built-in modes

fn basic_autoindent() -> Box<dyn Autoindent> {
    Box::new(BasicAutoindent)
}

fn python_autoindent() -> Box<dyn Autoindent> {
    Box::new(PythonAutoindent)
}

fn c_autoindent() -> Box<dyn Autoindent> {
    Box::new(CStyleAutoindent::new())
}

fn fortran_autoindent() -> Box<dyn Autoindent> {
    Box::new(Fortran77Autoindent::new())
}

fn makefile_autoindent() -> Box<dyn Autoindent> {
    Box::new(MakefileAutoindent)
}

fn bash_autoindent() -> Box<dyn Autoindent> {
    Box::new(RegexAutoindent::bash())
}

/// Diff files pair `--- ` and `+++ ` lines at the start of every block.
fn diff_magic(header: &[u8]) -> Option<bool> {
    let text = String::from_utf8_lossy(header);
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        if line.starts_with("--- ") {
            return Some(lines.next().is_some_and(|next| next.starts_with("+++ ")));
        }
    }
    Some(false)
}

fn fundamental() -> MajorMode {
    MajorMode::new("Fundamental", FUNDAMENTAL)
        .with_aliases(&["text", "plain", "fundamental"])
        .with_editra_synonyms(&["Plain Text"])
        .with_extensions(&["txt", "text"])
        .with_mimetypes(&["text/plain"])
        .with_about_pages(&["blank", "scratch"])
        .generic()
        .with_autoindent(basic_autoindent)
}

fn python() -> MajorMode {
    MajorMode::new("Python", "PythonMode")
        .with_editra_synonyms(&["Python"])
        .with_aliases(&["py", "python3"])
        .with_extensions(&["py", "pyw"])
        .with_mimetypes(&["text/x-python"])
        .with_comment(CommentDelimiters::line("#"))
        .with_lexer(LEXER_PYTHON)
        .with_paragraph(ParagraphStyle::Python)
        .with_autoindent(python_autoindent)
        .with_fold_namer(FoldEntryNamer::prefixes(&["def", "class", "async def"]))
        .with_defaults(&[
            ("tab_size", PrefDefault::Int(8)),
            ("indent_size", PrefDefault::Int(4)),
            ("use_tabs", PrefDefault::Bool(false)),
            ("edge_column", PrefDefault::Int(80)),
        ])
        .with_bindings(&[("M-;", "comment-region")])
}

fn c() -> MajorMode {
    MajorMode::new("C", "CMode")
        .with_editra_synonyms(&["C", "CPP"])
        .with_aliases(&["c++", "cpp"])
        .with_extensions(&["c", "h", "cc", "cpp", "cxx", "hh", "hpp"])
        .with_mimetypes(&["text/x-csrc", "text/x-chdr", "text/x-c++src"])
        .with_comment(CommentDelimiters::block("/*", "*/"))
        .with_lexer(LEXER_CPP)
        .with_paragraph(ParagraphStyle::CBlockComment)
        .with_autoindent(c_autoindent)
        .with_fold_namer(FoldEntryNamer::c_like())
        .with_defaults(&[("indent_size", PrefDefault::Int(4))])
        .with_bindings(&[("M-;", "comment-region")])
}

fn fortran77() -> MajorMode {
    MajorMode::new("Fortran77", "Fortran77Mode")
        .with_editra_synonyms(&["Fortran 77"])
        .with_aliases(&["fortran", "f77"])
        .with_extensions(&["f", "for", "f77"])
        .with_mimetypes(&["text/x-fortran"])
        .with_comment(CommentDelimiters::line("*"))
        .with_lexer(LEXER_FORTRAN77)
        .with_autoindent(fortran_autoindent)
        .with_fold_namer(FoldEntryNamer::prefixes(&[
            "program", "subroutine", "function", "PROGRAM", "SUBROUTINE", "FUNCTION",
        ]))
        .with_defaults(&[("edge_column", PrefDefault::Int(72))])
}

fn makefile() -> MajorMode {
    MajorMode::new("Makefile", "MakefileMode")
        .with_editra_synonyms(&["Makefile"])
        .with_aliases(&["make", "makefile-gmake"])
        .with_extensions(&["mak", "mk"])
        .with_mimetypes(&["text/x-makefile"])
        .with_filename_regex(r"(?i)^(GNU)?makefile(\..*)?$")
        .with_comment(CommentDelimiters::line("#"))
        .with_lexer(LEXER_MAKEFILE)
        .with_autoindent(makefile_autoindent)
        .with_defaults(&[
            ("tab_size", PrefDefault::Int(8)),
            ("indent_size", PrefDefault::Int(8)),
            ("use_tabs", PrefDefault::Bool(true)),
            ("word_wrap", PrefDefault::Bool(true)),
        ])
}

fn bash() -> MajorMode {
    MajorMode::new("Bash", "BashMode")
        .with_editra_synonyms(&["Bash Shell Script", "Korn Shell Script"])
        .with_aliases(&["sh", "shell-script", "ksh"])
        .with_extensions(&["sh", "bash", "ksh"])
        .with_mimetypes(&["application/x-shellscript", "application/x-sh"])
        .with_comment(CommentDelimiters::line("#"))
        .with_lexer(LEXER_BASH)
        .with_autoindent(bash_autoindent)
        .with_defaults(&[("indent_size", PrefDefault::Int(2))])
}

fn diff() -> MajorMode {
    MajorMode::new("DiffEdit", "DiffEditMode")
        .with_editra_synonyms(&["Diff File"])
        .with_aliases(&["diff", "patch"])
        .with_extensions(&["diff", "patch"])
        .with_mimetypes(&["text/x-diff", "text/x-patch"])
        .with_magic(diff_magic)
        .with_fold_namer(FoldEntryNamer::prefixes(&["diff "]))
        .with_defaults(&[("use_tabs", PrefDefault::Bool(false))])
}

/// Registered major modes, in registration order, plus the lexers they instantiate.
#[derive(Debug, Clone)]
pub struct MajorModeRegistry {
    modes: Vec<MajorMode>,
    lexers: LexerRegistry,
}

impl Default for MajorModeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MajorModeRegistry {
    /// An empty registry; plain text uses an indentation-folding lexer.
    pub fn new() -> Self {
        let mut lexers = LexerRegistry::new();
        lexers.register(LEXER_NULL, || Box::new(RegexLexer::text()));
        Self {
            modes: Vec::new(),
            lexers,
        }
    }

    /// Registry with the built-in modes: Fundamental, Python, C, Fortran77, Makefile, Bash and
    /// DiffEdit.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry.lexers);
        for mode in [fundamental(), python(), c(), fortran77(), makefile(), bash(), diff()] {
            registry.register(mode);
        }
        registry
    }

    /// Add a mode. A mode with the same keyword is replaced in place.
    pub fn register(&mut self, mode: MajorMode) {
        match self.modes.iter_mut().find(|m| m.keyword == mode.keyword) {
            Some(slot) => *slot = mode,
            None => self.modes.push(mode),
        }
    }

    /// The mode named exactly `keyword`.
    pub fn get(&self, keyword: &str) -> Option<&MajorMode> {
        self.modes.iter().find(|m| m.keyword == keyword)
    }

    /// The first mode answering to `name` (keyword, language name or alias).
    pub fn find_by_keyword(&self, name: &str) -> Option<&MajorMode> {
        self.modes.iter().find(|m| m.verify_keyword(name))
    }

    /// The first mode claiming `mimetype`.
    pub fn find_by_mimetype(&self, mimetype: &str) -> Option<&MajorMode> {
        self.modes.iter().find(|m| m.verify_mimetype(mimetype))
    }

    /// Modes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &MajorMode> {
        self.modes.iter()
    }

    /// Number of registered modes.
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Returns `true` if no mode is registered.
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Lexers available to the modes.
    pub fn lexers(&self) -> &LexerRegistry {
        &self.lexers
    }

    /// Mutable access to the lexers.
    pub fn lexers_mut(&mut self) -> &mut LexerRegistry {
        &mut self.lexers
    }

    /// Register every mode's class defaults with `prefs`.
    pub fn register_prefs(&self, prefs: &mut ClassPrefs) {
        for mode in &self.modes {
            if !mode.defaults.is_empty() {
                prefs.register_defaults(&mode.class_name, &mode.defaults);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_keyword_and_alias_lookup() {
        let registry = MajorModeRegistry::with_builtins();
        assert_eq!(registry.find_by_keyword("python").unwrap().keyword(), "Python");
        assert_eq!(registry.find_by_keyword("C++").unwrap().keyword(), "C");
        assert_eq!(registry.find_by_keyword("sh").unwrap().keyword(), "Bash");
        assert_eq!(registry.find_by_keyword("Fortran 77").unwrap().keyword(), "Fortran77");
        assert!(registry.find_by_keyword("cobol").is_none());
        assert!(registry.find_by_keyword("").is_none());
    }

    #[test]
    fn test_editra_matches() {
        let registry = MajorModeRegistry::with_builtins();
        let text = registry.get("Fundamental").unwrap();
        let python = registry.get("Python").unwrap();
        assert_eq!(python.verify_editra_type(Some("Python")), EditraMatch::Specific);
        assert_eq!(python.verify_editra_type(Some("C")), EditraMatch::No);
        assert_eq!(text.verify_editra_type(Some("Python")), EditraMatch::Generic);
        assert_eq!(text.verify_editra_type(None), EditraMatch::No);
    }

    #[test]
    fn test_filename_hooks() {
        let registry = MajorModeRegistry::with_builtins();
        let make = registry.get("Makefile").unwrap();
        assert!(make.verify_filename("GNUmakefile"));
        assert!(make.verify_filename("rules.mk"));
        assert!(!make.verify_filename("make.py"));
        let about = Url::parse("about:scratch").unwrap();
        assert!(registry.get("Fundamental").unwrap().verify_protocol(&about));
        assert!(!make.verify_protocol(&about));
    }

    #[test]
    fn test_diff_magic() {
        assert_eq!(diff_magic(b"intro\n--- a/x\n+++ b/x\n"), Some(true));
        assert_eq!(diff_magic(b"--- not a diff\nbody\n"), Some(false));
        assert_eq!(diff_magic(b"nothing here"), Some(false));
    }

    #[test]
    fn test_hierarchy_and_prefs() {
        let registry = MajorModeRegistry::with_builtins();
        let mut prefs = ClassPrefs::new();
        registry.register_prefs(&mut prefs);
        let make = registry.get("Makefile").unwrap();
        assert_eq!(make.hierarchy(), vec!["MakefileMode", FUNDAMENTAL]);
        let settings = prefs.view_settings(&make.hierarchy());
        assert!(settings.use_tabs);
        assert_eq!(settings.indent, 8);
        assert_eq!(registry.get("Fundamental").unwrap().hierarchy(), vec![FUNDAMENTAL]);
    }

    #[test]
    fn test_apply_without_lexer_fails() {
        let mut registry = MajorModeRegistry::new();
        registry.register(MajorMode::new("Broken", "BrokenMode").with_lexer(9999));
        let mode = registry.get("Broken").unwrap();
        let mut doc = Document::from_text("x");
        let err = mode
            .apply(&mut doc, registry.lexers(), &ViewSettings::default())
            .unwrap_err();
        assert!(matches!(err, ModeError::MajorModeLoad { .. }));
    }
}
