//! Filename extension to language-name registry.
//!
//! Major modes may declare an Editra "language name" synonym; this registry maps file extensions
//! (and a few well-known bare filenames) to those names so the mode matcher can ask each mode
//! whether it handles the detected language.

use std::collections::HashMap;

/// Extension/filename to language-name registry.
#[derive(Debug, Clone, Default)]
pub struct FileTypeRegistry {
    by_extension: HashMap<String, String>,
    by_filename: HashMap<String, String>,
}

const DEFAULT_EXTENSIONS: &[(&str, &str)] = &[
    ("txt", "Plain Text"),
    ("text", "Plain Text"),
    ("py", "Python"),
    ("pyw", "Python"),
    ("c", "C"),
    ("h", "C"),
    ("cc", "CPP"),
    ("cpp", "CPP"),
    ("cxx", "CPP"),
    ("hh", "CPP"),
    ("hpp", "CPP"),
    ("f", "Fortran 77"),
    ("for", "Fortran 77"),
    ("f90", "Fortran 95"),
    ("f95", "Fortran 95"),
    ("mak", "Makefile"),
    ("mk", "Makefile"),
    ("sh", "Bash Shell Script"),
    ("bash", "Bash Shell Script"),
    ("ksh", "Korn Shell Script"),
    ("html", "HTML"),
    ("htm", "HTML"),
    ("xml", "XML"),
    ("js", "JavaScript"),
    ("rst", "reStructuredText"),
];

const DEFAULT_FILENAMES: &[(&str, &str)] = &[
    ("makefile", "Makefile"),
    ("gnumakefile", "Makefile"),
    (".bashrc", "Bash Shell Script"),
    (".profile", "Bash Shell Script"),
];

impl FileTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in extension table.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (ext, lang) in DEFAULT_EXTENSIONS {
            registry.register_extension(ext, lang);
        }
        for (name, lang) in DEFAULT_FILENAMES {
            registry.register_filename(name, lang);
        }
        registry
    }

    /// Associate an extension (without the dot, case-insensitive) with a language.
    pub fn register_extension(&mut self, ext: &str, language: &str) {
        self.by_extension
            .insert(ext.trim_start_matches('.').to_ascii_lowercase(), language.to_string());
    }

    /// Associate an exact filename (case-insensitive) with a language.
    pub fn register_filename(&mut self, filename: &str, language: &str) {
        self.by_filename
            .insert(filename.to_ascii_lowercase(), language.to_string());
    }

    /// Split the extension off a filename, lowercased. Returns an empty string if none.
    pub fn extension_of(filename: &str) -> String {
        match filename.rfind('.') {
            Some(0) | None => String::new(),
            Some(idx) => filename[idx + 1..].to_ascii_lowercase(),
        }
    }

    /// Look up the language for a filename (the last path component).
    ///
    /// Returns `(extension, language)`; exact filename matches take precedence over extensions.
    pub fn lookup(&self, filename: &str) -> Option<(String, &str)> {
        let lower = filename.to_ascii_lowercase();
        let ext = Self::extension_of(filename);
        if let Some(lang) = self.by_filename.get(&lower) {
            return Some((ext, lang.as_str()));
        }
        let lang = self.by_extension.get(&ext)?;
        Some((ext, lang.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_extension_and_filename() {
        let registry = FileTypeRegistry::with_defaults();
        assert_eq!(
            registry.lookup("hello.PY"),
            Some(("py".to_string(), "Python"))
        );
        assert_eq!(
            registry.lookup("Makefile"),
            Some((String::new(), "Makefile"))
        );
        assert_eq!(registry.lookup("README"), None);
        assert_eq!(registry.lookup(".hidden"), None);
    }
}
