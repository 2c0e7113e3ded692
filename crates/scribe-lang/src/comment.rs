//! Comment delimiters and comment-line splitting.

use regex::Regex;

/// Line comment tokens for a given language.
///
/// `start` is inserted at the beginning of a commented line (e.g. `#`, `//`, `/*`), `end` is
/// appended before the line ending and is empty for languages without a closing token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentDelimiters {
    /// Token that opens a line comment.
    pub start: String,
    /// Token that closes a line comment (may be empty).
    pub end: String,
}

impl CommentDelimiters {
    /// Delimiters with only an opening token (e.g. `#`).
    pub fn line(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: String::new(),
        }
    }

    /// Delimiters with both an opening and a closing token (e.g. `/*` and `*/`).
    pub fn block(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Returns `true` if an opening token is configured.
    pub fn has_start(&self) -> bool {
        !self.start.is_empty()
    }

    /// Returns `true` if a closing token is configured.
    pub fn has_end(&self) -> bool {
        !self.end.is_empty()
    }

    /// Build the splitter regex for these delimiters.
    pub fn splitter(&self) -> CommentSplitter {
        CommentSplitter::new(self)
    }
}

/// A line split into its comment leader, body and trailer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitLine {
    /// Leading whitespace plus any comment-open tokens.
    pub leader: String,
    /// The text between leader and trailer.
    pub body: String,
    /// Any comment-close tokens plus trailing whitespace.
    pub trailer: String,
}

impl SplitLine {
    /// Returns `true` if the body has no visible characters.
    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// Splits lines into `(leader, body, trailer)` using a language's comment delimiters.
///
/// The patterns are:
/// - start and end: `^(\s*(?:START)*)(.*?)((?:END)*\s*$)`
/// - start only: `^(\s*(?:START)*)(.*)($)`
/// - neither: `^(\s*)(.*)($)`
#[derive(Debug, Clone)]
pub struct CommentSplitter {
    regex: Regex,
}

impl CommentSplitter {
    /// Create a splitter for the given delimiters.
    pub fn new(delimiters: &CommentDelimiters) -> Self {
        let start = regex::escape(delimiters.start.trim());
        let end = regex::escape(delimiters.end.trim());
        let pattern = match (start.is_empty(), end.is_empty()) {
            (false, false) => format!(r"^(\s*(?:{start})*)(.*?)((?:{end})*\s*$)"),
            (false, true) => format!(r"^(\s*(?:{start})*)(.*)($)"),
            _ => r"^(\s*)(.*)($)".to_string(),
        };
        // Delimiters are escaped, so only the static fallback can be reached here.
        let regex = Regex::new(&pattern)
            .unwrap_or_else(|_| Regex::new(r"^(\s*)(.*)($)").expect("static pattern"));
        Self { regex }
    }

    /// Split a single line (without its line ending).
    pub fn split(&self, line: &str) -> SplitLine {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(caps) = self.regex.captures(line) else {
            return SplitLine {
                leader: String::new(),
                body: line.to_string(),
                trailer: String::new(),
            };
        };
        let group = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
        SplitLine {
            leader: group(1).to_string(),
            body: group(2).to_string(),
            trailer: group(3).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_hash_comment() {
        let splitter = CommentDelimiters::line("#").splitter();
        let split = splitter.split("    ## some text here\n");
        assert_eq!(split.leader, "    ##");
        assert_eq!(split.body, " some text here");
        assert_eq!(split.trailer, "");
    }

    #[test]
    fn test_split_c_comment() {
        let splitter = CommentDelimiters::block("/*", "*/").splitter();
        let split = splitter.split("  /* body */  ");
        assert_eq!(split.leader, "  /*");
        assert_eq!(split.body, " body ");
        assert_eq!(split.trailer, "*/  ");
    }

    #[test]
    fn test_split_without_delimiters() {
        let splitter = CommentDelimiters::default().splitter();
        let split = splitter.split("\tplain text");
        assert_eq!(split.leader, "\t");
        assert_eq!(split.body, "plain text");
        assert!(split.trailer.is_empty());
        assert!(!split.is_blank());
    }
}
