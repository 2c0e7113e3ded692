//! Line ending helpers.
//!
//! Documents store text exactly as loaded, including whatever mix of `"\r\n"`, `'\r'` and
//! `'\n'` it contains. The [`EolMode`] of a document is detected on load (majority wins) and is
//! used when new lines are inserted and when the document is serialized.

/// Line ending mode, numbered like the styled text control it mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EolMode {
    /// Classic Mac `'\r'`.
    Cr = 0,
    /// Windows `"\r\n"`.
    Crlf = 1,
    /// Unix `'\n'`.
    Lf = 2,
}

/// Raw line ending counts gathered by [`EolMode::count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EolCounts {
    /// Number of `"\r\n"` pairs.
    pub crlf: usize,
    /// Number of `'\n'` characters (including those in CRLF pairs).
    pub lf: usize,
    /// Number of `'\r'` characters (including those in CRLF pairs).
    pub cr: usize,
}

impl EolMode {
    /// The separator string for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cr => "\r",
            Self::Crlf => "\r\n",
            Self::Lf => "\n",
        }
    }

    /// Short display name (`CR`, `CRLF`, `LF`).
    pub fn name(self) -> &'static str {
        match self {
            Self::Cr => "CR",
            Self::Crlf => "CRLF",
            Self::Lf => "LF",
        }
    }

    /// Integer value of the mode.
    pub fn to_int(self) -> u8 {
        self as u8
    }

    /// Mode from its integer value.
    pub fn from_int(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Cr),
            1 => Some(Self::Crlf),
            2 => Some(Self::Lf),
            _ => None,
        }
    }

    /// Mode matching the separator string, if it is one.
    pub fn from_separator(sep: &str) -> Option<Self> {
        match sep {
            "\r" => Some(Self::Cr),
            "\r\n" => Some(Self::Crlf),
            "\n" => Some(Self::Lf),
            _ => None,
        }
    }

    /// The line ending native to the running platform.
    pub fn platform_default() -> Self {
        if cfg!(windows) { Self::Crlf } else { Self::Lf }
    }

    /// Count line ending characters in `text`.
    pub fn count(text: &str) -> EolCounts {
        let mut counts = EolCounts::default();
        let mut prev_cr = false;
        for ch in text.chars() {
            match ch {
                '\n' => {
                    counts.lf += 1;
                    if prev_cr {
                        counts.crlf += 1;
                    }
                }
                '\r' => counts.cr += 1,
                _ => {}
            }
            prev_cr = ch == '\r';
        }
        counts
    }

    /// Detect the dominant line ending of `text`.
    ///
    /// Policy: with `mx = max(lf, cr)`, CRLF wins if it accounts for at least half of `mx`,
    /// otherwise whichever of LF/CR is the maximum. Text with no line endings at all yields
    /// [`EolMode::platform_default`].
    pub fn detect(text: &str) -> Self {
        Self::from_counts(Self::count(text))
    }

    /// Apply the detection policy to precomputed counts.
    pub fn from_counts(counts: EolCounts) -> Self {
        let mx = counts.lf.max(counts.cr);
        if mx == 0 {
            Self::platform_default()
        } else if counts.crlf > 0 && counts.crlf * 2 >= mx {
            Self::Crlf
        } else if counts.lf == mx {
            Self::Lf
        } else {
            Self::Cr
        }
    }

    /// Rewrite every line ending in `text` to this mode.
    pub fn convert_text(self, text: &str) -> String {
        let target = self.as_str();
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    out.push_str(target);
                }
                '\n' => out.push_str(target),
                _ => out.push(ch),
            }
        }
        out
    }
}

impl std::fmt::Display for EolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_majority() {
        assert_eq!(EolMode::detect("a\r\nb\r\nc\n"), EolMode::Crlf);
        assert_eq!(EolMode::detect("a\nb\nc\r\n"), EolMode::Lf);
        assert_eq!(EolMode::detect("a\rb\rc\n"), EolMode::Cr);
        assert_eq!(EolMode::detect("no newline"), EolMode::platform_default());
    }

    #[test]
    fn test_convert_text() {
        assert_eq!(EolMode::Lf.convert_text("a\r\nb\rc\n"), "a\nb\nc\n");
        assert_eq!(EolMode::Crlf.convert_text("a\nb\r\n"), "a\r\nb\r\n");
        assert_eq!(EolMode::Cr.convert_text("a\r\nb\n"), "a\rb\r");
    }

    #[test]
    fn test_int_round_trip() {
        for mode in [EolMode::Cr, EolMode::Crlf, EolMode::Lf] {
            assert_eq!(EolMode::from_int(mode.to_int()), Some(mode));
        }
        assert_eq!(EolMode::from_int(7), None);
    }
}
