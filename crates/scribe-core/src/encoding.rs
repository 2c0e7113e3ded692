//! Text encoding detection, decoding and encoding.
//!
//! The buffer keeps Unicode text; encodings only matter at load and save time. Detection looks
//! at the first [`HEADER_SIZE`] bytes for a byte order mark, then for an explicit
//! `coding:`/`encoding=` directive, and falls back to UTF-8, then Latin-1. Content that cannot be
//! decoded and looks non-textual is loaded verbatim as [`TextEncoding::Binary`].

use regex::bytes::Regex;
use std::sync::OnceLock;

/// Number of leading bytes inspected during detection.
pub const HEADER_SIZE: usize = 1024;

/// Percentage of non-printable bytes above which content is considered binary.
pub const BINARY_THRESHOLD_PERCENT: usize = 10;

/// Supported text encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// UTF-8 without a byte order mark.
    Utf8,
    /// UTF-8 with a byte order mark (`EF BB BF`).
    Utf8Sig,
    /// UTF-16 little endian with BOM.
    Utf16Le,
    /// UTF-16 big endian with BOM.
    Utf16Be,
    /// ISO-8859-1.
    Latin1,
    /// 7-bit ASCII.
    Ascii,
    /// Raw bytes mapped 1:1 to `U+0000..=U+00FF`.
    Binary,
}

/// Errors raised while converting between bytes and text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// A character cannot be represented in the target encoding.
    #[error("cannot encode {ch:?} at position {position} as {encoding}")]
    Unencodable {
        /// Target encoding name.
        encoding: &'static str,
        /// Character offset of the offending character.
        position: usize,
        /// The offending character.
        ch: char,
    },
    /// The bytes are not valid in the source encoding.
    #[error("invalid {encoding} data at byte {offset}")]
    Invalid {
        /// Source encoding name.
        encoding: &'static str,
        /// Byte offset of the first invalid sequence.
        offset: usize,
    },
    /// The encoding name is not recognized.
    #[error("unknown encoding: {0}")]
    Unknown(String),
}

impl TextEncoding {
    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Sig => "utf-8-sig",
            Self::Utf16Le => "utf-16-le",
            Self::Utf16Be => "utf-16-be",
            Self::Latin1 => "latin-1",
            Self::Ascii => "ascii",
            Self::Binary => "binary",
        }
    }

    /// Parse a user-supplied or declared encoding name.
    pub fn from_name(name: &str) -> Result<Self, EncodingError> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        let encoding = match normalized.as_str() {
            "utf-8" | "utf8" | "u8" => Self::Utf8,
            "utf-8-sig" | "utf8-sig" => Self::Utf8Sig,
            "utf-16-le" | "utf-16le" | "utf16le" => Self::Utf16Le,
            "utf-16-be" | "utf-16be" | "utf16be" => Self::Utf16Be,
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" | "cp819" => Self::Latin1,
            "ascii" | "us-ascii" | "646" => Self::Ascii,
            "binary" => Self::Binary,
            _ => return Err(EncodingError::Unknown(name.to_string())),
        };
        Ok(encoding)
    }

    /// The byte order mark written before the encoded text.
    pub fn bom(self) -> &'static [u8] {
        match self {
            Self::Utf8Sig => &[0xEF, 0xBB, 0xBF],
            Self::Utf16Le => &[0xFF, 0xFE],
            Self::Utf16Be => &[0xFE, 0xFF],
            _ => &[],
        }
    }

    /// Encode `text` (including the BOM, if any).
    pub fn encode(self, text: &str) -> Result<Vec<u8>, EncodingError> {
        let mut out = Vec::with_capacity(text.len() + 3);
        out.extend_from_slice(self.bom());
        match self {
            Self::Utf8 | Self::Utf8Sig => out.extend_from_slice(text.as_bytes()),
            Self::Utf16Le => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            Self::Utf16Be => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
            Self::Latin1 | Self::Binary | Self::Ascii => {
                let limit = if self == Self::Ascii { 0x7F } else { 0xFF };
                for (position, ch) in text.chars().enumerate() {
                    let code = ch as u32;
                    if code > limit {
                        return Err(EncodingError::Unencodable {
                            encoding: self.name(),
                            position,
                            ch,
                        });
                    }
                    out.push(code as u8);
                }
            }
        }
        Ok(out)
    }

    /// Decode `bytes`, skipping a leading BOM that belongs to this encoding.
    pub fn decode(self, bytes: &[u8]) -> Result<String, EncodingError> {
        let bom = self.bom();
        let body = bytes.strip_prefix(bom).unwrap_or(bytes);
        match self {
            Self::Utf8 | Self::Utf8Sig => match std::str::from_utf8(body) {
                Ok(s) => Ok(s.to_string()),
                Err(err) => Err(EncodingError::Invalid {
                    encoding: self.name(),
                    offset: err.valid_up_to() + bom.len(),
                }),
            },
            Self::Utf16Le | Self::Utf16Be => {
                if body.len() % 2 != 0 {
                    return Err(EncodingError::Invalid {
                        encoding: self.name(),
                        offset: bytes.len() - 1,
                    });
                }
                let units: Vec<u16> = body
                    .chunks_exact(2)
                    .map(|pair| {
                        let pair = [pair[0], pair[1]];
                        if self == Self::Utf16Le {
                            u16::from_le_bytes(pair)
                        } else {
                            u16::from_be_bytes(pair)
                        }
                    })
                    .collect();
                String::from_utf16(&units).map_err(|_| EncodingError::Invalid {
                    encoding: self.name(),
                    offset: bom.len(),
                })
            }
            Self::Ascii => {
                if let Some(offset) = body.iter().position(|b| *b > 0x7F) {
                    return Err(EncodingError::Invalid {
                        encoding: self.name(),
                        offset,
                    });
                }
                Ok(body.iter().map(|b| *b as char).collect())
            }
            Self::Latin1 | Self::Binary => Ok(body.iter().map(|b| *b as char).collect()),
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How an encoding was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    /// A byte order mark was present.
    Bom,
    /// A `coding:` or `encoding=` directive named it.
    Declared,
    /// Fallback after trying UTF-8.
    Fallback,
    /// Content was classified as binary.
    Binary,
}

/// Result of decoding a loaded resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// Decoded text.
    pub text: String,
    /// Encoding used; reused when saving.
    pub encoding: TextEncoding,
    /// How the encoding was chosen.
    pub source: EncodingSource,
    /// Set when a declared encoding failed and the loader had to fall back.
    pub decode_error: Option<EncodingError>,
}

impl DecodedText {
    /// Returns `true` if the content was loaded verbatim as binary.
    pub fn is_binary(&self) -> bool {
        self.encoding == TextEncoding::Binary
    }
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:coding[:=]\s*|encoding\s*=\s*["'])([-\w.]+)"#).expect("static pattern")
    })
}

/// Detect a byte order mark at the start of `bytes`.
pub fn detect_bom(bytes: &[u8]) -> Option<TextEncoding> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some(TextEncoding::Utf8Sig)
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        Some(TextEncoding::Utf16Le)
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        Some(TextEncoding::Utf16Be)
    } else {
        None
    }
}

/// Find an explicit encoding directive in the first two lines of `header`.
///
/// Recognizes emacs/PEP-263 style `coding: NAME` / `coding=NAME` and XML
/// `encoding="NAME"`. Returns the raw declared name.
pub fn detect_declared(header: &[u8]) -> Option<String> {
    let header = &header[..header.len().min(HEADER_SIZE)];
    let lines = header
        .split(|b| *b == b'\n' || *b == b'\r')
        .filter(|l| !l.is_empty());
    for line in lines.take(2) {
        if let Some(caps) = directive_regex().captures(line) {
            let name = caps.get(1)?.as_bytes();
            return Some(String::from_utf8_lossy(name).into_owned());
        }
    }
    None
}

/// Heuristic binary check over the first `amount` bytes.
///
/// A byte counts as non-printable if it is below 8, between 14 and 31, or above 126. The data is
/// binary if such bytes exceed `percentage` percent of the inspected range.
pub fn guess_binary(bytes: &[u8], amount: usize, percentage: usize) -> bool {
    let end = bytes.len().min(amount);
    if end == 0 {
        return false;
    }
    let count = bytes[..end]
        .iter()
        .filter(|&&b| b < 8 || (13 < b && b < 32) || b > 126)
        .count();
    count * 100 > end * percentage
}

/// Decode a freshly loaded resource, choosing the encoding automatically.
///
/// `requested` forces an encoding (e.g. from a user choice); failures then fall back like an
/// undeclared file and record the failure in [`DecodedText::decode_error`].
pub fn decode_auto(bytes: &[u8], requested: Option<TextEncoding>) -> DecodedText {
    let mut decode_error = None;

    let declared = match requested {
        Some(encoding) => Some((encoding, EncodingSource::Declared)),
        None => detect_bom(bytes)
            .map(|e| (e, EncodingSource::Bom))
            .or_else(|| {
                let name = detect_declared(bytes)?;
                match TextEncoding::from_name(&name) {
                    Ok(e) => Some((e, EncodingSource::Declared)),
                    Err(err) => {
                        tracing::debug!(%name, "ignoring unknown declared encoding");
                        decode_error = Some(err);
                        None
                    }
                }
            }),
    };

    if let Some((encoding, source)) = declared {
        match encoding.decode(bytes) {
            Ok(text) => {
                return DecodedText {
                    text,
                    encoding,
                    source,
                    decode_error,
                };
            }
            Err(err) => {
                tracing::warn!(%encoding, error = %err, "declared encoding failed, falling back");
                decode_error = Some(err);
            }
        }
    }

    if let Ok(text) = TextEncoding::Utf8.decode(bytes) {
        return DecodedText {
            text,
            encoding: TextEncoding::Utf8,
            source: EncodingSource::Fallback,
            decode_error,
        };
    }

    if guess_binary(bytes, HEADER_SIZE, BINARY_THRESHOLD_PERCENT) {
        tracing::debug!(len = bytes.len(), "content looks binary, loading verbatim");
        return DecodedText {
            text: bytes.iter().map(|b| *b as char).collect(),
            encoding: TextEncoding::Binary,
            source: EncodingSource::Binary,
            decode_error: decode_error.or(Some(EncodingError::Invalid {
                encoding: "utf-8",
                offset: 0,
            })),
        };
    }

    DecodedText {
        text: bytes.iter().map(|b| *b as char).collect(),
        encoding: TextEncoding::Latin1,
        source: EncodingSource::Fallback,
        decode_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_detection() {
        let decoded = decode_auto(&[0xEF, 0xBB, 0xBF, b'h', b'i'], None);
        assert_eq!(decoded.text, "hi");
        assert_eq!(decoded.encoding, TextEncoding::Utf8Sig);
        assert_eq!(decoded.source, EncodingSource::Bom);
    }

    #[test]
    fn test_declared_latin1() {
        let bytes = b"# -*- coding: latin-1 -*-\nna\xefve\n";
        let decoded = decode_auto(bytes, None);
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
        assert!(decoded.text.contains("na\u{ef}ve"));
    }

    #[test]
    fn test_fallback_to_latin1_for_text() {
        let decoded = decode_auto(b"caf\xe9 au lait\n", None);
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
        assert_eq!(decoded.text, "caf\u{e9} au lait\n");
    }

    #[test]
    fn test_binary_guess() {
        let mut bytes = vec![0u8; 200];
        bytes.extend_from_slice(&[0xff, 0xfe, 0x80]);
        assert!(guess_binary(&bytes, HEADER_SIZE, BINARY_THRESHOLD_PERCENT));
        assert!(!guess_binary(b"plain text\n", HEADER_SIZE, BINARY_THRESHOLD_PERCENT));

        let decoded = decode_auto(&[0x00, 0x01, 0x02, 0xC3, 0x28, 0x10, 0x11], None);
        assert!(decoded.is_binary());
        assert_eq!(
            TextEncoding::Binary.encode(&decoded.text).unwrap(),
            vec![0x00, 0x01, 0x02, 0xC3, 0x28, 0x10, 0x11]
        );
    }

    #[test]
    fn test_encode_failure_reports_position() {
        let err = TextEncoding::Latin1.encode("ab\u{263a}").unwrap_err();
        assert_eq!(
            err,
            EncodingError::Unencodable {
                encoding: "latin-1",
                position: 2,
                ch: '\u{263a}'
            }
        );
    }

    #[test]
    fn test_utf16_round_trip() {
        let bytes = TextEncoding::Utf16Le.encode("h\u{e9}llo").unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
        let decoded = decode_auto(&bytes, None);
        assert_eq!(decoded.encoding, TextEncoding::Utf16Le);
        assert_eq!(decoded.text, "h\u{e9}llo");
    }
}
