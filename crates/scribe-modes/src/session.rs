//! Saved sessions.
//!
//! A session lists the URLs open in each top level frame:
//!
//! ```text
//! # scribe session
//! --- frame
//! url file:///home/user/notes.txt
//! url file:///home/user/src/main.c
//! --- frame
//! url about:scratch
//! ```
//!
//! Blank lines and `#` comments are ignored. URLs before the first separator belong to an
//! implicit first frame.

use std::path::Path;

const FRAME: &str = "--- frame";
const URL: &str = "url ";

/// URLs per frame, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    frames: Vec<Vec<String>>,
}

impl Session {
    /// Parse the session format. Unrecognized lines are logged and skipped.
    pub fn parse(text: &str) -> Self {
        let mut frames: Vec<Vec<String>> = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == FRAME {
                frames.push(Vec::new());
            } else if let Some(url) = line.strip_prefix(URL) {
                if frames.is_empty() {
                    frames.push(Vec::new());
                }
                if let Some(frame) = frames.last_mut() {
                    frame.push(url.trim().to_string());
                }
            } else {
                tracing::warn!(line = number + 1, text = %line, "skipping unknown session line");
            }
        }
        Self { frames }
    }

    /// Serialize in the format read by [`Session::parse`].
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for frame in &self.frames {
            out.push_str(FRAME);
            out.push('\n');
            for url in frame {
                out.push_str(URL);
                out.push_str(url);
                out.push('\n');
            }
        }
        out
    }

    /// Read a session file. A missing file is an empty session.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }

    /// Write the session file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.serialize())
    }

    /// The frames.
    pub fn frames(&self) -> &[Vec<String>] {
        &self.frames
    }

    /// Append a frame holding `urls`.
    pub fn push_frame(&mut self, urls: Vec<String>) {
        self.frames.push(urls);
    }

    /// Returns `true` if no frame lists a URL.
    pub fn is_empty(&self) -> bool {
        self.frames.iter().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_frames() {
        let session = Session::parse(
            "# comment\n\nurl about:blank\n--- frame\nurl file:///a.txt\n  url   mem:b  \n--- frame\n",
        );
        assert_eq!(
            session.frames(),
            &[
                vec!["about:blank".to_string()],
                vec!["file:///a.txt".to_string(), "mem:b".to_string()],
                vec![],
            ]
        );
        assert!(!session.is_empty());
    }

    #[test]
    fn test_serialize_reads_back() {
        let mut session = Session::default();
        session.push_frame(vec!["file:///x.py".to_string()]);
        session.push_frame(vec!["about:scratch".to_string(), "mem:y".to_string()]);
        let text = session.serialize();
        assert_eq!(
            text,
            "--- frame\nurl file:///x.py\n--- frame\nurl about:scratch\nurl mem:y\n"
        );
        assert_eq!(Session::parse(&text), session);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        assert!(Session::load(&path).unwrap().is_empty());

        let mut session = Session::default();
        session.push_frame(vec!["mem:notes".to_string()]);
        session.save(&path).unwrap();
        assert_eq!(Session::load(&path).unwrap(), session);
    }
}
