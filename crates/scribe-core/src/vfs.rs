//! Virtual file system.
//!
//! Resources are addressed by [`Url`]. [`VfsRegistry`] dispatches on the scheme:
//!
//! - `file:` URLs (and bare paths, see [`parse_url`]) go to [`FileVfs`];
//! - `mem:` URLs go to an in-process [`MemVfs`];
//! - `about:blank` and `about:scratch` are built in and always empty.
//!
//! Any other scheme is reported as [`VfsError::UnknownScheme`].

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use url::Url;

/// VFS errors.
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    /// No handler for the URL scheme.
    #[error("unknown URL scheme: {0}")]
    UnknownScheme(String),
    /// The resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The string could not be parsed as a URL or path.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// The resource cannot be written.
    #[error("read-only resource: {0}")]
    ReadOnly(String),
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Metadata of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VfsMetadata {
    /// MIME type, when it can be determined.
    pub mimetype: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: Option<SystemTime>,
}

/// Resource access for one or more URL schemes.
pub trait Vfs: Send + Sync {
    /// Open a resource for reading.
    fn open_read(&self, url: &Url) -> Result<Box<dyn Read + Send>, VfsError>;
    /// Replace the content of a resource.
    fn write_all(&self, url: &Url, bytes: &[u8]) -> Result<(), VfsError>;
    /// Size in bytes.
    fn size(&self, url: &Url) -> Result<u64, VfsError> {
        Ok(self.metadata(url)?.size)
    }
    /// Returns `true` if the resource exists.
    fn exists(&self, url: &Url) -> bool;
    /// Resource metadata.
    fn metadata(&self, url: &Url) -> Result<VfsMetadata, VfsError>;
}

/// Parse a URL, accepting bare filesystem paths as `file:` URLs.
pub fn parse_url(text: &str) -> Result<Url, VfsError> {
    if let Ok(url) = Url::parse(text)
        && url.scheme().len() > 1
    {
        return Ok(url);
    }
    let path = std::path::absolute(Path::new(text))
        .map_err(|_| VfsError::InvalidUrl(text.to_string()))?;
    Url::from_file_path(&path).map_err(|()| VfsError::InvalidUrl(text.to_string()))
}

/// Guess a MIME type from a file name.
pub fn guess_mimetype(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" => "text/plain",
        "py" | "pyw" => "text/x-python",
        "c" | "h" => "text/x-csrc",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => "text/x-c++src",
        "f" | "for" | "f77" => "text/x-fortran",
        "sh" | "bash" => "application/x-shellscript",
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "rs" => "text/rust",
        "mk" | "mak" => "text/x-makefile",
        _ => return None,
    };
    Some(mime)
}

/// Local filesystem access.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileVfs;

impl FileVfs {
    fn path(url: &Url) -> Result<PathBuf, VfsError> {
        url.to_file_path()
            .map_err(|()| VfsError::InvalidUrl(url.to_string()))
    }
}

impl Vfs for FileVfs {
    fn open_read(&self, url: &Url) -> Result<Box<dyn Read + Send>, VfsError> {
        let path = Self::path(url)?;
        match std::fs::File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(VfsError::NotFound(url.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn write_all(&self, url: &Url, bytes: &[u8]) -> Result<(), VfsError> {
        std::fs::write(Self::path(url)?, bytes)?;
        Ok(())
    }

    fn exists(&self, url: &Url) -> bool {
        Self::path(url).is_ok_and(|p| p.exists())
    }

    fn metadata(&self, url: &Url) -> Result<VfsMetadata, VfsError> {
        let path = Self::path(url)?;
        let meta = std::fs::metadata(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound(url.to_string()),
            _ => VfsError::Io(err),
        })?;
        Ok(VfsMetadata {
            mimetype: path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(guess_mimetype)
                .map(str::to_string),
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

#[derive(Debug, Clone)]
struct MemFile {
    bytes: Arc<Vec<u8>>,
    mimetype: Option<String>,
    modified: SystemTime,
}

/// In-process resources addressed by `mem:` URLs, keyed by path.
#[derive(Debug, Default)]
pub struct MemVfs {
    files: Mutex<HashMap<String, MemFile>>,
}

impl MemVfs {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a resource with an explicit MIME type.
    pub fn insert(&self, path: &str, bytes: impl Into<Vec<u8>>, mimetype: Option<&str>) {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.insert(
            path.to_string(),
            MemFile {
                bytes: Arc::new(bytes.into()),
                mimetype: mimetype.map(str::to_string),
                modified: SystemTime::now(),
            },
        );
    }

    /// Current bytes of a resource.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.get(path).map(|f| f.bytes.as_ref().clone())
    }

    fn lookup(&self, url: &Url) -> Result<MemFile, VfsError> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files
            .get(url.path())
            .cloned()
            .ok_or_else(|| VfsError::NotFound(url.to_string()))
    }
}

struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Vfs for MemVfs {
    fn open_read(&self, url: &Url) -> Result<Box<dyn Read + Send>, VfsError> {
        let file = self.lookup(url)?;
        Ok(Box::new(Cursor::new(SharedBytes(file.bytes))))
    }

    fn write_all(&self, url: &Url, bytes: &[u8]) -> Result<(), VfsError> {
        let mimetype = self.lookup(url).ok().and_then(|f| f.mimetype);
        self.insert(url.path(), bytes, mimetype.as_deref());
        Ok(())
    }

    fn exists(&self, url: &Url) -> bool {
        self.lookup(url).is_ok()
    }

    fn metadata(&self, url: &Url) -> Result<VfsMetadata, VfsError> {
        let file = self.lookup(url)?;
        Ok(VfsMetadata {
            mimetype: file
                .mimetype
                .or_else(|| guess_mimetype(url.path()).map(str::to_string)),
            size: file.bytes.len() as u64,
            modified: Some(file.modified),
        })
    }
}

/// Built-in `about:` pages.
pub const ABOUT_PAGES: &[&str] = &["blank", "scratch"];

/// Scheme dispatcher over the built-in handlers.
#[derive(Debug, Default)]
pub struct VfsRegistry {
    file: FileVfs,
    mem: MemVfs,
}

impl VfsRegistry {
    /// Create a registry with an empty `mem:` store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `mem:` store.
    pub fn mem(&self) -> &MemVfs {
        &self.mem
    }

    fn about_page(url: &Url) -> Result<(), VfsError> {
        if ABOUT_PAGES.contains(&url.path()) {
            Ok(())
        } else {
            Err(VfsError::NotFound(url.to_string()))
        }
    }

    fn handler(&self, url: &Url) -> Result<&dyn Vfs, VfsError> {
        match url.scheme() {
            "file" => Ok(&self.file),
            "mem" => Ok(&self.mem),
            other => Err(VfsError::UnknownScheme(other.to_string())),
        }
    }
}

impl Vfs for VfsRegistry {
    fn open_read(&self, url: &Url) -> Result<Box<dyn Read + Send>, VfsError> {
        if url.scheme() == "about" {
            Self::about_page(url)?;
            return Ok(Box::new(std::io::empty()));
        }
        self.handler(url)?.open_read(url)
    }

    fn write_all(&self, url: &Url, bytes: &[u8]) -> Result<(), VfsError> {
        if url.scheme() == "about" {
            return Err(VfsError::ReadOnly(url.to_string()));
        }
        self.handler(url)?.write_all(url, bytes)
    }

    fn exists(&self, url: &Url) -> bool {
        if url.scheme() == "about" {
            return Self::about_page(url).is_ok();
        }
        self.handler(url).is_ok_and(|h| h.exists(url))
    }

    fn metadata(&self, url: &Url) -> Result<VfsMetadata, VfsError> {
        if url.scheme() == "about" {
            Self::about_page(url)?;
            return Ok(VfsMetadata {
                mimetype: Some("text/plain".to_string()),
                size: 0,
                modified: None,
            });
        }
        self.handler(url)?.metadata(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_about_pages_are_empty() {
        let vfs = VfsRegistry::new();
        let url = Url::parse("about:blank").unwrap();
        assert!(vfs.exists(&url));
        let mut text = String::new();
        vfs.open_read(&url).unwrap().read_to_string(&mut text).unwrap();
        assert!(text.is_empty());
        assert!(!vfs.exists(&Url::parse("about:nothing").unwrap()));
    }

    #[test]
    fn test_unknown_scheme() {
        let vfs = VfsRegistry::new();
        let url = Url::parse("gopher://example.org/x").unwrap();
        assert!(matches!(vfs.open_read(&url), Err(VfsError::UnknownScheme(s)) if s == "gopher"));
    }

    #[test]
    fn test_mem_round_trip() {
        let vfs = VfsRegistry::new();
        let url = Url::parse("mem:notes.py").unwrap();
        vfs.write_all(&url, b"x = 1\n").unwrap();
        assert_eq!(vfs.size(&url).unwrap(), 6);
        assert_eq!(
            vfs.metadata(&url).unwrap().mimetype.as_deref(),
            Some("text/x-python")
        );
        assert_eq!(vfs.mem().get("notes.py").as_deref(), Some(&b"x = 1\n"[..]));
    }

    #[test]
    fn test_bare_path_becomes_file_url() {
        let url = parse_url("/tmp/some file.txt").unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.as_str().ends_with("some%20file.txt"));
    }
}
