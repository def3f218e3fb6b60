//! Source documents and their content fingerprints.
//!
//! A [`SourceDocument`] is the engine's view of one Markdown file on disk: its
//! absolute path, raw bytes, the SHA-256 [`Fingerprint`] of those bytes and the
//! modification time observed when it was last read.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Lowercase file extensions recognised as Markdown.
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "mkdn", "mkd"];

/// Returns `true` if `path` carries a Markdown extension (case-insensitive).
///
/// # Examples
///
/// ```
/// use markd_core::document::is_markdown;
/// use std::path::Path;
///
/// assert!(is_markdown(Path::new("README.md")));
/// assert!(is_markdown(Path::new("notes.MARKDOWN")));
/// assert!(!is_markdown(Path::new("image.png")));
/// assert!(!is_markdown(Path::new("Makefile")));
/// ```
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            MARKDOWN_EXTENSIONS.iter().any(|e| *e == ext)
        })
        .unwrap_or(false)
}

/// SHA-256 digest of a document's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex form.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Fingerprint {
    // The short form is enough to tell entries apart in logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

/// A Markdown file as last read from disk.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: PathBuf,
    content: Vec<u8>,
    fingerprint: Fingerprint,
    modified: Option<SystemTime>,
}

impl SourceDocument {
    /// Reads the document at `path`.
    pub fn load(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let content = std::fs::read(&path)?;
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        Ok(Self::from_bytes(path, content, modified))
    }

    pub fn from_bytes(path: PathBuf, content: Vec<u8>, modified: Option<SystemTime>) -> Self {
        let fingerprint = Fingerprint::of(&content);
        Self {
            path,
            content,
            fingerprint,
            modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.content)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
