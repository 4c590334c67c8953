//! Canonical absolute paths and `file:` URI conversion.
//!
//! Index data is keyed by absolute path everywhere. The frontend reports
//! locations as `file:` URIs, so both directions of the conversion live here
//! next to the path type itself.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::path::{Component, Path, PathBuf};

/// A normalized absolute filesystem path.
///
/// Construction removes `.` and `..` segments lexically; no filesystem access
/// (and in particular no symlink resolution) happens. Two paths that differ
/// only in dot segments compare equal after construction.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsPathBuf(PathBuf);

impl AbsPathBuf {
    /// Normalize an absolute path. Returns `None` for relative input.
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        if !path.is_absolute() {
            return None;
        }
        Some(Self(normalize(&path)))
    }

    /// Resolve a compile-command filename against its working directory.
    ///
    /// An absolute filename is used as-is; a relative one is joined onto
    /// `directory`. Returns `None` when neither yields an absolute path.
    pub fn resolve(filename: &Path, directory: &Path) -> Option<Self> {
        if filename.is_absolute() {
            Self::new(filename.to_path_buf())
        } else {
            Self::new(directory.join(filename))
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl Deref for AbsPathBuf {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for AbsPathBuf {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Borrow<Path> for AbsPathBuf {
    fn borrow(&self) -> &Path {
        &self.0
    }
}

impl fmt::Debug for AbsPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for AbsPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Lexical dot-segment removal. `..` at the root is dropped.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UriToPathError {
    #[error("URI {uri:?} does not use the file scheme")]
    Scheme { uri: String },
    #[error("URI {uri:?} has a non-local authority")]
    Authority { uri: String },
    #[error("URI {uri:?} contains an invalid percent escape")]
    Escape { uri: String },
    #[error("URI {uri:?} does not name an absolute path")]
    Relative { uri: String },
}

/// Render an absolute path as a `file:` URI.
pub fn path_to_file_uri(path: &Path) -> String {
    let mut out = String::from("file://");
    let raw = path.to_string_lossy();
    for byte in raw.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b'-' | b'.' | b'_' | b'~' => {
                out.push(*byte as char)
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}

/// Parse a `file:` URI back into a normalized absolute path.
pub fn file_uri_to_path(uri: &str) -> Result<AbsPathBuf, UriToPathError> {
    let rest = uri
        .strip_prefix("file://")
        .ok_or_else(|| UriToPathError::Scheme {
            uri: uri.to_string(),
        })?;

    // Only an empty or `localhost` authority refers to the local filesystem.
    let path_start = rest.find('/').ok_or_else(|| UriToPathError::Relative {
        uri: uri.to_string(),
    })?;
    let authority = &rest[..path_start];
    if !authority.is_empty() && authority != "localhost" {
        return Err(UriToPathError::Authority {
            uri: uri.to_string(),
        });
    }

    let encoded = &rest[path_start..];
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut iter = encoded.bytes();
    while let Some(byte) = iter.next() {
        if byte != b'%' {
            bytes.push(byte);
            continue;
        }
        let hi = iter.next();
        let lo = iter.next();
        let decoded = match (hi, lo) {
            (Some(hi), Some(lo)) => {
                let hex = [hi, lo];
                std::str::from_utf8(&hex)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
            }
            _ => None,
        };
        match decoded {
            Some(value) => bytes.push(value),
            None => {
                return Err(UriToPathError::Escape {
                    uri: uri.to_string(),
                })
            }
        }
    }

    let text = String::from_utf8_lossy(&bytes).into_owned();
    AbsPathBuf::new(PathBuf::from(text)).ok_or_else(|| UriToPathError::Relative {
        uri: uri.to_string(),
    })
}
