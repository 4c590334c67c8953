use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Width of a [`FileDigest`] in bytes.
pub const DIGEST_LEN: usize = 20;

/// A fixed-width content digest of a file's bytes.
///
/// Stored as the leading bytes of a SHA-256 hash. The all-zero digest is
/// reserved to mean "absent" and is never produced by [`FileDigest::of_bytes`]
/// for real content in practice.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FileDigest([u8; DIGEST_LEN]);

impl FileDigest {
    /// The reserved "absent" digest.
    pub const ZERO: FileDigest = FileDigest([0; DIGEST_LEN]);

    /// Digest an in-memory buffer.
    pub fn of_bytes(bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_ref());
        let full = hasher.finalize();
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&full[..DIGEST_LEN]);
        Self(out)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex rendering, for logs.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDigest({})", self.to_hex())
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
