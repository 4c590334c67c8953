//! Shared, dependency-minimized core types used across flint.

pub mod digest;
pub mod id;
pub mod path;

pub use digest::FileDigest;
pub use id::SymbolId;
pub use path::{file_uri_to_path, path_to_file_uri, AbsPathBuf, UriToPathError};
