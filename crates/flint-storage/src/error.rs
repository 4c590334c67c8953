pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors produced by shard persistence.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("shard path {path:?} has no parent directory")]
    NoParentDir { path: std::path::PathBuf },
}
