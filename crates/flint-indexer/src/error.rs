use std::path::PathBuf;

use flint_index::FrontendError;

/// Errors that abort indexing of a single translation unit.
///
/// These never invalidate other tasks; the enqueue wrapper logs them and the
/// worker moves on to the next task.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("compile command does not resolve to an absolute path: {path:?}")]
    PathResolution { path: PathBuf },

    #[error("failed to read {path:?}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Frontend(#[from] FrontendError),
}
