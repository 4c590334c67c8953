use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use flint_core::{AbsPathBuf, FileDigest};

/// The most recent indexing outcome for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShardVersion {
    pub digest: FileDigest,
    pub had_errors: bool,
}

/// Process-wide map from file path to its last indexed version.
///
/// Guarded by a single mutex. The two dominant operations are a full
/// snapshot at the start of a TU (so workers compare against a consistent
/// view without per-file locking) and single-entry updates at commit time.
/// The mutex is never held across I/O.
#[derive(Debug, Default)]
pub(crate) struct VersionRegistry {
    inner: Mutex<HashMap<AbsPathBuf, ShardVersion>>,
}

impl VersionRegistry {
    pub(crate) fn snapshot(&self) -> HashMap<AbsPathBuf, ShardVersion> {
        self.lock().clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<AbsPathBuf, ShardVersion>> {
        self.inner
            .lock()
            .expect("shard version registry lock poisoned")
    }

    pub(crate) fn get(&self, path: &AbsPathBuf) -> Option<ShardVersion> {
        self.lock().get(path).copied()
    }
}
