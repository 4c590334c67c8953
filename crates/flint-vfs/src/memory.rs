use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flint_core::AbsPathBuf;

use crate::fs::FileSystem;

/// In-memory filesystem for tests.
///
/// Files are keyed by normalized absolute path, so lookups ignore dot
/// segments the same way the rest of the system does.
#[derive(Debug, Default)]
pub struct MemoryFs {
    inner: Mutex<MemoryFsInner>,
}

#[derive(Debug, Default)]
struct MemoryFsInner {
    files: HashMap<AbsPathBuf, Vec<u8>>,
    current_dir: Option<PathBuf>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file. Panics on a relative path.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let path = AbsPathBuf::new(path.as_ref().to_path_buf())
            .unwrap_or_else(|| panic!("MemoryFs paths must be absolute: {:?}", path.as_ref()));
        let mut inner = self.inner.lock().expect("memory fs lock poisoned");
        inner.files.insert(path, contents.into());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let Some(path) = AbsPathBuf::new(path.as_ref().to_path_buf()) else {
            return;
        };
        let mut inner = self.inner.lock().expect("memory fs lock poisoned");
        inner.files.remove(&path);
    }

    pub fn current_dir(&self) -> Option<PathBuf> {
        let inner = self.inner.lock().expect("memory fs lock poisoned");
        inner.current_dir.clone()
    }
}

impl FileSystem for MemoryFs {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        let normalized = AbsPathBuf::new(path.to_path_buf()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "path is not absolute")
        })?;
        let inner = self.inner.lock().expect("memory fs lock poisoned");
        inner
            .files
            .get(&normalized)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn set_current_dir(&self, path: &Path) -> io::Result<()> {
        let mut inner = self.inner.lock().expect("memory fs lock poisoned");
        inner.current_dir = Some(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let Some(normalized) = AbsPathBuf::new(path.to_path_buf()) else {
            return false;
        };
        let inner = self.inner.lock().expect("memory fs lock poisoned");
        inner.files.contains_key(&normalized)
    }
}
