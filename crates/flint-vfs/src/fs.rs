use std::io;
use std::path::Path;

/// Read-only filesystem access plus working-directory orientation.
pub trait FileSystem: Send + Sync {
    /// Read the full contents of `path`.
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Point the frontend's working directory at `path`.
    ///
    /// Compile commands carry filenames relative to their recorded directory,
    /// which is not necessarily the process working directory.
    fn set_current_dir(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// The local OS filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn set_current_dir(&self, path: &Path) -> io::Result<()> {
        std::env::set_current_dir(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
