use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use flint_core::FileDigest;
use flint_index::Shard;

use crate::error::Result;
use crate::util;
use crate::{ShardStorage, StorageFactory};

/// Magic prefix of every shard file.
const SHARD_MAGIC: &[u8; 4] = b"FLSD";
/// Bumped whenever the shard schema changes shape. Old files are treated as
/// absent rather than migrated.
const SHARD_FORMAT_VERSION: u32 = 1;

/// Directory under a project's source root holding its shard files.
const SHARD_DIR: &str = ".flint/index";

/// One bincode file per shard, under `<source_root>/.flint/index/`.
///
/// Filenames are the hex digest of the shard's source path, so arbitrary
/// absolute paths never leak into filesystem names.
#[derive(Debug)]
pub struct DiskStorage {
    dir: PathBuf,
}

impl DiskStorage {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            dir: source_root.into().join(SHARD_DIR),
        }
    }

    fn shard_file(&self, path: &Path) -> PathBuf {
        let key = FileDigest::of_bytes(path.to_string_lossy().as_bytes());
        self.dir.join(format!("{}.shard", key.to_hex()))
    }
}

impl ShardStorage for DiskStorage {
    fn load_shard(&self, path: &Path) -> Option<Shard> {
        let file = self.shard_file(path);
        let bytes = util::read_file_limited(&file)?;

        let header_len = SHARD_MAGIC.len() + 4;
        if bytes.len() < header_len || &bytes[..SHARD_MAGIC.len()] != SHARD_MAGIC {
            tracing::debug!(
                target = "flint.storage",
                path = %path.display(),
                "discarding shard with unrecognized header"
            );
            return None;
        }
        let version = u32::from_le_bytes(bytes[SHARD_MAGIC.len()..header_len].try_into().ok()?);
        if version != SHARD_FORMAT_VERSION {
            tracing::debug!(
                target = "flint.storage",
                path = %path.display(),
                found = version,
                expected = SHARD_FORMAT_VERSION,
                "discarding shard with incompatible format version"
            );
            return None;
        }

        match util::deserialize(&bytes[header_len..]) {
            Ok(shard) => Some(shard),
            Err(err) => {
                tracing::debug!(
                    target = "flint.storage",
                    path = %path.display(),
                    error = %err,
                    "discarding undecodable shard"
                );
                None
            }
        }
    }

    fn store_shard(&self, path: &Path, shard: &Shard) -> Result<()> {
        let mut bytes = Vec::with_capacity(SHARD_MAGIC.len() + 4);
        bytes.extend_from_slice(SHARD_MAGIC);
        bytes.extend_from_slice(&SHARD_FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&util::serialize(shard)?);
        util::atomic_write(&self.shard_file(path), &bytes)
    }
}

/// A [`StorageFactory`] producing one shared `DiskStorage` per source root.
pub fn disk_storage_factory() -> StorageFactory {
    let cache: Mutex<HashMap<PathBuf, Arc<DiskStorage>>> = Mutex::new(HashMap::new());
    Arc::new(move |source_root: &Path| {
        let mut cache = cache.lock().expect("storage factory lock poisoned");
        Arc::clone(
            cache
                .entry(source_root.to_path_buf())
                .or_insert_with(|| Arc::new(DiskStorage::new(source_root))),
        ) as Arc<dyn ShardStorage>
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flint_core::SymbolId;
    use flint_index::{Location, Symbol, SymbolSlab};
    use pretty_assertions::assert_eq;

    fn sample_shard() -> Shard {
        let mut symbols = SymbolSlab::builder();
        symbols.insert(Symbol {
            id: SymbolId::from_raw(1),
            name: "S".to_string(),
            canonical_declaration: Some(Location::new("file:///p/a.h", 1, 0)),
            definition: None,
        });
        Shard {
            symbols: Some(symbols.build()),
            ..Shard::default()
        }
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        let source = Path::new("/p/a.cc");

        assert!(storage.load_shard(source).is_none());
        storage.store_shard(source, &sample_shard()).unwrap();
        assert_eq!(storage.load_shard(source).unwrap(), sample_shard());
    }

    #[test]
    fn overwrite_replaces_whole_shard() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        let source = Path::new("/p/a.cc");

        storage.store_shard(source, &sample_shard()).unwrap();
        storage.store_shard(source, &Shard::default()).unwrap();
        assert_eq!(storage.load_shard(source).unwrap(), Shard::default());
    }

    #[test]
    fn truncated_shard_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        let source = Path::new("/p/a.cc");

        storage.store_shard(source, &sample_shard()).unwrap();
        let file = storage.shard_file(source);
        let bytes = std::fs::read(&file).unwrap();
        std::fs::write(&file, &bytes[..bytes.len() / 2]).unwrap();

        assert!(storage.load_shard(source).is_none());
    }

    #[test]
    fn wrong_version_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        let source = Path::new("/p/a.cc");

        storage.store_shard(source, &sample_shard()).unwrap();
        let file = storage.shard_file(source);
        let mut bytes = std::fs::read(&file).unwrap();
        bytes[4] = 0xFF;
        std::fs::write(&file, &bytes).unwrap();

        assert!(storage.load_shard(source).is_none());
    }

    #[test]
    fn factory_reuses_storage_per_root() {
        let factory = disk_storage_factory();
        let dir = tempfile::tempdir().unwrap();

        let a = factory(dir.path());
        let b = factory(dir.path());
        a.store_shard(Path::new("/p/a.cc"), &sample_shard()).unwrap();
        assert!(b.load_shard(Path::new("/p/a.cc")).is_some());
    }
}
