use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use flint_index::Shard;

use crate::error::Result;
use crate::ShardStorage;

/// Keeps shards in a map. Test backend; nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    shards: Mutex<HashMap<PathBuf, Shard>>,
    stores: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read access for assertions.
    pub fn shard(&self, path: &Path) -> Option<Shard> {
        let shards = self.shards.lock().expect("memory storage lock poisoned");
        shards.get(path).cloned()
    }

    pub fn shard_count(&self) -> usize {
        let shards = self.shards.lock().expect("memory storage lock poisoned");
        shards.len()
    }

    /// Total `store_shard` calls, including overwrites.
    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    /// Drop a stored shard, simulating external cache eviction.
    pub fn remove(&self, path: &Path) {
        let mut shards = self.shards.lock().expect("memory storage lock poisoned");
        shards.remove(path);
    }
}

impl ShardStorage for MemoryStorage {
    fn load_shard(&self, path: &Path) -> Option<Shard> {
        self.shard(path)
    }

    fn store_shard(&self, path: &Path, shard: &Shard) -> Result<()> {
        let mut shards = self.shards.lock().expect("memory storage lock poisoned");
        shards.insert(path.to_path_buf(), shard.clone());
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
