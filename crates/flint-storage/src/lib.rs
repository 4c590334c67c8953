//! Pluggable persistence for per-file index shards.
//!
//! The indexing core addresses shards by absolute source path and treats the
//! backend as content-agnostic: a shard either loads whole or is reported
//! absent. `DiskStorage` keeps one bincode file per shard under a dot
//! directory inside the project; `MemoryStorage` backs tests.

mod disk;
mod error;
mod memory;
mod util;

pub use disk::{disk_storage_factory, DiskStorage};
pub use error::{Result, StorageError};
pub use memory::MemoryStorage;

use std::path::Path;
use std::sync::Arc;

use flint_index::Shard;

/// Key/value persistence for shards, addressed by absolute source path.
pub trait ShardStorage: Send + Sync {
    /// Load the shard last stored for `path`.
    ///
    /// Missing, corrupt, and incompatible shards are all reported as `None`:
    /// every failure mode degrades to re-indexing, never to an error the
    /// pipeline would have to handle.
    fn load_shard(&self, path: &Path) -> Option<Shard>;

    /// Replace the shard stored for `path`.
    fn store_shard(&self, path: &Path, shard: &Shard) -> Result<()>;
}

/// Produces the storage handle for a project, keyed by its source root.
pub type StorageFactory = Arc<dyn Fn(&Path) -> Arc<dyn ShardStorage> + Send + Sync>;
