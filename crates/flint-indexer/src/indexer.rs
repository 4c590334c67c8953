use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use flint_compile::{CompilationDatabase, CompileCommand, WatchSubscription};
use flint_core::{AbsPathBuf, FileDigest};
use flint_index::{
    DuplicateHandling, FileSymbols, Frontend, IndexType, SwapIndex, SymbolIndex,
};
use flint_storage::{ShardStorage, StorageFactory};
use flint_vfs::FileSystem;

use crate::error::IndexError;
use crate::queue::{QueueHandle, TaskPriority, TaskQueue};
use crate::registry::{ShardVersion, VersionRegistry};

#[derive(Debug, Clone)]
pub struct BackgroundIndexerConfig {
    /// Worker threads draining the task queue. Must be at least one.
    pub thread_pool_size: usize,
    /// Periodic index-rebuild cadence; `0` disables the builder thread and
    /// makes every indexing task rebuild a Light index synchronously.
    pub build_index_period_ms: u64,
}

impl Default for BackgroundIndexerConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            thread_pool_size: available.saturating_sub(1).clamp(1, 16),
            build_index_period_ms: 0,
        }
    }
}

impl BackgroundIndexerConfig {
    fn build_index_period(&self) -> Option<Duration> {
        (self.build_index_period_ms > 0)
            .then(|| Duration::from_millis(self.build_index_period_ms))
    }
}

/// Continuously indexes translation units as their compile commands change.
///
/// Construction subscribes to the compilation database and spawns the worker
/// pool (plus, optionally, the periodic index builder). Dropping the indexer
/// stops both; in-flight tasks finish, queued ones are discarded.
pub struct BackgroundIndexer {
    inner: Arc<IndexerInner>,
    queue: TaskQueue,
    rebuilder: Option<JoinHandle<()>>,
    _subscription: WatchSubscription,
}

pub(crate) struct IndexerInner {
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) cdb: Arc<dyn CompilationDatabase>,
    pub(crate) frontend: Arc<dyn Frontend>,
    pub(crate) storage_factory: StorageFactory,
    pub(crate) versions: VersionRegistry,
    pub(crate) symbols: FileSymbols,
    pub(crate) index: SwapIndex,
    build_index_period: Option<Duration>,
    symbols_updated: AtomicBool,
    rebuild_stop: Mutex<bool>,
    rebuild_wake: Condvar,
}

impl BackgroundIndexer {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        cdb: Arc<dyn CompilationDatabase>,
        frontend: Arc<dyn Frontend>,
        storage_factory: StorageFactory,
        config: BackgroundIndexerConfig,
    ) -> Self {
        let build_index_period = config.build_index_period();
        let inner = Arc::new(IndexerInner {
            fs,
            cdb: Arc::clone(&cdb),
            frontend,
            storage_factory,
            versions: VersionRegistry::default(),
            symbols: FileSymbols::new(),
            index: SwapIndex::default(),
            build_index_period,
            symbols_updated: AtomicBool::new(false),
            rebuild_stop: Mutex::new(false),
            rebuild_wake: Condvar::new(),
        });

        let queue = TaskQueue::new(config.thread_pool_size);

        let rebuilder = build_index_period.map(|period| {
            tracing::info!(
                target = "flint.indexer",
                period_ms = period.as_millis() as u64,
                "rebuilding symbol index periodically"
            );
            let inner = Arc::clone(&inner);
            std::thread::Builder::new()
                .name("flint-index-builder".to_string())
                .spawn(move || inner.rebuild_loop(period))
                .expect("failed to spawn index builder thread")
        });

        let subscription = {
            let inner = Arc::clone(&inner);
            let handle = queue.handle();
            cdb.watch(Box::new(move |changed| {
                enqueue_changed(&inner, &handle, changed);
            }))
        };

        Self {
            inner,
            queue,
            rebuilder,
            _subscription: subscription,
        }
    }

    /// Schedule shard loading and re-indexing for `changed` files, exactly as
    /// a compilation-database notification would.
    pub fn enqueue_changed(&self, changed: Vec<PathBuf>) {
        enqueue_changed(&self.inner, &self.queue.handle(), changed);
    }

    /// Lock-free snapshot of the live query index.
    pub fn index(&self) -> Arc<SymbolIndex> {
        self.inner.index.snapshot()
    }

    /// The registry entry for `path`, if it has ever been indexed or loaded.
    pub fn shard_version(&self, path: &Path) -> Option<ShardVersion> {
        let path = AbsPathBuf::new(path.to_path_buf())?;
        self.inner.versions.get(&path)
    }

    /// Wait until no indexing work is queued or running. Test probe.
    pub fn block_until_idle(&self, timeout: Duration) -> bool {
        self.queue.block_until_idle(timeout)
    }

    /// Stop workers and the rebuilder. Idempotent; also called on drop.
    pub fn stop(&self) {
        self.queue.stop();
        {
            let mut stop = self
                .inner
                .rebuild_stop
                .lock()
                .expect("rebuild state lock poisoned");
            *stop = true;
        }
        self.inner.rebuild_wake.notify_all();
    }
}

impl Drop for BackgroundIndexer {
    fn drop(&mut self) {
        self.stop();
        if let Some(rebuilder) = self.rebuilder.take() {
            let _ = rebuilder.join();
        }
        // TaskQueue joins its workers in its own drop.
    }
}

/// Queue a Normal-priority task that loads shards for `changed` files and
/// then queues Background indexing for the stale ones, in shuffled order so
/// parallel workers spread across unrelated TUs instead of converging on the
/// same headers.
fn enqueue_changed(inner: &Arc<IndexerInner>, handle: &QueueHandle, changed: Vec<PathBuf>) {
    let inner = Arc::clone(inner);
    let requeue = handle.clone();
    handle.enqueue(
        Box::new(move || {
            tracing::debug!(
                target = "flint.indexer",
                files = changed.len(),
                "loading shards for changed files"
            );
            let mut stale = inner.load_shards(&changed);
            shuffle(&mut stale, random_seed());
            for (cmd, storage) in stale {
                enqueue_tu(&inner, &requeue, cmd, storage);
            }
        }),
        TaskPriority::Normal,
    );
}

fn enqueue_tu(
    inner: &Arc<IndexerInner>,
    handle: &QueueHandle,
    cmd: CompileCommand,
    storage: Arc<dyn ShardStorage>,
) {
    let inner = Arc::clone(inner);
    handle.enqueue(
        Box::new(move || {
            let filename = cmd.filename.clone();
            if let Err(err) = inner.index(cmd, storage.as_ref()) {
                tracing::error!(
                    target = "flint.indexer",
                    file = %filename.display(),
                    error = %err,
                    "indexing failed"
                );
            }
        }),
        TaskPriority::Background,
    );
}

impl IndexerInner {
    /// Index one translation unit and commit its output.
    pub(crate) fn index(
        &self,
        cmd: CompileCommand,
        storage: &dyn ShardStorage,
    ) -> Result<(), IndexError> {
        let main_file = cmd
            .absolute_path()
            .ok_or_else(|| IndexError::PathResolution {
                path: cmd.filename.clone(),
            })?;

        let buffer =
            self.fs
                .read_bytes(&main_file)
                .map_err(|source| IndexError::ReadFile {
                    path: main_file.to_path_buf(),
                    source,
                })?;
        let digest = FileDigest::of_bytes(&buffer);

        // One snapshot for the whole TU; per-file registry locking would
        // serialize the workers. A commit racing ahead of this snapshot is
        // tolerated, see `update`.
        let snapshot = self.versions.snapshot();

        tracing::debug!(
            target = "flint.indexer",
            file = %main_file,
            digest = %digest,
            "indexing"
        );

        if let Err(err) = self.fs.set_current_dir(&cmd.directory) {
            tracing::debug!(
                target = "flint.indexer",
                dir = %cmd.directory.display(),
                error = %err,
                "could not enter command working directory"
            );
        }

        let filter = |path: &Path, digest: FileDigest| -> bool {
            let Some(path) = AbsPathBuf::new(path.to_path_buf()) else {
                return false;
            };
            match snapshot.get(path.as_path()) {
                // Unchanged and previously clean: nothing new to collect.
                Some(version) if version.digest == digest && !version.had_errors => false,
                _ => true,
            }
        };

        let mut output = self.frontend.collect(&cmd, self.fs.as_ref(), &filter)?;

        let had_errors = output.had_errors;
        if had_errors {
            tracing::warn!(
                target = "flint.indexer",
                file = %main_file,
                "file failed to compile, index may be incomplete"
            );
            output.sources.mark_had_errors();
        }

        tracing::debug!(
            target = "flint.indexer",
            file = %main_file,
            symbols = output.symbols.len(),
            refs = output.refs.len(),
            files = output.sources.len(),
            "collected index data"
        );

        self.update(&main_file, output, &cmd, &snapshot, storage, had_errors);

        if self.build_index_period.is_some() {
            self.symbols_updated.store(true, Ordering::Release);
        } else {
            self.index
                .swap(self.symbols.build_index(IndexType::Light, DuplicateHandling::Merge));
        }
        Ok(())
    }

    fn rebuild_loop(&self, period: Duration) {
        loop {
            {
                let stop = self
                    .rebuild_stop
                    .lock()
                    .expect("rebuild state lock poisoned");
                if *stop {
                    break;
                }
                let (stop, _timeout) = self
                    .rebuild_wake
                    .wait_timeout(stop, period)
                    .expect("rebuild state lock poisoned");
                if *stop {
                    break;
                }
            }
            if !self.symbols_updated.swap(false, Ordering::AcqRel) {
                continue;
            }
            // A task finishing between the flag reset above and the build
            // below re-raises the flag and costs one redundant rebuild.
            self.index
                .swap(self.symbols.build_index(IndexType::Heavy, DuplicateHandling::Merge));
            tracing::debug!(
                target = "flint.indexer",
                files = self.symbols.file_count(),
                "rebuilt symbol index"
            );
        }
    }
}

/// Deterministic Fisher–Yates driven by a linear congruential sequence.
fn shuffle<T>(items: &mut [T], mut seed: u64) {
    if items.len() <= 1 {
        return;
    }
    for i in (1..items.len()).rev() {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let j = (seed % (i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}

fn random_seed() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish()
}
