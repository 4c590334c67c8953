//! Seeding the index from persisted shards.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use flint_compile::CompileCommand;
use flint_core::{AbsPathBuf, FileDigest};
use flint_index::{DuplicateHandling, IndexType, Shard, SourceFlags};
use flint_storage::ShardStorage;

use crate::indexer::IndexerInner;
use crate::registry::ShardVersion;
use crate::uri::UriMemo;

/// One file reachable from a TU's include graph, and whether its stored
/// shard is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Dependency {
    pub(crate) path: AbsPathBuf,
    pub(crate) needs_reindexing: bool,
}

/// Shard contents staged for registry insertion after the traversal.
struct LoadedShard {
    path: AbsPathBuf,
    shard: Shard,
    digest: FileDigest,
    count_references: bool,
    had_errors: bool,
}

impl IndexerInner {
    /// Walk the persisted include graph of `cmd`'s TU breadth-first, loading
    /// each reachable shard once, and report every dependency together with
    /// its staleness.
    ///
    /// `loaded_shards` spans all TUs of one notification: the first TU to
    /// reach a file decides its staleness, and later TUs see it as settled.
    /// The include graph may contain cycles and self-edges, so the traversal
    /// is queue-based with an in-queue set rather than recursive.
    pub(crate) fn load_shard(
        &self,
        cmd: &CompileCommand,
        storage: &dyn ShardStorage,
        loaded_shards: &mut HashSet<AbsPathBuf>,
    ) -> Vec<Dependency> {
        let Some(root) = cmd.absolute_path() else {
            tracing::error!(
                target = "flint.indexer",
                file = %cmd.filename.display(),
                "compile command does not resolve to an absolute path"
            );
            return Vec::new();
        };

        let mut staged: Vec<LoadedShard> = Vec::new();
        let mut dependencies: Vec<Dependency> = Vec::new();
        let mut in_queue: HashSet<AbsPathBuf> = HashSet::new();
        let mut to_visit: VecDeque<Dependency> = VecDeque::new();
        let mut uris = UriMemo::default();

        // A dependency stays marked for re-indexing until its shard proves
        // otherwise.
        in_queue.insert(root.clone());
        to_visit.push_back(Dependency {
            path: root,
            needs_reindexing: true,
        });

        while let Some(dependency) = to_visit.pop_front() {
            dependencies.push(dependency);
            let current = dependencies.last_mut().expect("just pushed");

            // Shard contents don't change from one TU to the next, so a
            // path seen earlier (loaded or failed) is settled; its first
            // occurrence already reported any staleness.
            if !loaded_shards.insert(current.path.clone()) {
                current.needs_reindexing = false;
                continue;
            }

            let Some(shard) = storage.load_shard(&current.path) else {
                tracing::debug!(
                    target = "flint.indexer",
                    file = %current.path,
                    "no shard, file queued for fresh indexing"
                );
                continue;
            };
            let Some(sources) = shard.sources.as_ref() else {
                tracing::debug!(
                    target = "flint.indexer",
                    file = %current.path,
                    "shard has no include graph, file queued for fresh indexing"
                );
                continue;
            };

            let mut self_node = None;
            for node in sources.iter() {
                let Some(path) = uris.resolve(&node.uri) else {
                    continue;
                };
                if in_queue.insert(path.clone()) {
                    to_visit.push_back(Dependency {
                        path: path.clone(),
                        needs_reindexing: true,
                    });
                }
                // Every node other than the file's own carries edges only.
                if *path == current.path {
                    self_node = Some(node.clone());
                }
            }

            let Some(node) = self_node else {
                continue;
            };
            debug_assert!(!node.digest.is_zero(), "stored shard carries no digest");
            if node.digest.is_zero() {
                continue;
            }

            // Compare against the live file; an unreadable file is logged
            // and its staleness left as already decided.
            match self.fs.read_bytes(&current.path) {
                Ok(buffer) => {
                    current.needs_reindexing = FileDigest::of_bytes(&buffer) != node.digest;
                }
                Err(err) => {
                    tracing::error!(
                        target = "flint.indexer",
                        file = %current.path,
                        error = %err,
                        "failed to read dependency contents"
                    );
                }
            }

            staged.push(LoadedShard {
                path: current.path.clone(),
                digest: node.digest,
                count_references: node.flags.contains(SourceFlags::IS_TU),
                had_errors: node.flags.contains(SourceFlags::HAD_ERRORS),
                shard,
            });
        }

        // Commit every staged shard. This runs before the workers see any
        // indexing task for these files, so plain inserts are fine.
        {
            let mut versions = self.versions.lock();
            for loaded in staged {
                versions.insert(
                    loaded.path.clone(),
                    ShardVersion {
                        digest: loaded.digest,
                        had_errors: loaded.had_errors,
                    },
                );
                self.symbols.update(
                    &loaded.path,
                    loaded.shard.symbols.map(Arc::new),
                    loaded.shard.refs.map(Arc::new),
                    loaded.shard.relations.map(Arc::new),
                    loaded.count_references,
                );
            }
        }

        dependencies
    }

    /// Load shards for every changed file and return the TUs that still need
    /// fresh indexing, paired with their storage handles.
    pub(crate) fn load_shards(
        &self,
        changed_files: &[PathBuf],
    ) -> Vec<(CompileCommand, Arc<dyn ShardStorage>)> {
        let mut stale: Vec<(CompileCommand, Arc<dyn ShardStorage>)> = Vec::new();
        // Files already covered by a queued TU; suppresses a second TU being
        // queued for the sake of a shared header.
        let mut files_to_index: HashSet<AbsPathBuf> = HashSet::new();
        let mut loaded_shards: HashSet<AbsPathBuf> = HashSet::new();

        for file in changed_files {
            let Some((cmd, project)) = self.cdb.compile_command(file) else {
                continue;
            };
            let storage = (self.storage_factory)(&project.source_root);
            let dependencies = self.load_shard(&cmd, storage.as_ref(), &mut loaded_shards);

            for dependency in &dependencies {
                if !dependency.needs_reindexing || files_to_index.contains(&dependency.path) {
                    continue;
                }
                tracing::debug!(
                    target = "flint.indexer",
                    tu = %cmd.filename.display(),
                    dependency = %dependency.path,
                    "queueing TU because a dependency is stale"
                );
                stale.push((cmd.clone(), Arc::clone(&storage)));
                // Re-indexing the TU covers all of its dependencies.
                for dependency in &dependencies {
                    files_to_index.insert(dependency.path.clone());
                }
                break;
            }
        }

        self.index
            .swap(self.symbols.build_index(IndexType::Heavy, DuplicateHandling::Merge));
        tracing::debug!(
            target = "flint.indexer",
            files = self.symbols.file_count(),
            "rebuilt symbol index from loaded shards"
        );
        stale
    }
}
