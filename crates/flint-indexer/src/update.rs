//! Partitioning a TU's collected output into per-file shards.

use std::collections::HashMap;
use std::sync::Arc;

use flint_compile::CompileCommand;
use flint_core::{path_to_file_uri, AbsPathBuf, FileDigest};
use flint_index::{
    CollectedOutput, Ref, RefSlab, Relation, RelationSlab, Shard, Symbol, SymbolSlab,
};
use flint_storage::ShardStorage;

use crate::indexer::IndexerInner;
use crate::registry::ShardVersion;
use crate::uri::UriMemo;

/// Bucket chosen for each symbol's canonical declaration; relations follow it.
type SymbolPlacement = HashMap<flint_core::SymbolId, AbsPathBuf>;

/// Per-file staging area for one `update` pass.
#[derive(Debug, Default)]
struct FileBucket {
    digest: FileDigest,
    symbols: Vec<Symbol>,
    refs: Vec<(flint_core::SymbolId, Ref)>,
    relations: Vec<Relation>,
}

impl IndexerInner {
    /// Split `output` into per-file buckets, persist a shard per bucket, and
    /// commit the registry and aggregator.
    ///
    /// Only files whose content changed against `snapshot` (or whose previous
    /// index had errors while this run is clean) get a bucket; data for
    /// everything else in the TU is dropped, since the stored state is
    /// already current.
    pub(crate) fn update(
        &self,
        main_file: &AbsPathBuf,
        output: CollectedOutput,
        cmd: &CompileCommand,
        snapshot: &HashMap<AbsPathBuf, ShardVersion>,
        storage: &dyn ShardStorage,
        had_errors: bool,
    ) {
        let mut uris = UriMemo::default();
        let mut files: HashMap<AbsPathBuf, FileBucket> = HashMap::new();

        // Decide which files to (re)write. Missing headers never show up
        // here: the graph only contains files the frontend actually opened.
        for node in output.sources.iter() {
            let Some(path) = uris.resolve(&node.uri) else {
                continue;
            };
            let rewrite = match snapshot.get(path) {
                None => true,
                Some(version) => {
                    version.digest != node.digest || (version.had_errors && !had_errors)
                }
            };
            if rewrite {
                files.entry(path.clone()).or_default().digest = node.digest;
            }
        }

        // Place symbols. A symbol declared in one file and defined in
        // another goes into both buckets, so index merging can prefer the
        // canonical declaration over forward declarations seen elsewhere.
        let mut placement = SymbolPlacement::new();
        for symbol in output.symbols.iter() {
            if let Some(declaration) = &symbol.canonical_declaration {
                if let Some(path) = uris.resolve(&declaration.file_uri) {
                    if let Some(bucket) = files.get_mut(path) {
                        let path = path.clone();
                        bucket.symbols.push(symbol.clone());
                        placement.insert(symbol.id, path);
                    }
                }
            }
            if let Some(definition) = &symbol.definition {
                let same_file = symbol
                    .canonical_declaration
                    .as_ref()
                    .is_some_and(|declaration| declaration.file_uri == definition.file_uri);
                if !same_file {
                    if let Some(path) = uris.resolve(&definition.file_uri) {
                        if let Some(bucket) = files.get_mut(path) {
                            bucket.symbols.push(symbol.clone());
                        }
                    }
                }
            }
        }

        // Place references with the symbol they resolve to.
        for (id, refs) in output.refs.iter() {
            for reference in refs {
                if let Some(path) = uris.resolve(&reference.location.file_uri) {
                    if let Some(bucket) = files.get_mut(path) {
                        bucket.refs.push((id, reference.clone()));
                    }
                }
            }
        }

        // Relations follow their subject's canonical placement.
        for relation in output.relations.iter() {
            if let Some(path) = placement.get(&relation.subject) {
                if let Some(bucket) = files.get_mut(path) {
                    bucket.relations.push(relation.clone());
                }
            }
        }

        for (path, bucket) in files {
            let mut symbols = SymbolSlab::builder();
            for symbol in bucket.symbols {
                symbols.insert(symbol);
            }
            let symbols = symbols.build();

            let mut refs = RefSlab::builder();
            for (id, reference) in bucket.refs {
                refs.insert(id, reference);
            }
            let refs = refs.build();

            let mut relations = RelationSlab::builder();
            for relation in bucket.relations {
                relations.insert(relation);
            }
            let relations = relations.build();

            let is_main_file = path == *main_file;
            let shard = Shard {
                symbols: Some(symbols.clone()),
                refs: Some(refs.clone()),
                relations: Some(relations.clone()),
                sources: Some(output.sources.sub_graph(&path_to_file_uri(&path))),
                // One stored version per header; only the TU's own shard
                // knows how to rebuild the TU.
                cmd: is_main_file.then(|| cmd.clone()),
            };

            // The shard must hit storage before the in-memory version is
            // bumped, so a crash between the two re-indexes instead of
            // trusting a shard that was never written.
            if let Err(err) = storage.store_shard(&path, &shard) {
                tracing::error!(
                    target = "flint.indexer",
                    file = %path,
                    error = %err,
                    "failed to write shard"
                );
            }

            {
                let mut versions = self.versions.lock();
                if let Some(previous) = versions.get(path.as_path()) {
                    // Already up to date, unless the previous index was
                    // broken and this one is not.
                    if previous.digest == bucket.digest && !(previous.had_errors && !had_errors) {
                        continue;
                    }
                }
                versions.insert(
                    path.clone(),
                    ShardVersion {
                        digest: bucket.digest,
                        had_errors,
                    },
                );

                // This can clobber a newer version committed by another
                // worker after our snapshot; the next run over either TU
                // straightens the registry out again.
                self.symbols.update(
                    &path,
                    Some(Arc::new(symbols)),
                    Some(Arc::new(refs)),
                    Some(Arc::new(relations)),
                    is_main_file,
                );
            }
        }
    }
}
