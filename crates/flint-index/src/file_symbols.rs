//! Thread-safe aggregation of per-file slabs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use flint_core::AbsPathBuf;

use crate::query::SymbolIndex;
use crate::{RefSlab, RelationSlab, SymbolSlab};

/// Quality/latency trade-off for [`FileSymbols::build_index`].
///
/// `Light` is built synchronously after every indexing task when no periodic
/// rebuild is configured; `Heavy` is built by the periodic rebuilder and
/// after bulk shard loads, and additionally produces deterministically
/// ordered reference lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Light,
    Heavy,
}

/// What to do when the same symbol id is contributed by multiple files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateHandling {
    /// First occurrence wins.
    PickOne,
    /// Prefer the occurrence that carries a definition.
    Merge,
}

/// The most recent (symbols, refs, relations) triple for every indexed file.
///
/// `update` replaces slabs wholesale per file; an absent argument preserves
/// the previous slab of that kind so shard loads can fill in partial data.
#[derive(Debug, Default)]
pub struct FileSymbols {
    inner: Mutex<HashMap<AbsPathBuf, FileSlabs>>,
}

#[derive(Debug, Default, Clone)]
struct FileSlabs {
    symbols: Option<Arc<SymbolSlab>>,
    refs: Option<Arc<RefSlab>>,
    relations: Option<Arc<RelationSlab>>,
    count_references: bool,
}

impl FileSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored slabs for `path`.
    pub fn update(
        &self,
        path: &AbsPathBuf,
        symbols: Option<Arc<SymbolSlab>>,
        refs: Option<Arc<RefSlab>>,
        relations: Option<Arc<RelationSlab>>,
        count_references: bool,
    ) {
        let mut inner = self.lock_inner();
        let slabs = inner.entry(path.clone()).or_default();
        if symbols.is_some() {
            slabs.symbols = symbols;
        }
        if refs.is_some() {
            slabs.refs = refs;
        }
        if relations.is_some() {
            slabs.relations = relations;
        }
        slabs.count_references = count_references;
    }

    /// Number of files with stored slabs.
    pub fn file_count(&self) -> usize {
        self.lock_inner().len()
    }

    /// Merge every stored slab into a fresh query index.
    ///
    /// The per-file map is snapshotted under the lock; the merge itself runs
    /// on cheap `Arc` clones so concurrent `update`s are never blocked by an
    /// index build.
    pub fn build_index(&self, kind: IndexType, duplicates: DuplicateHandling) -> SymbolIndex {
        let snapshot: Vec<FileSlabs> = {
            let inner = self.lock_inner();
            inner.values().cloned().collect()
        };

        let mut index = SymbolIndex::default();
        for slabs in &snapshot {
            index.note_file();
            if let Some(symbols) = &slabs.symbols {
                for symbol in symbols.iter() {
                    index.merge_symbol(symbol.clone(), duplicates);
                }
            }
            if let Some(refs) = &slabs.refs {
                for (id, file_refs) in refs.iter() {
                    index.insert_refs(id, file_refs, slabs.count_references);
                }
            }
            if let Some(relations) = &slabs.relations {
                for relation in relations.iter() {
                    index.insert_relation(relation.clone());
                }
            }
        }
        index.dedup_names();
        if kind == IndexType::Heavy {
            index.sort_refs();
        }
        index
    }

    #[track_caller]
    fn lock_inner(&self) -> MutexGuard<'_, HashMap<AbsPathBuf, FileSlabs>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(err) => {
                let loc = std::panic::Location::caller();
                tracing::error!(
                    target = "flint.index",
                    file = loc.file(),
                    line = loc.line(),
                    error = %err,
                    "file symbols mutex poisoned; continuing with recovered guard"
                );
                err.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Location, Ref, Symbol};
    use flint_core::SymbolId;
    use pretty_assertions::assert_eq;

    fn path(raw: &str) -> AbsPathBuf {
        AbsPathBuf::new(raw).unwrap()
    }

    fn symbol_with_definition(id: u64, definition: Option<&str>) -> Symbol {
        Symbol {
            id: SymbolId::from_raw(id),
            name: "S".to_string(),
            canonical_declaration: Some(Location::new("file:///p/h.h", 1, 0)),
            definition: definition.map(|uri| Location::new(uri, 10, 0)),
        }
    }

    fn slab_of(symbol: Symbol) -> Arc<SymbolSlab> {
        let mut builder = SymbolSlab::builder();
        builder.insert(symbol);
        Arc::new(builder.build())
    }

    #[test]
    fn absent_slabs_preserve_previous_contents() {
        let aggregator = FileSymbols::new();
        let file = path("/p/a.cc");

        aggregator.update(
            &file,
            Some(slab_of(symbol_with_definition(1, None))),
            None,
            None,
            true,
        );

        let mut refs = RefSlab::builder();
        refs.insert(
            SymbolId::from_raw(1),
            Ref {
                location: Location::new("file:///p/a.cc", 2, 2),
            },
        );
        aggregator.update(&file, None, Some(Arc::new(refs.build())), None, true);

        let index = aggregator.build_index(IndexType::Light, DuplicateHandling::Merge);
        assert_eq!(index.symbol_count(), 1);
        assert_eq!(index.refs(SymbolId::from_raw(1)).len(), 1);
    }

    #[test]
    fn merge_prefers_definitions_across_files() {
        let aggregator = FileSymbols::new();
        aggregator.update(
            &path("/p/h.h"),
            Some(slab_of(symbol_with_definition(1, None))),
            None,
            None,
            false,
        );
        aggregator.update(
            &path("/p/a.cc"),
            Some(slab_of(symbol_with_definition(1, Some("file:///p/a.cc")))),
            None,
            None,
            true,
        );

        let index = aggregator.build_index(IndexType::Heavy, DuplicateHandling::Merge);
        assert_eq!(index.symbol_count(), 1);
        let merged = index.symbol(SymbolId::from_raw(1)).unwrap();
        assert!(merged.definition.is_some());
        assert_eq!(index.lookup("S").len(), 1);
        assert_eq!(index.file_count(), 2);
    }

    #[test]
    fn update_replaces_slabs_wholesale() {
        let aggregator = FileSymbols::new();
        let file = path("/p/a.cc");

        aggregator.update(
            &file,
            Some(slab_of(symbol_with_definition(1, None))),
            None,
            None,
            true,
        );
        aggregator.update(
            &file,
            Some(slab_of(symbol_with_definition(2, None))),
            None,
            None,
            true,
        );

        let index = aggregator.build_index(IndexType::Light, DuplicateHandling::PickOne);
        assert!(index.symbol(SymbolId::from_raw(1)).is_none());
        assert!(index.symbol(SymbolId::from_raw(2)).is_some());
    }
}
