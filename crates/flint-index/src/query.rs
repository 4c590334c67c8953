//! The merged query index and its atomically swappable handle.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use flint_core::SymbolId;

use crate::file_symbols::DuplicateHandling;
use crate::{Ref, Relation, Symbol};

/// An immutable point-in-time view over every aggregated file slab.
///
/// Built in one pass by [`crate::FileSymbols::build_index`] and published
/// through [`SwapIndex`]; queries never see a partially built index.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    symbols: HashMap<SymbolId, Symbol>,
    by_name: BTreeMap<String, Vec<SymbolId>>,
    refs: HashMap<SymbolId, Vec<Ref>>,
    relations: HashMap<SymbolId, Vec<Relation>>,
    reference_tallies: HashMap<SymbolId, usize>,
    files: usize,
}

impl SymbolIndex {
    pub(crate) fn insert_symbol(&mut self, symbol: Symbol) {
        self.by_name
            .entry(symbol.name.clone())
            .or_default()
            .push(symbol.id);
        self.symbols.insert(symbol.id, symbol);
    }

    /// Insert a symbol that may already be present from another file's slab.
    ///
    /// A symbol declared in one file and defined in another is stored whole
    /// in both slabs, so id collisions here are the common case rather than
    /// an anomaly.
    pub(crate) fn merge_symbol(&mut self, symbol: Symbol, duplicates: DuplicateHandling) {
        if let Some(existing) = self.symbols.get_mut(&symbol.id) {
            match duplicates {
                DuplicateHandling::PickOne => {}
                DuplicateHandling::Merge => {
                    if existing.definition.is_none() && symbol.definition.is_some() {
                        *existing = symbol;
                    } else if existing.canonical_declaration.is_none() {
                        existing.canonical_declaration = symbol.canonical_declaration;
                    }
                }
            }
            return;
        }
        self.insert_symbol(symbol);
    }

    /// Order every reference list by location. Heavy builds pay for this so
    /// query results are stable across rebuilds.
    pub(crate) fn sort_refs(&mut self) {
        for refs in self.refs.values_mut() {
            refs.sort_by(|a, b| {
                (&a.location.file_uri, a.location.line, a.location.column).cmp(&(
                    &b.location.file_uri,
                    b.location.line,
                    b.location.column,
                ))
            });
        }
    }

    pub(crate) fn insert_refs(&mut self, id: SymbolId, refs: &[Ref], count_references: bool) {
        self.refs.entry(id).or_default().extend_from_slice(refs);
        if count_references {
            *self.reference_tallies.entry(id).or_default() += refs.len();
        }
    }

    pub(crate) fn insert_relation(&mut self, relation: Relation) {
        self.relations
            .entry(relation.subject)
            .or_default()
            .push(relation);
    }

    pub(crate) fn note_file(&mut self) {
        self.files += 1;
    }

    pub(crate) fn dedup_names(&mut self) {
        for ids in self.by_name.values_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    /// All symbols with exactly this name.
    pub fn lookup(&self, name: &str) -> Vec<&Symbol> {
        self.by_name
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| self.symbols.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn refs(&self, id: SymbolId) -> &[Ref] {
        self.refs.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn relations_of(&self, subject: SymbolId) -> &[Relation] {
        self.relations
            .get(&subject)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// How many uses of `id` were seen in files whose references count
    /// toward global tallies (TU main files).
    pub fn reference_tally(&self, id: SymbolId) -> usize {
        self.reference_tallies.get(&id).copied().unwrap_or(0)
    }

    /// Number of file slabs merged into this index.
    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

/// Shared handle to the live query index.
///
/// Writers publish a fully built replacement with [`SwapIndex::swap`]; the
/// store is a single atomic pointer exchange. Readers take lock-free
/// snapshots and keep the old index alive for as long as they hold it.
#[derive(Debug, Default)]
pub struct SwapIndex {
    inner: ArcSwap<SymbolIndex>,
}

impl SwapIndex {
    pub fn new(initial: SymbolIndex) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial),
        }
    }

    pub fn snapshot(&self) -> Arc<SymbolIndex> {
        self.inner.load_full()
    }

    pub fn swap(&self, index: SymbolIndex) {
        self.inner.store(Arc::new(index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Location;

    fn symbol(id: u64, name: &str) -> Symbol {
        Symbol {
            id: SymbolId::from_raw(id),
            name: name.to_string(),
            canonical_declaration: None,
            definition: None,
        }
    }

    #[test]
    fn lookup_by_name_spans_ids() {
        let mut index = SymbolIndex::default();
        index.insert_symbol(symbol(1, "open"));
        index.insert_symbol(symbol(2, "open"));
        index.insert_symbol(symbol(3, "close"));
        index.dedup_names();

        assert_eq!(index.lookup("open").len(), 2);
        assert_eq!(index.lookup("close").len(), 1);
        assert!(index.lookup("missing").is_empty());
    }

    #[test]
    fn snapshots_survive_a_swap() {
        let swap = SwapIndex::default();
        let before = swap.snapshot();
        assert_eq!(before.symbol_count(), 0);

        let mut replacement = SymbolIndex::default();
        replacement.insert_symbol(symbol(7, "late"));
        swap.swap(replacement);

        // The old snapshot is unaffected; a fresh one sees the new index.
        assert_eq!(before.symbol_count(), 0);
        assert_eq!(swap.snapshot().symbol_count(), 1);
    }

    #[test]
    fn reference_tallies_only_count_flagged_files() {
        let mut index = SymbolIndex::default();
        let id = SymbolId::from_raw(9);
        let reference = Ref {
            location: Location::new("file:///p/a.cc", 1, 1),
        };
        index.insert_refs(id, &[reference.clone()], true);
        index.insert_refs(id, &[reference], false);

        assert_eq!(index.refs(id).len(), 2);
        assert_eq!(index.reference_tally(id), 1);
    }
}
