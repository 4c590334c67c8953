//! Symbols, references, relations, and their immutable slabs.

use std::collections::BTreeMap;

use flint_core::SymbolId;
use serde::{Deserialize, Serialize};

/// A source location expressed as a `file:` URI plus a 0-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file_uri: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file_uri: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file_uri: file_uri.into(),
            line,
            column,
        }
    }
}

/// A declared entity as reported by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    /// Where the symbol is declared in its canonical header, if anywhere.
    pub canonical_declaration: Option<Location>,
    /// Where the symbol is defined, if the TU saw a definition.
    pub definition: Option<Location>,
}

/// A single use of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    BaseOf,
    OverriddenBy,
}

/// A directed edge between two symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub subject: SymbolId,
    pub kind: RelationKind,
    pub object: SymbolId,
}

/// An immutable batch of symbols, at most one per id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolSlab {
    symbols: BTreeMap<SymbolId, Symbol>,
}

impl SymbolSlab {
    pub fn builder() -> SymbolSlabBuilder {
        SymbolSlabBuilder::default()
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.symbols.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SymbolSlabBuilder {
    symbols: BTreeMap<SymbolId, Symbol>,
}

impl SymbolSlabBuilder {
    /// Insert a symbol; a later insert with the same id replaces the earlier.
    pub fn insert(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol.id, symbol);
    }

    pub fn build(self) -> SymbolSlab {
        SymbolSlab {
            symbols: self.symbols,
        }
    }
}

/// An immutable batch of references, grouped by the symbol they resolve to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefSlab {
    refs: BTreeMap<SymbolId, Vec<Ref>>,
}

impl RefSlab {
    pub fn builder() -> RefSlabBuilder {
        RefSlabBuilder::default()
    }

    pub fn get(&self, id: SymbolId) -> &[Ref] {
        self.refs.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &[Ref])> {
        self.refs.iter().map(|(id, refs)| (*id, refs.as_slice()))
    }

    /// Total number of references across all symbols.
    pub fn len(&self) -> usize {
        self.refs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RefSlabBuilder {
    refs: BTreeMap<SymbolId, Vec<Ref>>,
}

impl RefSlabBuilder {
    pub fn insert(&mut self, id: SymbolId, reference: Ref) {
        self.refs.entry(id).or_default().push(reference);
    }

    pub fn build(self) -> RefSlab {
        RefSlab { refs: self.refs }
    }
}

/// An immutable batch of relations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationSlab {
    relations: Vec<Relation>,
}

impl RelationSlab {
    pub fn builder() -> RelationSlabBuilder {
        RelationSlabBuilder::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RelationSlabBuilder {
    relations: Vec<Relation>,
}

impl RelationSlabBuilder {
    pub fn insert(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    pub fn build(self) -> RelationSlab {
        RelationSlab {
            relations: self.relations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(id: u64, name: &str) -> Symbol {
        Symbol {
            id: SymbolId::from_raw(id),
            name: name.to_string(),
            canonical_declaration: Some(Location::new("file:///p/a.h", 1, 0)),
            definition: None,
        }
    }

    #[test]
    fn symbol_slab_replaces_duplicates_by_id() {
        let mut builder = SymbolSlab::builder();
        builder.insert(symbol(1, "first"));
        builder.insert(symbol(1, "second"));
        builder.insert(symbol(2, "other"));
        let slab = builder.build();

        assert_eq!(slab.len(), 2);
        assert_eq!(slab.get(SymbolId::from_raw(1)).unwrap().name, "second");
    }

    #[test]
    fn ref_slab_counts_all_references() {
        let mut builder = RefSlab::builder();
        builder.insert(
            SymbolId::from_raw(1),
            Ref {
                location: Location::new("file:///p/a.cc", 3, 4),
            },
        );
        builder.insert(
            SymbolId::from_raw(1),
            Ref {
                location: Location::new("file:///p/a.cc", 9, 4),
            },
        );
        let slab = builder.build();

        assert_eq!(slab.len(), 2);
        assert_eq!(slab.get(SymbolId::from_raw(1)).len(), 2);
        assert!(slab.get(SymbolId::from_raw(2)).is_empty());
    }
}
