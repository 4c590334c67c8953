//! Index value types and the in-memory symbol aggregation layer.
//!
//! The frontend collector produces immutable per-TU slabs of symbols,
//! references, and relations together with an include graph. This crate owns
//! those types, the per-file slab aggregator ([`FileSymbols`]), the merged
//! query index ([`SymbolIndex`]) and its atomically swappable handle
//! ([`SwapIndex`]), plus the [`Shard`] schema persisted per file.

mod file_symbols;
mod frontend;
mod include_graph;
mod query;
mod shard;
mod symbols;

pub use file_symbols::{DuplicateHandling, FileSymbols, IndexType};
pub use frontend::{CollectedOutput, FileFilter, Frontend, FrontendError};
pub use include_graph::{IncludeGraph, IncludeGraphNode, SourceFlags};
pub use query::{SwapIndex, SymbolIndex};
pub use shard::Shard;
pub use symbols::{
    Location, Ref, RefSlab, RefSlabBuilder, Relation, RelationKind, RelationSlab,
    RelationSlabBuilder, Symbol, SymbolSlab, SymbolSlabBuilder,
};
