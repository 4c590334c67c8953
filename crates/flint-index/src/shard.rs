use flint_compile::CompileCommand;
use serde::{Deserialize, Serialize};

use crate::{IncludeGraph, RefSlab, RelationSlab, SymbolSlab};

/// The per-file unit of persisted index information.
///
/// Shards are replaced whole; there is no partial invalidation. Only the
/// shard of a TU's main file carries the compile command — headers are
/// indexed through whichever TU included them and have no command of their
/// own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    pub symbols: Option<SymbolSlab>,
    pub refs: Option<RefSlab>,
    pub relations: Option<RelationSlab>,
    /// One-hop include sub-graph for this file; `None` in shards written by
    /// older sessions that crashed mid-write.
    pub sources: Option<IncludeGraph>,
    pub cmd: Option<CompileCommand>,
}
