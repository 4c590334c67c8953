//! The per-TU include graph.
//!
//! Nodes are keyed by `file:` URI; edges are direct includes. The graph is a
//! general multigraph: cycles and self-edges are legal, so traversals must
//! carry a visited set instead of recursing.

use std::collections::BTreeMap;
use std::ops::BitOr;

use flint_core::FileDigest;
use serde::{Deserialize, Serialize};

/// Per-file source flags recorded in the include graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceFlags(u8);

impl SourceFlags {
    pub const NONE: SourceFlags = SourceFlags(0);
    /// The file is a translation-unit main file.
    pub const IS_TU: SourceFlags = SourceFlags(1);
    /// Indexing this file saw uncompilable diagnostics.
    pub const HAD_ERRORS: SourceFlags = SourceFlags(1 << 1);

    pub fn contains(self, other: SourceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: SourceFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for SourceFlags {
    type Output = SourceFlags;

    fn bitor(self, rhs: SourceFlags) -> SourceFlags {
        SourceFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncludeGraphNode {
    pub uri: String,
    pub digest: FileDigest,
    pub flags: SourceFlags,
    pub direct_includes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncludeGraph {
    nodes: BTreeMap<String, IncludeGraphNode>,
}

impl IncludeGraph {
    pub fn insert(&mut self, node: IncludeGraphNode) {
        self.nodes.insert(node.uri.clone(), node);
    }

    pub fn get(&self, uri: &str) -> Option<&IncludeGraphNode> {
        self.nodes.get(uri)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IncludeGraphNode> {
        self.nodes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut IncludeGraphNode> {
        self.nodes.values_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Mark every node as having seen uncompilable diagnostics.
    pub fn mark_had_errors(&mut self) {
        for node in self.nodes.values_mut() {
            node.flags.insert(SourceFlags::HAD_ERRORS);
        }
    }

    /// The one-hop sub-graph persisted with a file's shard.
    ///
    /// Keeps the node for `uri` with its digest, flags, and edges; every
    /// direct include becomes an empty node so edge URIs always point into
    /// the keys of the returned graph. A `uri` absent from this graph yields
    /// an empty node with no edges.
    pub fn sub_graph(&self, uri: &str) -> IncludeGraph {
        let mut node = self.nodes.get(uri).cloned().unwrap_or_default();
        node.uri = uri.to_string();

        let mut out = IncludeGraph::default();
        for include in &node.direct_includes {
            if include == uri {
                continue;
            }
            out.insert(IncludeGraphNode {
                uri: include.clone(),
                ..IncludeGraphNode::default()
            });
        }
        out.insert(node);
        out
    }
}
