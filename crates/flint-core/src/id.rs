//! Strongly-typed IDs used across flint.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a symbol, assigned by the frontend collector.
///
/// Unlike arena indexes this survives across translation units and sessions:
/// the collector derives it from the symbol's mangled name, so the same
/// declaration observed from two TUs produces the same id.
#[derive(
    Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SymbolId(u64);

impl SymbolId {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({:#018x})", self.0)
    }
}
