use std::path::Path;

use flint_compile::CompileCommand;
use flint_core::FileDigest;
use flint_vfs::FileSystem;

use crate::{IncludeGraph, RefSlab, RelationSlab, SymbolSlab};

/// Decides, per file the frontend visits, whether to collect from it.
///
/// The frontend hands over the visited file's absolute path and the digest of
/// the content it is actually parsing.
pub type FileFilter<'a> = dyn Fn(&Path, FileDigest) -> bool + Sync + 'a;

/// Everything one frontend run produces for a TU.
#[derive(Debug, Default)]
pub struct CollectedOutput {
    pub symbols: SymbolSlab,
    pub refs: RefSlab,
    pub relations: RelationSlab,
    pub sources: IncludeGraph,
    /// The diagnostics engine reported an uncompilable error.
    pub had_errors: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    #[error("could not build a compiler invocation: {reason}")]
    Invocation { reason: String },
    #[error("collector failed during execution: {reason}")]
    Execution { reason: String },
}

/// The compiler frontend plus symbol collector, seen as one capability.
///
/// Runs a compile command to completion exactly once, consulting `filter`
/// for every visited file and collecting from the admitted ones.
pub trait Frontend: Send + Sync {
    fn collect(
        &self,
        cmd: &CompileCommand,
        fs: &dyn FileSystem,
        filter: &FileFilter<'_>,
    ) -> Result<CollectedOutput, FrontendError>;
}
