//! Compile commands and the compilation-database capability.
//!
//! The database collaborator answers "how do I compile this file" and pushes
//! change notifications when its command set changes. `StaticDb` is a
//! fixed-configuration implementation used by tests and one-shot runs.

mod db;

pub use db::{ChangedCallback, CompilationDatabase, StaticDb, WatchSubscription};

use std::path::PathBuf;

use flint_core::AbsPathBuf;
use serde::{Deserialize, Serialize};

/// One translation-unit invocation of the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileCommand {
    /// Main file of the TU; absolute, or relative to `directory`.
    pub filename: PathBuf,
    /// Working directory the command was recorded in.
    pub directory: PathBuf,
    /// Full argument vector, compiler executable included.
    pub arguments: Vec<String>,
}

impl CompileCommand {
    /// The TU's canonical absolute path.
    pub fn absolute_path(&self) -> Option<AbsPathBuf> {
        AbsPathBuf::resolve(&self.filename, &self.directory)
    }
}

/// Project facts attached to a compile command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectInfo {
    /// Root of the project's sources; keys per-project shard storage.
    pub source_root: PathBuf,
}
