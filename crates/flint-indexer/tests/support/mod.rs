//! Shared fixtures: an in-memory project with a scripted frontend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flint_compile::{CompilationDatabase, CompileCommand, ProjectInfo, StaticDb};
use flint_core::{path_to_file_uri, FileDigest, SymbolId};
use flint_index::{
    CollectedOutput, FileFilter, Frontend, FrontendError, IncludeGraph, IncludeGraphNode,
    Location, Ref, RefSlab, Relation, RelationSlab, SourceFlags, Symbol, SymbolSlab,
};
use flint_indexer::{BackgroundIndexer, BackgroundIndexerConfig};
use flint_storage::{MemoryStorage, ShardStorage, StorageFactory};
use flint_vfs::{FileSystem, MemoryFs};

pub fn location(path: &str, line: u32) -> Location {
    Location::new(path_to_file_uri(Path::new(path)), line, 0)
}

pub fn symbol(
    id: u64,
    name: &str,
    declaration: Option<(&str, u32)>,
    definition: Option<(&str, u32)>,
) -> Symbol {
    Symbol {
        id: SymbolId::from_raw(id),
        name: name.to_string(),
        canonical_declaration: declaration.map(|(path, line)| location(path, line)),
        definition: definition.map(|(path, line)| location(path, line)),
    }
}

/// What the scripted frontend reports for one file of a TU.
#[derive(Clone, Default)]
pub struct FileOutline {
    pub path: PathBuf,
    pub includes: Vec<PathBuf>,
    pub symbols: Vec<Symbol>,
    pub refs: Vec<(SymbolId, Ref)>,
    pub relations: Vec<Relation>,
    pub fails_to_compile: bool,
}

impl FileOutline {
    pub fn new(path: &str) -> Self {
        Self {
            path: PathBuf::from(path),
            ..Self::default()
        }
    }

    pub fn include(mut self, path: &str) -> Self {
        self.includes.push(PathBuf::from(path));
        self
    }

    pub fn symbol(mut self, symbol: Symbol) -> Self {
        self.symbols.push(symbol);
        self
    }

    /// A reference to `id` located in this file.
    pub fn reference(mut self, id: u64, line: u32) -> Self {
        let path = self.path.clone();
        self.refs.push((
            SymbolId::from_raw(id),
            Ref {
                location: Location::new(path_to_file_uri(&path), line, 0),
            },
        ));
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn broken(mut self) -> Self {
        self.fails_to_compile = true;
        self
    }
}

/// Scripted stand-in for the compiler frontend.
///
/// Each TU is a list of file outlines, main file first. Digests come from
/// the file system at collection time, so editing a file through the
/// `MemoryFs` behaves like a real content change. Collection respects the
/// file filter and records every decision it makes.
#[derive(Default)]
pub struct FakeFrontend {
    tus: Mutex<HashMap<PathBuf, Vec<FileOutline>>>,
    runs: AtomicUsize,
    decisions: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeFrontend {
    pub fn script(&self, main: &str, files: Vec<FileOutline>) {
        let mut tus = self.tus.lock().unwrap();
        tus.insert(PathBuf::from(main), files);
    }

    /// How many TU collections ran.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Every (file, admitted) decision the filter made, in order.
    pub fn decisions(&self) -> Vec<(PathBuf, bool)> {
        self.decisions.lock().unwrap().clone()
    }

    pub fn clear_decisions(&self) {
        self.decisions.lock().unwrap().clear();
    }
}

impl Frontend for FakeFrontend {
    fn collect(
        &self,
        cmd: &CompileCommand,
        fs: &dyn FileSystem,
        filter: &FileFilter<'_>,
    ) -> Result<CollectedOutput, FrontendError> {
        let main = cmd
            .absolute_path()
            .ok_or_else(|| FrontendError::Invocation {
                reason: format!("unresolvable filename {:?}", cmd.filename),
            })?;
        let outline = {
            let tus = self.tus.lock().unwrap();
            tus.get(main.as_path())
                .cloned()
                .ok_or_else(|| FrontendError::Invocation {
                    reason: format!("no scripted TU for {main}"),
                })?
        };
        self.runs.fetch_add(1, Ordering::SeqCst);

        let mut symbols = SymbolSlab::builder();
        let mut refs = RefSlab::builder();
        let mut relations = RelationSlab::builder();
        let mut sources = IncludeGraph::default();
        let mut had_errors = false;

        for (position, file) in outline.iter().enumerate() {
            let bytes = match fs.read_bytes(&file.path) {
                Ok(bytes) => bytes,
                Err(err) if position == 0 => {
                    return Err(FrontendError::Execution {
                        reason: format!("cannot open main file: {err}"),
                    })
                }
                // A missing include never makes it into the graph.
                Err(_) => continue,
            };
            let digest = FileDigest::of_bytes(&bytes);

            let mut flags = SourceFlags::NONE;
            if position == 0 {
                flags.insert(SourceFlags::IS_TU);
            }
            sources.insert(IncludeGraphNode {
                uri: path_to_file_uri(&file.path),
                digest,
                flags,
                direct_includes: file
                    .includes
                    .iter()
                    .map(|include| path_to_file_uri(include))
                    .collect(),
            });
            if file.fails_to_compile {
                had_errors = true;
            }

            let admitted = filter(&file.path, digest);
            self.decisions
                .lock()
                .unwrap()
                .push((file.path.clone(), admitted));
            if !admitted {
                continue;
            }

            for symbol in &file.symbols {
                symbols.insert(symbol.clone());
            }
            for (id, reference) in &file.refs {
                refs.insert(*id, reference.clone());
            }
            for relation in &file.relations {
                relations.insert(relation.clone());
            }
        }

        Ok(CollectedOutput {
            symbols: symbols.build(),
            refs: refs.build(),
            relations: relations.build(),
            sources,
            had_errors,
        })
    }
}

/// An in-memory project: filesystem, compilation database, scripted
/// frontend, and shared shard storage.
pub struct TestProject {
    pub fs: Arc<MemoryFs>,
    pub cdb: Arc<StaticDb>,
    pub frontend: Arc<FakeFrontend>,
    pub storage: Arc<MemoryStorage>,
}

impl TestProject {
    pub fn new() -> Self {
        // Keep worker threads at normal OS priority; scheduling of
        // idle-class threads is too host-dependent for tests.
        flint_indexer::set_prevent_starvation(true);
        Self {
            fs: Arc::new(MemoryFs::new()),
            cdb: Arc::new(StaticDb::new()),
            frontend: Arc::new(FakeFrontend::default()),
            storage: Arc::new(MemoryStorage::new()),
        }
    }

    /// Register a compile command for an absolute `file` under `/p`.
    pub fn add_command(&self, file: &str) -> CompileCommand {
        let cmd = CompileCommand {
            filename: PathBuf::from(file),
            directory: PathBuf::from("/p"),
            arguments: vec!["cc".to_string(), "-c".to_string(), file.to_string()],
        };
        self.cdb.insert(
            cmd.clone(),
            ProjectInfo {
                source_root: PathBuf::from("/p"),
            },
        );
        cmd
    }

    pub fn indexer(&self) -> BackgroundIndexer {
        self.indexer_with(BackgroundIndexerConfig {
            thread_pool_size: 1,
            build_index_period_ms: 0,
        })
    }

    pub fn indexer_with(&self, config: BackgroundIndexerConfig) -> BackgroundIndexer {
        let storage = Arc::clone(&self.storage);
        let factory: StorageFactory =
            Arc::new(move |_source_root: &Path| Arc::clone(&storage) as Arc<dyn ShardStorage>);
        BackgroundIndexer::new(
            Arc::clone(&self.fs) as Arc<dyn FileSystem>,
            Arc::clone(&self.cdb) as Arc<dyn CompilationDatabase>,
            Arc::clone(&self.frontend) as Arc<dyn Frontend>,
            factory,
            config,
        )
    }
}
