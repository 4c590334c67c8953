use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use flint_core::AbsPathBuf;

use crate::{CompileCommand, ProjectInfo};

pub type ChangedCallback = Box<dyn Fn(Vec<PathBuf>) + Send + Sync>;

/// Source of compile commands plus change notifications.
pub trait CompilationDatabase: Send + Sync {
    /// Look up the compile command and project facts for `file`.
    fn compile_command(&self, file: &Path) -> Option<(CompileCommand, ProjectInfo)>;

    /// Subscribe to command-set changes. The callback receives the affected
    /// files and may be invoked from an arbitrary thread. Dropping the
    /// returned subscription unregisters the callback.
    fn watch(&self, callback: ChangedCallback) -> WatchSubscription;
}

/// Keeps a watch callback registered for as long as it is held.
pub struct WatchSubscription {
    registry: Weak<Mutex<Vec<(u64, ChangedCallback)>>>,
    id: u64,
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut callbacks = registry.lock().expect("watch registry lock poisoned");
            callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

/// A compilation database over a fixed in-memory command set.
#[derive(Default)]
pub struct StaticDb {
    commands: Mutex<HashMap<AbsPathBuf, (CompileCommand, ProjectInfo)>>,
    watchers: Arc<Mutex<Vec<(u64, ChangedCallback)>>>,
    next_watcher: Mutex<u64>,
}

impl StaticDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command; later notifications for its file will find it.
    pub fn insert(&self, command: CompileCommand, project: ProjectInfo) {
        let Some(path) = command.absolute_path() else {
            return;
        };
        let mut commands = self.commands.lock().expect("command map lock poisoned");
        commands.insert(path, (command, project));
    }

    /// Deliver a change notification to every live watcher.
    pub fn notify(&self, changed: Vec<PathBuf>) {
        let watchers = self.watchers.lock().expect("watch registry lock poisoned");
        for (_, callback) in watchers.iter() {
            callback(changed.clone());
        }
    }
}

impl CompilationDatabase for StaticDb {
    fn compile_command(&self, file: &Path) -> Option<(CompileCommand, ProjectInfo)> {
        let path = AbsPathBuf::new(file.to_path_buf())?;
        let commands = self.commands.lock().expect("command map lock poisoned");
        commands.get(&path).cloned()
    }

    fn watch(&self, callback: ChangedCallback) -> WatchSubscription {
        let id = {
            let mut next = self.next_watcher.lock().expect("watch id lock poisoned");
            *next += 1;
            *next
        };
        let mut watchers = self.watchers.lock().expect("watch registry lock poisoned");
        watchers.push((id, callback));
        WatchSubscription {
            registry: Arc::downgrade(&self.watchers),
            id,
        }
    }
}
