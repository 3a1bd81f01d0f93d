//! Modules and the per-node module catalog
//!
//! A module is a named set of async entry points. Compiling a module inside
//! a process resolves its name through the node's catalog and hands the
//! process a module resource it can spawn from.

use crate::error::{Result, RuntimeError, Trap};
use crate::process::ProcessContext;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;
use types::Value;

/// Type-erased entry point
pub type EntryFn =
    Arc<dyn Fn(ProcessContext, Vec<Value>) -> BoxFuture<'static, std::result::Result<(), Trap>> + Send + Sync>;

pub struct Module {
    name: String,
    entries: HashMap<String, EntryFn>,
}

impl Module {
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self, entry: &str) -> Result<EntryFn> {
        self.entries
            .get(entry)
            .cloned()
            .ok_or_else(|| RuntimeError::EntryPointNotFound {
                module: self.name.clone(),
                entry: entry.to_string(),
            })
    }

    pub fn has_entry(&self, entry: &str) -> bool {
        self.entries.contains_key(entry)
    }

    pub fn entry_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("entries", &self.entry_names())
            .finish()
    }
}

pub struct ModuleBuilder {
    name: String,
    entries: HashMap<String, EntryFn>,
}

impl ModuleBuilder {
    /// Add an entry point; a later entry with the same name replaces it
    pub fn entry<F, Fut>(mut self, name: impl Into<String>, entry: F) -> Self
    where
        F: Fn(ProcessContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), Trap>> + Send + 'static,
    {
        let entry: EntryFn = Arc::new(move |ctx, args| entry(ctx, args).boxed());
        self.entries.insert(name.into(), entry);
        self
    }

    pub fn build(self) -> Arc<Module> {
        Arc::new(Module {
            name: self.name,
            entries: self.entries,
        })
    }
}

/// Modules a node can compile, keyed by name
#[derive(Debug, Default)]
pub struct ModuleCatalog {
    modules: RwLock<HashMap<String, Arc<Module>>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module, returning the one it replaced
    pub fn register(&self, module: Arc<Module>) -> Option<Arc<Module>> {
        debug!(module = %module.name(), "Registering module");
        self.modules.write().insert(module.name().to_string(), module)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Module>> {
        self.modules
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::ModuleNotFound {
                module: name.to_string(),
            })
    }

    /// Resolve raw module bytes; the bytes carry the module's name
    pub fn compile(&self, bytes: &[u8]) -> Result<Arc<Module>> {
        match std::str::from_utf8(bytes) {
            Ok(name) => self.get(name),
            Err(_) => Err(RuntimeError::ModuleNotFound {
                module: String::from_utf8_lossy(bytes).into_owned(),
            }),
        }
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.write().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Default)]
struct DirectoryTable {
    ids: HashMap<String, u64>,
    names: Vec<String>,
}

/// Numeric module ids, assigned by name on first use and starting at 1.
///
/// A cluster keeps one directory for all its nodes, so an id handed out on
/// one node names the same module on every other.
#[derive(Debug, Default)]
pub struct ModuleDirectory {
    table: RwLock<DirectoryTable>,
}

impl ModuleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self, name: &str) -> u64 {
        let known = self.table.read().ids.get(name).copied();
        if let Some(id) = known {
            return id;
        }
        let mut table = self.table.write();
        if let Some(id) = table.ids.get(name) {
            return *id;
        }
        table.names.push(name.to_string());
        let id = table.names.len() as u64;
        table.ids.insert(name.to_string(), id);
        id
    }

    pub fn name(&self, id: u64) -> Option<String> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.table.read().names.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> Arc<Module> {
        Module::builder("worker")
            .entry("run", |_ctx, _args| async { Ok(()) })
            .entry("fail", |_ctx, _args| async { Err(Trap::abort("boom")) })
            .build()
    }

    #[test]
    fn test_entry_lookup() {
        let module = module();
        assert!(module.entry("run").is_ok());
        assert_eq!(module.entry_names(), vec!["fail", "run"]);
        assert!(matches!(
            module.entry("missing"),
            Err(RuntimeError::EntryPointNotFound { .. })
        ));
    }

    #[test]
    fn test_catalog_compile() {
        let catalog = ModuleCatalog::new();
        assert!(catalog.register(module()).is_none());

        assert_eq!(catalog.compile(b"worker").unwrap().name(), "worker");
        assert!(matches!(
            catalog.compile(b"other"),
            Err(RuntimeError::ModuleNotFound { .. })
        ));
        assert!(catalog.compile(&[0xff, 0xfe]).is_err());

        catalog.remove("worker");
        assert!(catalog.names().is_empty());
    }

    #[test]
    fn test_directory_ids_are_stable() {
        let directory = ModuleDirectory::new();
        let worker = directory.id("worker");
        assert_eq!(worker, 1);
        assert_eq!(directory.id("other"), 2);
        assert_eq!(directory.id("worker"), worker);
        assert_eq!(directory.name(worker).as_deref(), Some("worker"));
        assert_eq!(directory.name(0), None);
        assert_eq!(directory.name(3), None);
    }
}
