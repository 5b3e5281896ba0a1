//! Module registry: canonical module rows and the hottest-modules view.

use super::records::Module;
use crate::observable::ObservableCollection;
use crate::parser::ModuleObservation;
use crate::store::{Database, StoreSlot, StoreTx};
use crate::utils::error::ModelError;
use log::{debug, info};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// Name -> module lookup cache
///
/// Every write to the modules table invalidates it, as does attaching or
/// detaching storage.
#[derive(Debug, Default)]
pub struct ModuleCache {
    by_name: HashMap<String, Module>,
    generation: u64,
}

impl ModuleCache {
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.by_name.get(name)
    }

    pub fn insert(&mut self, module: Module) {
        self.by_name.insert(module.name.clone(), module);
    }

    pub fn invalidate(&mut self) {
        self.by_name.clear();
        self.generation += 1;
    }

    /// Number of invalidations so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Owner of every module row
///
/// **Public** - exposes the "all modules with calls, hottest first" view
pub struct ModuleRegistry {
    store: Rc<StoreSlot>,
    cache: RefCell<ModuleCache>,
    all_with_calls: Rc<ObservableCollection<Module>>,
}

impl ModuleRegistry {
    pub fn new(store: Rc<StoreSlot>) -> Self {
        Self {
            store,
            cache: RefCell::new(ModuleCache::default()),
            all_with_calls: Rc::new(ObservableCollection::new()),
        }
    }

    /// Live view of modules with at least one call, hottest first
    ///
    /// Refreshed after every write; it is only guaranteed current once the
    /// write that changed it has returned.
    pub fn all_with_calls(&self) -> Rc<ObservableCollection<Module>> {
        Rc::clone(&self.all_with_calls)
    }

    /// Look up a module by name, reading through the cache
    pub fn resolve(&self, name: &str, tx: &StoreTx<'_>) -> Result<Module, ModelError> {
        if let Some(module) = self.cache.borrow().get(name) {
            return Ok(module.clone());
        }

        let module = tx
            .module_by_name(name)?
            .ok_or_else(|| ModelError::UnknownModule(name.to_string()))?;
        self.cache.borrow_mut().insert(module.clone());
        Ok(module)
    }

    /// Like `resolve`, but registers a placeholder row for unseen names
    ///
    /// The placeholder uses the name as its path, base 0 and `main = false`;
    /// a later `upsert` with the real observation fills those in. Function
    /// names are fixed when a function is first seen, so functions of a main
    /// binary counted before its observation keep the library-style prefix;
    /// only later ones get `sub_`.
    pub(crate) fn resolve_or_register(
        &self,
        name: &str,
        tx: &StoreTx<'_>,
    ) -> Result<Module, ModelError> {
        match self.resolve(name, tx) {
            Err(ModelError::UnknownModule(_)) => {
                debug!("Registering unseen module {}", name);
                let observation = ModuleObservation {
                    name: name.to_string(),
                    path: name.to_string(),
                    base: 0,
                    main: false,
                };
                tx.insert_module(&observation)?;
                self.resolve(name, tx)
            }
            other => other,
        }
    }

    /// Insert unseen modules, refresh path, base and main flag of known ones
    pub fn upsert(&self, batch: &[ModuleObservation]) -> Result<(), ModelError> {
        let database = self.store.get()?;
        let (inserted, updated) = database.transaction(|tx| {
            let mut inserted = 0;
            let mut updated = 0;
            for module in batch {
                if tx.module_exists(&module.name)? {
                    tx.update_module(module)?;
                    updated += 1;
                } else {
                    tx.insert_module(module)?;
                    inserted += 1;
                }
            }
            Ok::<_, ModelError>((inserted, updated))
        })?;
        self.cache.borrow_mut().invalidate();
        debug!("Upserted modules: {} new, {} refreshed", inserted, updated);

        self.reload(&database)
    }

    /// Add call deltas to module totals in one transaction
    pub fn increment_calls(&self, deltas: &BTreeMap<i64, u64>) -> Result<(), ModelError> {
        let database = self.store.get()?;
        database.transaction(|tx| {
            for (&id, &delta) in deltas {
                tx.increment_module_calls(id, delta)?;
            }
            Ok::<_, ModelError>(())
        })?;
        self.cache.borrow_mut().invalidate();

        self.reload(&database)
    }

    /// Storage was attached: reset the cache and load the view
    pub(crate) fn attach(&self) -> Result<(), ModelError> {
        self.cache.borrow_mut().invalidate();
        let database = self.store.get()?;
        self.reload(&database)?;
        info!(
            "Loaded {} modules with calls",
            self.all_with_calls.len()
        );
        Ok(())
    }

    /// Storage was detached: reset the cache and empty the view
    pub(crate) fn detach(&self) {
        self.cache.borrow_mut().invalidate();
        self.all_with_calls.unload();
    }

    pub fn cache_generation(&self) -> u64 {
        self.cache.borrow().generation()
    }

    fn reload(&self, database: &Database) -> Result<(), ModelError> {
        let modules = database.transaction(|tx| tx.modules_with_calls())?;
        self.all_with_calls.load(modules);
        Ok(())
    }
}
