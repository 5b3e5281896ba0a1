//! Per-module function aggregation and deferred persistence.
//!
//! Each module gets one `FunctionCollection`, created the first time the
//! module is referenced. Updates are applied to the live, sorted view
//! immediately; the rows are written later by the quota scheduler in
//! batches of `FLUSH_BATCH_SIZE`.

use super::naming::function_name;
use super::records::{Function, Module};
use crate::observable::ObservableCollection;
use crate::scheduler::{Quota, QuotaScheduler, Work};
use crate::store::StoreSlot;
use crate::utils::config::FLUSH_BATCH_SIZE;
use crate::utils::error::{ModelError, StoreError};
use log::{debug, trace, warn};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// Live, sorted functions of one module plus their unflushed changes
///
/// **Public** - presentation code reaches it through `Functions::all_in_module`
pub struct FunctionCollection {
    /// Module as last resolved against the attached database
    module: RefCell<Module>,
    store: Rc<StoreSlot>,
    scheduler: Rc<QuotaScheduler>,
    items: Rc<ObservableCollection<Function>>,

    /// offset -> derived name, for every function in `items`
    names: RefCell<HashMap<u64, String>>,

    /// Dirty set: derived name -> offset of records awaiting a write
    dirty: RefCell<BTreeMap<String, u64>>,

    /// A flush unit for this collection sits in the scheduler queue
    flush_scheduled: Cell<bool>,
}

impl FunctionCollection {
    pub fn new(module: Module, store: Rc<StoreSlot>, scheduler: Rc<QuotaScheduler>) -> Self {
        Self {
            module: RefCell::new(module),
            store,
            scheduler,
            items: Rc::new(ObservableCollection::new()),
            names: RefCell::new(HashMap::new()),
            dirty: RefCell::new(BTreeMap::new()),
            flush_scheduled: Cell::new(false),
        }
    }

    pub fn module(&self) -> Module {
        self.module.borrow().clone()
    }

    /// Live view of this module's functions, hottest first
    ///
    /// The same view survives closing and reopening the database.
    pub fn observable(&self) -> Rc<ObservableCollection<Function>> {
        Rc::clone(&self.items)
    }

    /// Number of records awaiting a write
    pub fn dirty_len(&self) -> usize {
        self.dirty.borrow().len()
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled.get()
    }

    /// Apply a batch of `(offset, delta)` call counts
    ///
    /// New offsets are inserted at their rank and announced with an add.
    /// Known offsets have their count bumped; once the whole batch is in,
    /// each of them is re-ranked (move + update, or just update).
    /// Every touched record is marked dirty and a flush is scheduled.
    pub fn update(self: &Rc<Self>, updates: &[(u64, u64)]) {
        let mut updated: Vec<u64> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();

        for &(offset, calls) in updates {
            let known = self.names.borrow().get(&offset).cloned();
            let name = match known {
                Some(name) => {
                    if let Some(index) = self.items.position(|f| f.offset == offset) {
                        self.items.modify(index, |f| f.calls += calls);
                    }
                    if seen.insert(offset) {
                        updated.push(offset);
                    }
                    name
                }
                None => {
                    let module = self.module.borrow().clone();
                    let name = function_name(&module, offset);
                    trace!("New function {} in {}", name, module.name);
                    self.names.borrow_mut().insert(offset, name.clone());
                    self.items.insert_ranked(Function {
                        id: None,
                        name: name.clone(),
                        module: module.id,
                        offset,
                        calls,
                    });
                    name
                }
            };

            self.dirty.borrow_mut().insert(name, offset);
        }

        for offset in updated {
            if let Some(index) = self.items.position(|f| f.offset == offset) {
                self.items.rerank(index);
            }
        }

        self.schedule_flush();
    }

    /// Write dirty records until none are left or the quota runs out
    ///
    /// Each storage transaction covers at most `FLUSH_BATCH_SIZE` records.
    /// New records are inserted and receive their id, known ones get their
    /// count overwritten. At least one batch is written per call; the quota
    /// is checked between batches. Returns whether the dirty set is empty.
    ///
    /// Records leave the dirty set only once their batch has committed, so
    /// a failed batch stays dirty for the next attempt.
    pub fn flush(&self, quota_exceeded: &dyn Fn() -> bool) -> Result<bool, ModelError> {
        if self.dirty.borrow().is_empty() {
            return Ok(true);
        }
        let database = self.store.get()?;

        loop {
            let batch = self.next_batch();
            if batch.is_empty() {
                break;
            }

            let assigned = database.transaction(|tx| {
                let mut assigned = Vec::new();
                for function in &batch {
                    match function.id {
                        Some(id) => {
                            tx.update_function_calls(id, function.calls)?;
                        }
                        None => {
                            let id = tx.insert_function(function)?;
                            assigned.push((function.offset, id));
                        }
                    }
                }
                Ok::<_, ModelError>(assigned)
            })?;

            for (offset, id) in &assigned {
                if let Some(index) = self.items.position(|f| f.offset == *offset) {
                    self.items.modify(index, |f| f.id = Some(*id));
                }
            }
            {
                let mut dirty = self.dirty.borrow_mut();
                for function in &batch {
                    dirty.remove(&function.name);
                }
            }
            debug!(
                "Flushed {} functions of {} ({} new, {} still dirty)",
                batch.len(),
                self.module.borrow().name,
                assigned.len(),
                self.dirty_len()
            );

            if self.dirty.borrow().is_empty() {
                return Ok(true);
            }
            if quota_exceeded() {
                return Ok(false);
            }
        }

        Ok(self.dirty.borrow().is_empty())
    }

    /// Storage was attached: replace the live view with the stored rows
    ///
    /// The module is looked up again by name, since its id belongs to the
    /// database it was read from. A module the database does not know yet
    /// loads as an empty view.
    pub(crate) fn load(&self) -> Result<(), ModelError> {
        let database = self.store.get()?;
        let name = self.module.borrow().name.clone();
        let (module, functions) = database.transaction(|tx| match tx.module_by_name(&name)? {
            Some(module) => {
                let functions = tx.functions_in_module(module.id)?;
                Ok::<_, StoreError>((Some(module), functions))
            }
            None => Ok((None, Vec::new())),
        })?;
        if let Some(module) = module {
            *self.module.borrow_mut() = module;
        }

        *self.names.borrow_mut() = functions
            .iter()
            .map(|f| (f.offset, f.name.clone()))
            .collect();
        self.dirty.borrow_mut().clear();
        debug!("Loaded {} functions of {}", functions.len(), name);
        self.items.load(functions);
        Ok(())
    }

    /// Storage was detached: drop the live view and anything unflushed
    ///
    /// `Models::close` only detaches once every collection is clean.
    pub(crate) fn unload(&self) {
        self.names.borrow_mut().clear();
        let abandoned = std::mem::take(&mut *self.dirty.borrow_mut());
        if !abandoned.is_empty() {
            warn!(
                "Dropping {} unflushed functions of {}",
                abandoned.len(),
                self.module.borrow().name
            );
        }
        self.items.unload();
    }

    /// Take the freshly resolved `module` as this collection's module
    ///
    /// Reloads from storage when the id changed, which happens when the
    /// module was registered after the database was attached.
    pub(crate) fn rebind(&self, module: &Module) -> Result<(), ModelError> {
        let moved = self.module.borrow().id != module.id;
        *self.module.borrow_mut() = module.clone();
        if moved && self.store.is_attached() {
            self.load()?;
        }
        Ok(())
    }

    /// Snapshot of up to `FLUSH_BATCH_SIZE` dirty records
    fn next_batch(&self) -> Vec<Function> {
        let wanted: HashSet<u64> = self
            .dirty
            .borrow()
            .values()
            .take(FLUSH_BATCH_SIZE)
            .copied()
            .collect();
        self.items
            .items()
            .iter()
            .filter(|f| wanted.contains(&f.offset))
            .cloned()
            .collect()
    }

    fn schedule_flush(self: &Rc<Self>) {
        if self.dirty.borrow().is_empty() || self.flush_scheduled.replace(true) {
            return;
        }
        let work: Rc<dyn Work> = Rc::clone(self) as Rc<dyn Work>;
        self.scheduler.schedule(work);
    }
}

impl Work for FunctionCollection {
    fn label(&self) -> String {
        format!("flush of {}", self.module.borrow().name)
    }

    fn run(&self, quota: &Quota) -> Result<bool, ModelError> {
        let result = self.flush(&|| quota.exceeded());
        if !matches!(result, Ok(false)) {
            // Finished or failed: the unit leaves the queue, the next update
            // or `Functions::flush_all` picks up whatever is still dirty
            self.flush_scheduled.set(false);
        }
        result
    }
}

/// Index of all function collections, keyed by module name
///
/// **Public** - the entry point for per-module function views. Collections
/// outlive the database they were loaded from; attaching another one
/// reloads them in place.
pub struct Functions {
    store: Rc<StoreSlot>,
    scheduler: Rc<QuotaScheduler>,
    collections: RefCell<HashMap<String, Rc<FunctionCollection>>>,
}

impl Functions {
    pub fn new(store: Rc<StoreSlot>, scheduler: Rc<QuotaScheduler>) -> Self {
        Self {
            store,
            scheduler,
            collections: RefCell::new(HashMap::new()),
        }
    }

    /// Live view of the functions in `module`, hottest first
    pub fn all_in_module(
        &self,
        module: &Module,
    ) -> Result<Rc<ObservableCollection<Function>>, ModelError> {
        Ok(self.collection(module)?.observable())
    }

    /// The collection for `module`, created and loaded on first use
    pub fn collection(&self, module: &Module) -> Result<Rc<FunctionCollection>, ModelError> {
        let existing = self.collections.borrow().get(&module.name).cloned();
        if let Some(collection) = existing {
            collection.rebind(module)?;
            return Ok(collection);
        }

        let collection = Rc::new(FunctionCollection::new(
            module.clone(),
            Rc::clone(&self.store),
            Rc::clone(&self.scheduler),
        ));
        if self.store.is_attached() {
            collection.load()?;
        }
        self.collections
            .borrow_mut()
            .insert(module.name.clone(), Rc::clone(&collection));
        Ok(collection)
    }

    /// Total unflushed records across all modules
    pub fn dirty_len(&self) -> usize {
        self.collections
            .borrow()
            .values()
            .map(|c| c.dirty_len())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.collections.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.borrow().is_empty()
    }

    /// Flush every collection with pending records, queued or not
    ///
    /// Stops at the first failure; the failed collection and the ones not
    /// reached yet stay dirty.
    pub fn flush_all(&self, quota_exceeded: &dyn Fn() -> bool) -> Result<bool, ModelError> {
        let mut clean = true;
        for collection in self.snapshot() {
            if collection.dirty_len() > 0 {
                clean &= collection.flush(quota_exceeded)?;
            }
        }
        Ok(clean)
    }

    pub(crate) fn attach(&self) -> Result<(), ModelError> {
        for collection in self.snapshot() {
            collection.load()?;
        }
        Ok(())
    }

    /// Empty every view; the collections stay registered for the next attach
    pub(crate) fn detach(&self) {
        for collection in self.snapshot() {
            collection.unload();
        }
    }

    fn snapshot(&self) -> Vec<Rc<FunctionCollection>> {
        self.collections.borrow().values().cloned().collect()
    }
}
