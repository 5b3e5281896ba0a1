//! Aggregated call counts: module registry, function collections and the
//! update pipeline that feeds them.
//!
//! `Models` wires the pieces together around one scheduler and one shared
//! storage slot, and handles attaching and detaching the database.

pub mod functions;
pub mod modules;
pub mod naming;
pub mod pipeline;
pub mod records;

// Re-export main types
pub use functions::{FunctionCollection, Functions};
pub use modules::{ModuleCache, ModuleRegistry};
pub use naming::{function_name, function_prefix};
pub use pipeline::{ApplyReport, UpdatePipeline};
pub use records::{Function, Module};

use crate::parser::{ModuleObservation, TraceEvent, TraceSummary};
use crate::scheduler::QuotaScheduler;
use crate::store::{Database, StoreSlot};
use crate::utils::config::SchedulerConfig;
use crate::utils::error::ModelError;
use log::info;
use std::path::Path;
use std::rc::Rc;

/// The whole aggregation core
///
/// **Public** - main entry point for embedding code
pub struct Models {
    scheduler: Rc<QuotaScheduler>,
    store: Rc<StoreSlot>,
    modules: Rc<ModuleRegistry>,
    functions: Rc<Functions>,
    pipeline: UpdatePipeline,
}

impl Models {
    pub fn new(config: SchedulerConfig) -> Self {
        let scheduler = Rc::new(QuotaScheduler::new(config));
        let store = Rc::new(StoreSlot::new());
        let modules = Rc::new(ModuleRegistry::new(Rc::clone(&store)));
        let functions = Rc::new(Functions::new(Rc::clone(&store), Rc::clone(&scheduler)));
        let pipeline = UpdatePipeline::new(
            Rc::clone(&store),
            Rc::clone(&modules),
            Rc::clone(&functions),
        );
        Self {
            scheduler,
            store,
            modules,
            functions,
            pipeline,
        }
    }

    /// Attach a database and load every live view from it
    ///
    /// An already attached database is closed first.
    pub fn open(&self, database: Database) -> Result<(), ModelError> {
        if self.is_open() {
            self.close()?;
        }
        match database.path() {
            Some(path) => info!("Attaching database {}", path.display()),
            None => info!("Attaching in-memory database"),
        }
        self.store.attach(Rc::new(database));
        self.modules.attach()?;
        self.functions.attach()
    }

    /// Open a database file and attach it
    pub fn open_path(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let database = Database::open(path)?;
        self.open(database)
    }

    /// Write everything pending, then detach the database
    ///
    /// Queued flushes complete against the current database, then every
    /// collection that is still dirty (say, after an earlier failed flush)
    /// is flushed directly. If any of that fails the database stays
    /// attached, nothing is discarded and the error is returned.
    ///
    /// Live views are emptied but stay valid: the next `open` reloads them.
    pub fn close(&self) -> Result<(), ModelError> {
        if !self.is_open() {
            return Ok(());
        }
        self.scheduler.drain()?;
        self.functions.flush_all(&|| false)?;
        self.functions.detach();
        self.modules.detach();
        self.store.detach();
        info!("Database detached");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.store.is_attached()
    }

    pub fn scheduler(&self) -> &Rc<QuotaScheduler> {
        &self.scheduler
    }

    pub fn modules(&self) -> &Rc<ModuleRegistry> {
        &self.modules
    }

    pub fn functions(&self) -> &Rc<Functions> {
        &self.functions
    }

    /// Shared storage slot; `Err(Detached)` from `get` when closed
    pub fn store(&self) -> &Rc<StoreSlot> {
        &self.store
    }

    /// Record the current module list of the traced process
    pub fn update_modules(&self, batch: &[ModuleObservation]) -> Result<(), ModelError> {
        self.modules.upsert(batch)
    }

    /// Fold one trace summary into the live views
    pub fn apply(&self, summary: &TraceSummary) -> Result<ApplyReport, ModelError> {
        self.pipeline.apply(summary)
    }

    /// Dispatch one event from an event log
    pub fn apply_event(&self, event: &TraceEvent) -> Result<Option<ApplyReport>, ModelError> {
        match event {
            TraceEvent::Modules { modules } => {
                self.update_modules(modules)?;
                Ok(None)
            }
            TraceEvent::Summary { summary } => self.apply(summary).map(Some),
        }
    }

    /// Look up a module by name in the attached database
    pub fn module(&self, name: &str) -> Result<Module, ModelError> {
        let database = self.store.get()?;
        database.transaction(|tx| self.modules.resolve(name, tx))
    }
}

impl Default for Models {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
