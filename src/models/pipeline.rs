//! Update pipeline: from a raw trace summary to per-module updates.

use super::functions::Functions;
use super::modules::ModuleRegistry;
use super::records::Module;
use crate::parser::TraceSummary;
use crate::store::StoreSlot;
use crate::utils::error::ModelError;
use log::debug;
use std::collections::BTreeMap;
use std::rc::Rc;

/// What one `apply` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Samples attributed to a module and function
    pub resolved: usize,

    /// Samples without a symbol; these are dropped
    pub unresolved: usize,

    /// Modules that received at least one sample
    pub modules: usize,

    /// Sum of resolved sample counts
    pub calls: u64,
}

/// Samples of one module gathered from a summary
struct ModuleBatch {
    module: Module,
    updates: Vec<(u64, u64)>,
    calls: u64,
}

/// Entry point for incoming trace summaries
pub struct UpdatePipeline {
    store: Rc<StoreSlot>,
    modules: Rc<ModuleRegistry>,
    functions: Rc<Functions>,
}

impl UpdatePipeline {
    pub fn new(store: Rc<StoreSlot>, modules: Rc<ModuleRegistry>, functions: Rc<Functions>) -> Self {
        Self {
            store,
            modules,
            functions,
        }
    }

    /// Fold one summary into the function collections and module totals
    ///
    /// Modules are resolved (registered if unseen) in one transaction.
    /// Then every module's batch goes to its function collection, and
    /// finally the per-module totals are added to the registry, so both
    /// levels are derived from the same samples.
    pub fn apply(&self, summary: &TraceSummary) -> Result<ApplyReport, ModelError> {
        let database = self.store.get()?;
        let mut report = ApplyReport::default();

        let batches = database.transaction(|tx| {
            let mut batches: BTreeMap<i64, ModuleBatch> = BTreeMap::new();
            for (address, sample) in &summary.samples {
                let Some(symbol) = &sample.symbol else {
                    debug!("Dropping unresolved sample at {} ({} calls)", address, sample.count);
                    report.unresolved += 1;
                    continue;
                };

                let module = self.modules.resolve_or_register(&symbol.module, tx)?;
                let batch = batches.entry(module.id).or_insert_with(|| ModuleBatch {
                    module,
                    updates: Vec::new(),
                    calls: 0,
                });
                batch.updates.push((symbol.offset, sample.count));
                batch.calls += sample.count;
                report.resolved += 1;
            }
            Ok::<_, ModelError>(batches)
        })?;

        if batches.is_empty() {
            return Ok(report);
        }

        for batch in batches.values() {
            self.functions.collection(&batch.module)?.update(&batch.updates);
        }

        let deltas: BTreeMap<i64, u64> = batches
            .iter()
            .map(|(&id, batch)| (id, batch.calls))
            .collect();
        self.modules.increment_calls(&deltas)?;

        report.modules = batches.len();
        report.calls = deltas.values().sum();
        debug!(
            "Applied {} samples to {} modules ({} calls, {} unresolved)",
            report.resolved, report.modules, report.calls, report.unresolved
        );
        Ok(report)
    }
}
