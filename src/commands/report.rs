//! Report command: rank what an existing database holds.

use super::replay::print_summary;
use crate::models::Models;
use crate::output::{build_report, write_report, HotspotReport};
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

/// Arguments for the report command
#[derive(Debug, Clone)]
pub struct ReportArgs {
    pub database: PathBuf,
    pub output_json: Option<PathBuf>,
    pub top_functions: usize,
    pub print_summary: bool,
}

/// Load the views from `args.database` and report on them
pub fn execute_report(args: ReportArgs) -> Result<HotspotReport> {
    if !args.database.exists() {
        anyhow::bail!("Database does not exist: {}", args.database.display());
    }

    let models = Models::default();
    models
        .open_path(&args.database)
        .with_context(|| format!("Failed to open database {}", args.database.display()))?;

    let report = build_report(&models, args.top_functions).context("Failed to build report")?;
    info!(
        "{} modules with calls, {} calls total",
        report.modules.len(),
        report.total_calls
    );

    if let Some(path) = &args.output_json {
        write_report(&report, path).context("Failed to write report JSON")?;
        info!("✓ Report written to: {}", path.display());
    }

    if args.print_summary {
        print_summary(&report);
    }

    models.close().context("Failed to close database")?;
    Ok(report)
}
