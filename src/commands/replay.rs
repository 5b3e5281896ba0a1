//! Replay command implementation.
//!
//! The replay command:
//! 1. Opens (or creates) the database
//! 2. Feeds every event of a JSON-lines log through the update pipeline,
//!    ticking the scheduler after each one
//! 3. Drives the scheduler until every count is written
//! 4. Builds and optionally writes a hotspot report
//! 5. Closes the database

use crate::models::Models;
use crate::output::{build_report, text_summary, write_report, HotspotReport};
use crate::parser::open_events;
use crate::utils::config::{SchedulerConfig, DEFAULT_TOP_FUNCTIONS};
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the replay command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct ReplayArgs {
    /// JSON-lines event log
    pub input: PathBuf,

    /// SQLite database to aggregate into
    pub database: PathBuf,

    /// Output path for the JSON report (optional)
    pub output_json: Option<PathBuf>,

    /// Functions listed per module in the report
    pub top_functions: usize,

    /// Print text summary to stdout
    pub print_summary: bool,

    pub scheduler: SchedulerConfig,
}

impl Default for ReplayArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from("events.jsonl"),
            database: PathBuf::from("hotcall.db"),
            output_json: None,
            top_functions: DEFAULT_TOP_FUNCTIONS,
            print_summary: false,
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Totals of one replay run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: usize,
    pub summaries: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

/// Execute the replay command
///
/// **Public** - main entry point called from main.rs
pub fn execute_replay(args: ReplayArgs) -> Result<(ReplayStats, HotspotReport)> {
    let start_time = Instant::now();

    info!("Replaying {} into {}", args.input.display(), args.database.display());

    let models = Models::new(args.scheduler);
    models
        .open_path(&args.database)
        .with_context(|| format!("Failed to open database {}", args.database.display()))?;

    let events = open_events(&args.input)
        .with_context(|| format!("Failed to open event log {}", args.input.display()))?;

    let mut stats = ReplayStats::default();
    for event in events {
        let event = event.context("Failed to parse event")?;
        stats.events += 1;

        if let Some(applied) = models.apply_event(&event).context("Failed to apply event")? {
            stats.summaries += 1;
            stats.resolved += applied.resolved;
            stats.unresolved += applied.unresolved;
        }

        if models.scheduler().is_active() {
            models.scheduler().tick().context("Failed to flush counts")?;
        }
    }

    debug!(
        "Draining {} pending flushes",
        models.scheduler().pending()
    );
    models
        .scheduler()
        .drive_until_idle()
        .context("Failed to flush counts")?;

    let report = build_report(&models, args.top_functions).context("Failed to build report")?;

    if let Some(path) = &args.output_json {
        write_report(&report, path).context("Failed to write report JSON")?;
        info!("✓ Report written to: {}", path.display());
    }

    if args.print_summary {
        print_summary(&report);
    }

    models.close().context("Failed to close database")?;

    info!(
        "Replayed {} events ({} summaries, {} unresolved samples) in {:.2}s",
        stats.events,
        stats.summaries,
        stats.unresolved,
        start_time.elapsed().as_secs_f64()
    );

    Ok((stats, report))
}

/// Validate replay arguments
///
/// **Public** - can be called before execute_replay for early validation
pub fn validate_args(args: &ReplayArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        anyhow::bail!("Input path cannot be empty");
    }

    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    if args.database.as_os_str().is_empty() {
        anyhow::bail!("Database path cannot be empty");
    }

    if args.top_functions == 0 {
        anyhow::bail!("top_functions must be greater than 0");
    }

    if args.scheduler.quota > args.scheduler.interval {
        anyhow::bail!("Tick quota cannot exceed the tick interval");
    }

    Ok(())
}

pub(crate) fn print_summary(report: &HotspotReport) {
    println!("\n{}", "=".repeat(80));
    println!("HOTSPOT SUMMARY");
    println!("{}", "=".repeat(80));
    print!("{}", text_summary(report));
    println!("{}", "=".repeat(80));
}
