//! Hotcall CLI
//!
//! Replays call-count sample logs into a database and reports the
//! hottest modules and functions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;
use std::time::Duration;

use hotcall::commands::{execute_replay, execute_report, validate_args, ReplayArgs, ReportArgs};
use hotcall::store::SCHEMA_SQL;
use hotcall::utils::config::{SchedulerConfig, DEFAULT_TOP_FUNCTIONS, SCHEMA_VERSION};

/// Hotcall - hottest functions and modules from call-count samples
#[derive(Parser, Debug)]
#[command(name = "hotcall")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Feed a JSON-lines event log into a database
    Replay {
        /// Event log (one JSON event per line)
        #[arg(short, long)]
        input: PathBuf,

        /// SQLite database to aggregate into
        #[arg(short, long, env = "HOTCALL_DATABASE", default_value = "hotcall.db")]
        database: PathBuf,

        /// Output path for the JSON report (optional)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Functions listed per module
        #[arg(long, default_value_t = DEFAULT_TOP_FUNCTIONS)]
        top: usize,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,

        /// Scheduler tick interval in milliseconds
        #[arg(long, default_value = "15")]
        tick_ms: u64,

        /// Time budget per tick in milliseconds
        #[arg(long, default_value = "10")]
        quota_ms: u64,
    },

    /// Report the hottest modules and functions of a database
    Report {
        /// SQLite database to read
        #[arg(short, long, env = "HOTCALL_DATABASE", default_value = "hotcall.db")]
        database: PathBuf,

        /// Output path for the JSON report (optional)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Functions listed per module
        #[arg(long, default_value_t = DEFAULT_TOP_FUNCTIONS)]
        top: usize,
    },

    /// Display the database schema
    Schema,

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Replay {
            input,
            database,
            output,
            top,
            summary,
            tick_ms,
            quota_ms,
        } => {
            let args = ReplayArgs {
                input,
                database,
                output_json: output,
                top_functions: top,
                print_summary: summary,
                scheduler: SchedulerConfig {
                    interval: Duration::from_millis(tick_ms),
                    quota: Duration::from_millis(quota_ms),
                },
            };

            // Validate args first
            validate_args(&args)?;

            execute_replay(args)?;
        }

        Commands::Report {
            database,
            output,
            top,
        } => {
            execute_report(ReportArgs {
                database,
                output_json: output,
                top_functions: top,
                print_summary: true,
            })?;
        }

        Commands::Schema => {
            println!("Hotcall Database Schema");
            println!("{}", SCHEMA_SQL.trim());
        }

        Commands::Version => {
            println!("Hotcall v{}", env!("CARGO_PKG_VERSION"));
            println!("Report Schema: v{}", SCHEMA_VERSION);
        }
    }

    Ok(())
}
