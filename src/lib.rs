//! Hotcall
//!
//! Live ranking of the hottest functions and modules of a traced process,
//! built from periodic call-count samples, with persistence that never
//! blocks the producer or the observers of the live views.
//!
//! ## Getting Started
//!
//! ```ignore
//! use hotcall::models::Models;
//! use hotcall::parser::TraceSummary;
//! use hotcall::store::Database;
//!
//! let models = Models::default();
//! models.open(Database::open("hot.db")?)?;
//! models.apply(&TraceSummary::new().with_symbol("0x1000", "libfoo.so", 0x20, 5))?;
//! models.scheduler().drive_until_idle()?;
//! ```

pub mod commands;
pub mod models;
pub mod observable;
pub mod output;
pub mod parser;
pub mod scheduler;
pub mod store;
pub mod utils;
