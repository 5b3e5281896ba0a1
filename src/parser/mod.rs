//! Input parsing for instrumentation events.
//!
//! This module handles:
//! - Trace summaries (address -> count, optional symbol)
//! - Module list observations
//! - Newline-delimited JSON event logs

pub mod events;
pub mod schema;

// Re-export main types
pub use events::{open_events, parse_event, read_events};
pub use schema::{parse_address, ModuleObservation, Sample, Symbol, TraceEvent, TraceSummary};
