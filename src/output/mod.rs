//! Output writers for hotspot reports.
//!
//! This module handles:
//! - Building a report from the live views
//! - JSON reports (pretty printed)
//! - Text summaries

pub mod json;
pub mod report;

// Re-export main functions
pub use json::{read_report, write_report};
pub use report::{build_report, text_summary, FunctionReport, HotspotReport, ModuleReport};
