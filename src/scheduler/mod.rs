//! Cooperative, time-quota-bounded scheduling of deferred work.
//!
//! This module provides:
//! - `Quota`: the per-tick wall-clock budget
//! - `Work`: a resumable unit that reports whether it finished
//! - `QuotaScheduler`: the FIFO queue and its periodic driver

pub mod driver;
pub mod quota;

// Re-export main types
pub use driver::QuotaScheduler;
pub use quota::{Quota, Work};
