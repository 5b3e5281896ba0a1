//! Time quotas and the resumable work contract.

use crate::utils::error::ModelError;
use std::time::{Duration, Instant};

/// Wall-clock budget for one scheduler tick
///
/// The clock starts when the quota is created; `exceeded` turns true once
/// the elapsed time reaches the budget.
#[derive(Debug, Clone, Copy)]
pub struct Quota {
    started: Instant,
    budget: Option<Duration>,
}

impl Quota {
    /// Start a new quota of `budget` from now
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget: Some(budget),
        }
    }

    /// A quota that is never exceeded
    pub fn unlimited() -> Self {
        Self {
            started: Instant::now(),
            budget: None,
        }
    }

    /// A quota that is already exceeded
    ///
    /// Work still gets its first step: units poll the quota between steps.
    pub fn exhausted() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn exceeded(&self) -> bool {
        match self.budget {
            Some(budget) => self.started.elapsed() >= budget,
            None => false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// A unit of deferred work that can yield and be resumed
///
/// `run` is called with the current tick's quota. It should poll
/// `quota.exceeded()` at safe internal boundaries and return `Ok(false)`
/// when it stopped early; it is invoked again on the next tick.
/// `Ok(true)` means the unit is finished and can be dropped from the queue.
pub trait Work {
    /// Short description for logs
    fn label(&self) -> String;

    fn run(&self, quota: &Quota) -> Result<bool, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_quota_is_exceeded() {
        assert!(Quota::exhausted().exceeded());
    }

    #[test]
    fn test_unlimited_quota_never_exceeded() {
        let quota = Quota::unlimited();
        std::thread::sleep(Duration::from_millis(2));
        assert!(!quota.exceeded());
    }

    #[test]
    fn test_quota_expires_after_budget() {
        let quota = Quota::new(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(3));
        assert!(quota.exceeded());
    }

    #[test]
    fn test_generous_quota_not_exceeded() {
        let quota = Quota::new(Duration::from_secs(60));
        assert!(!quota.exceeded());
    }
}
