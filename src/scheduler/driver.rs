//! FIFO queue of deferred work, drained in quota-bounded ticks.
//!
//! The scheduler is cooperative: a tick runs the head unit until it reports
//! finished, then the next one, and stops as soon as a unit yields.
//! The periodic driver is only active while the queue is non-empty.

use super::quota::{Quota, Work};
use crate::utils::config::SchedulerConfig;
use crate::utils::error::ModelError;
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Single-threaded deferred work scheduler
///
/// **Public** - shared by the module registry and every function collection
pub struct QuotaScheduler {
    config: SchedulerConfig,
    pending: RefCell<VecDeque<Rc<dyn Work>>>,
    active: Cell<bool>,
}

impl QuotaScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            pending: RefCell::new(VecDeque::new()),
            active: Cell::new(false),
        }
    }

    /// Enqueue a unit and make sure the driver is running
    pub fn schedule(&self, work: Rc<dyn Work>) {
        debug!("Scheduling {}", work.label());
        self.pending.borrow_mut().push_back(work);
        if !self.active.replace(true) {
            debug!("Scheduler driver started");
        }
    }

    /// Run one tick
    ///
    /// Units are resumed strictly in FIFO order. A unit that fails is
    /// dropped from the queue and its error returned; nothing is retried.
    pub fn tick(&self) -> Result<(), ModelError> {
        self.run_pending(Quota::new(self.config.quota))
    }

    /// Run every pending unit to completion, ignoring the quota
    pub fn drain(&self) -> Result<(), ModelError> {
        while self.pending() > 0 {
            self.run_pending(Quota::unlimited())?;
        }
        Ok(())
    }

    /// Tick at the configured interval until the queue is empty
    pub fn drive_until_idle(&self) -> Result<(), ModelError> {
        while self.is_active() {
            let started = Instant::now();
            self.tick()?;
            if self.is_active() {
                let spent = started.elapsed();
                std::thread::sleep(self.config.interval.saturating_sub(spent));
            }
        }
        Ok(())
    }

    /// Whether the periodic driver should be ticking
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Number of queued units, including a partially finished head
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    fn run_pending(&self, quota: Quota) -> Result<(), ModelError> {
        loop {
            // Clone the head so the queue is not borrowed while the unit runs;
            // a unit may schedule more work.
            let head = match self.pending.borrow().front() {
                Some(work) => Rc::clone(work),
                None => break,
            };

            match head.run(&quota) {
                Ok(true) => {
                    self.pending.borrow_mut().pop_front();
                }
                Ok(false) => {
                    debug!(
                        "{} yielded after {:?}, resuming next tick",
                        head.label(),
                        quota.elapsed()
                    );
                    break;
                }
                Err(error) => {
                    warn!("{} failed: {}", head.label(), error);
                    self.pending.borrow_mut().pop_front();
                    self.stop_if_idle();
                    return Err(error);
                }
            }
        }

        self.stop_if_idle();
        Ok(())
    }

    fn stop_if_idle(&self) {
        if self.pending.borrow().is_empty() && self.active.replace(false) {
            debug!("Scheduler driver stopped");
        }
    }
}

impl Default for QuotaScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
