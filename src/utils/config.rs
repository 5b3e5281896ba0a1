//! Configuration and constants for the aggregation core.

use std::time::Duration;

/// Period of the scheduler driver
pub const TICK_INTERVAL: Duration = Duration::from_millis(15);

/// Time a tick may spend on deferred work before yielding.
/// Leaves headroom inside the tick period for other periodic work.
pub const TICK_QUOTA: Duration = Duration::from_millis(10);

/// Maximum dirty functions written per storage transaction
pub const FLUSH_BATCH_SIZE: usize = 10;

/// Name prefix for functions that live in the main binary
pub const MAIN_MODULE_PREFIX: &str = "sub";

/// Conventional shared library prefix stripped from module names
pub const LIBRARY_PREFIX: &str = "lib";

/// Current hotspot report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Default number of functions listed per module in reports
pub const DEFAULT_TOP_FUNCTIONS: usize = 10;

/// Timing parameters for the quota scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How often the driver ticks while work is pending
    pub interval: Duration,

    /// Budget per tick, measured from tick start
    pub quota: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: TICK_INTERVAL,
            quota: TICK_QUOTA,
        }
    }
}
