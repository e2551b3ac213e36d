//! Configuration for the task scheduler.

use std::time::Duration;

/// Default time between evaluations of the task list.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Default time [`TaskScheduler::stop`](crate::TaskScheduler::stop) waits
/// for an in-progress tick.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the task scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between evaluations of the task list.
    pub tick: Duration,

    /// Upper bound on how long `stop` waits for running tasks.
    pub stop_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick period.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Set the stop timeout.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}
