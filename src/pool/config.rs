//! Command pool configuration

use std::time::Duration;

/// Timing and limits for a [`CommandPool`](super::CommandPool)
///
/// Pool sizes come from each studio's own configuration; this struct holds
/// the knobs shared by every pool a registry creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum wait for `acquire()` before `AcquireTimeout`
    pub acquire_timeout: Duration,

    /// Maximum wait for a command's response sentinel
    pub response_timeout: Duration,

    /// Maximum wait for the blank-line liveness check on borrow
    pub validation_timeout: Duration,

    /// TCP connect timeout for new sessions
    pub connect_timeout: Duration,

    /// Minimum spacing between session creation attempts after a failure
    pub create_retry_delay: Duration,

    /// Idle sessions older than this are evicted (down to the minimum size)
    pub soft_idle_timeout: Duration,

    /// How often the maintenance task runs eviction and refill
    pub eviction_interval: Duration,

    /// How long `drain()` waits for borrowed sessions to come back
    pub drain_timeout: Duration,

    /// Maximum callers waiting in `acquire()` (0 = unlimited)
    pub max_waiting: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
            validation_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            create_retry_delay: Duration::from_secs(2),
            soft_idle_timeout: Duration::from_secs(30),
            eviction_interval: Duration::from_secs(1),
            drain_timeout: Duration::from_secs(10),
            max_waiting: 0, // Unlimited
        }
    }
}

impl PoolConfig {
    /// Set the acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the response timeout
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the validation timeout
    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the spacing between failed creation attempts
    pub fn create_retry_delay(mut self, delay: Duration) -> Self {
        self.create_retry_delay = delay;
        self
    }

    /// Set the soft idle timeout
    pub fn soft_idle_timeout(mut self, timeout: Duration) -> Self {
        self.soft_idle_timeout = timeout;
        self
    }

    /// Set the maintenance interval
    pub fn eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval = interval;
        self
    }

    /// Set the drain timeout
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Limit the number of waiting callers
    pub fn max_waiting(mut self, max: usize) -> Self {
        self.max_waiting = max;
        self
    }
}
