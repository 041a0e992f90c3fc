//! Notify channel configuration

use std::time::Duration;

/// Notify channel timing and buffering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Fixed delay between a lost connection and the next attempt
    pub reconnect_delay: Duration,

    /// Connect attempt timeout
    pub connect_timeout: Duration,

    /// Longest a realtime write may wait on a full socket before the
    /// connection is dropped
    pub write_timeout: Duration,

    /// Socket read buffer size
    pub read_buffer_size: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(1),
            read_buffer_size: 8 * 1024,
        }
    }
}

impl NotifyConfig {
    /// Set the reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the realtime write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(64);
        self
    }
}
