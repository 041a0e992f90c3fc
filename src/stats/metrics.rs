//! Statistics for pools, notify channels and studios

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Snapshot of a command pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Sessions currently open (idle + borrowed)
    pub size: usize,
    /// Sessions sitting in the idle set
    pub idle: usize,
    /// Sessions handed out to callers
    pub borrowed: usize,
    /// Callers blocked in `acquire()`
    pub waiting: usize,
    /// Configured minimum size
    pub min: usize,
    /// Configured maximum size
    pub max: usize,
    /// Sessions ever created
    pub created: u64,
    /// Sessions ever destroyed
    pub destroyed: u64,
    /// Connect attempts that failed
    pub connect_failures: u64,
}

/// Snapshot of a notify channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyStats {
    /// Whether the socket is currently connected
    pub connected: bool,
    /// Total bytes read from the socket
    pub bytes_received: u64,
    /// Packets decoded and published
    pub packets_decoded: u64,
    /// Packets dropped (unknown type, truncated payload)
    pub packets_dropped: u64,
    /// Successful connections after the first
    pub reconnects: u64,
    /// Realtime writes discarded while disconnected or stalled
    pub writes_dropped: u64,
}

/// Live counters updated by a notify channel task
#[derive(Debug, Default)]
pub struct NotifyCounters {
    connected: AtomicBool,
    connections: AtomicU64,
    bytes_received: AtomicU64,
    packets_decoded: AtomicU64,
    packets_dropped: AtomicU64,
    writes_dropped: AtomicU64,
}

impl NotifyCounters {
    /// Create zeroed counters for a disconnected channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connect or disconnect; every connect counts toward reconnects
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
        if connected {
            self.connections.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Whether the last recorded transition was a connect
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Count bytes read from the socket
    pub fn add_bytes(&self, n: usize) {
        self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Count a packet that was decoded and published
    pub fn packet_decoded(&self) {
        self.packets_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a packet that failed to decode
    pub fn packet_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a realtime write that never reached the socket
    pub fn write_dropped(&self) {
        self.writes_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot
    pub fn snapshot(&self) -> NotifyStats {
        NotifyStats {
            connected: self.connected.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            reconnects: self.connections.load(Ordering::Relaxed).saturating_sub(1),
            writes_dropped: self.writes_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Combined statistics for one studio
#[derive(Debug, Clone)]
pub struct StudioStats {
    /// Studio name
    pub name: String,
    /// Time since the studio's link was created
    pub uptime: Duration,
    /// Command pool snapshot
    pub pool: PoolStats,
    /// Notify channel snapshot
    pub notify: NotifyStats,
}
