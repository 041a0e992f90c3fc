//! Statistics and metrics for studio links

pub mod metrics;

pub use metrics::{NotifyCounters, NotifyStats, PoolStats, StudioStats};
