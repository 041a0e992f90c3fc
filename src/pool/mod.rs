//! Bounded command session pools
//!
//! Each studio owns one [`CommandPool`]. The pool lends validated
//! [`PooledSession`](crate::session::PooledSession)s to callers, bounds the
//! number of open connections, and keeps a minimum number warm.

pub mod command_pool;
pub mod config;

pub use command_pool::{CommandPool, Slot};
pub use config::PoolConfig;
