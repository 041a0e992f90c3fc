//! Error types
//!
//! Faults that can be recovered inside the link (replacing a session,
//! reconnecting a notify channel) never reach callers. The variants here are
//! the ones that do, plus the internal ones that drive that recovery.

use std::time::Duration;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for studio link operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// TCP connect to a studio failed
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The response sentinel never arrived
    #[error("no response within {0:?}")]
    ResponseTimeout(Duration),

    /// An idle session failed its liveness check
    #[error("session failed validation")]
    ValidationFailure,

    /// A reserved push-mode word was sent on a command session
    #[error("command `{0}` is reserved for the notify channel")]
    ProtocolMisuse(String),

    /// No studio with this name is configured
    #[error("unknown studio: {0}")]
    UnknownStudio(String),

    /// The notify channel has no live socket
    #[error("notify channel for {0} is down")]
    NotifyChannelDown(String),

    /// Too many callers are already waiting on the pool
    #[error("pool exhausted: {waiting} callers already waiting")]
    PoolExhausted { waiting: usize },

    /// No session became available in time
    #[error("no session available within {0:?}")]
    AcquireTimeout(Duration),

    /// The pool has been drained and accepts no more borrowers
    #[error("pool is closed")]
    PoolClosed,

    /// The session already has a command in flight
    #[error("session {0} is already awaiting a response")]
    SessionBusy(u64),

    /// The session has been marked invalid and must be destroyed
    #[error("session {0} is invalid")]
    SessionInvalid(u64),

    /// The remote side closed the connection
    #[error("connection closed by studio")]
    ConnectionClosed,

    /// Socket I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Launching a local studio process failed
    #[error("launch of {studio} failed: {reason}")]
    Launch { studio: String, reason: String },

    /// The studio has no launch command configured
    #[error("studio {0} has no launch command")]
    NoLaunchCommand(String),

    /// Studio configuration was rejected
    #[error("invalid configuration for {studio}: {reason}")]
    InvalidConfig { studio: String, reason: String },

    /// Configuration document could not be parsed
    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors produced while decoding a framed notify packet
///
/// These stay inside the notify channel, which counts and drops the packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Packet type byte is not one we understand
    #[error("unknown packet type 0x{0:02x}")]
    UnknownType(u8),

    /// Payload is shorter than the layout for its type requires
    #[error("packet type 0x{kind:02x} needs {needed} bytes, got {actual}")]
    Truncated {
        kind: u8,
        needed: usize,
        actual: usize,
    },
}
