//! Session state machine
//!
//! Tracks a pooled command session from connect to destruction.
//!
//! ```text
//! Idle ◄──► AwaitingResponse
//!  │              │
//!  └──► Invalid ◄─┘
//! ```
//!
//! A session only exists once its socket is connected; while the connect is
//! in flight the pool holds a capacity slot with no session behind it.
//! `Invalid` is terminal: the pool destroys the session instead of reusing it.

/// Pooled session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no command in flight
    Idle,
    /// A command was written and its sentinel has not arrived yet
    AwaitingResponse,
    /// Failed validation, timed out, or hit a socket error
    Invalid,
}

impl SessionState {
    /// Whether a new command may be issued
    pub fn can_send(&self) -> bool {
        *self == SessionState::Idle
    }

    /// Whether the session can return to the idle set
    pub fn is_reusable(&self) -> bool {
        *self == SessionState::Idle
    }

    /// Move into `AwaitingResponse`
    ///
    /// Returns false if the session was not idle.
    pub fn begin_exchange(&mut self) -> bool {
        if *self == SessionState::Idle {
            *self = SessionState::AwaitingResponse;
            true
        } else {
            false
        }
    }

    /// Response arrived
    pub fn complete_exchange(&mut self) {
        if *self == SessionState::AwaitingResponse {
            *self = SessionState::Idle;
        }
    }

    /// Mark the session for destruction
    pub fn invalidate(&mut self) {
        *self = SessionState::Invalid;
    }
}
