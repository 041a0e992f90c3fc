//! Command sessions
//!
//! A [`PooledSession`] is one persistent command connection to a studio.
//! Sessions are created and destroyed by [`crate::pool::CommandPool`]; the
//! state machine in [`state`] decides whether a session may be reused.

pub mod pooled;
pub mod state;

pub use pooled::PooledSession;
pub use state::SessionState;
