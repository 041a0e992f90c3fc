//! Per-studio notify channel
//!
//! A [`NotifyChannel`] owns one long-lived socket that has been switched
//! into event-push and meter-push mode. Raw bytes run through a
//! [`PacketFramer`](crate::protocol::PacketFramer) and an
//! [`EventDecoder`](crate::protocol::EventDecoder) before being published.
//! The same socket also carries fire-and-forget realtime commands.

pub mod channel;
pub mod config;

pub use channel::NotifyChannel;
pub use config::NotifyConfig;
