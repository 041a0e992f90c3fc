//! Publishing decoded events to subscribers
//!
//! Notify channels hand every decoded event to an [`EventSink`]. The sink is
//! fire-and-forget: a topic with no subscribers simply drops the payload.
//! [`TopicHub`] is the in-process sink, fanning each topic out over a
//! `tokio::sync::broadcast` channel.
//!
//! ```text
//!   NotifyChannel ──► EventPublisher ──► dyn EventSink
//!                                           │
//!                                       TopicHub
//!                               ┌───────────┼───────────┐
//!                               ▼           ▼           ▼
//!                           "studio1"   "vu_studio1"  "studio2"
//!                           Receiver    Receiver      Receiver
//! ```

pub mod hub;
pub mod sink;

pub use hub::{HubConfig, PublishedEvent, TopicHub};
pub use sink::{EventPublisher, EventSink};
