//! Control link between a broadcast console and remote radio-automation
//! studios
//!
//! Each configured studio gets two kinds of TCP connection:
//!
//! - a bounded pool of command sessions speaking a line-oriented
//!   request/response protocol whose responses end at the `\nars>` sentinel
//! - one notify channel switched into push mode, streaming binary event
//!   packets that are framed, decoded and published by topic
//!
//! ```text
//!              configure(StudiosConfig)
//!                        │
//!                        ▼
//!                 StudioRegistry ──────────────┐
//!                  │           │               │
//!                  ▼           ▼               ▼
//!            CommandPool   NotifyChannel   ProcessLauncher
//!                  │           │
//!        PooledSession   PacketFramer ─► EventDecoder ─► EventPublisher ─► EventSink
//!                  ▲           ▲
//!                  └─ CommandGateway::execute(studio, commands, options)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use studio_link::{
//!     CommandGateway, ExecuteOptions, RegistryConfig, StudioRegistry, StudiosConfig, TopicHub,
//! };
//!
//! #[tokio::main]
//! async fn main() -> studio_link::Result<()> {
//!     let hub = Arc::new(TopicHub::new());
//!     let registry = Arc::new(StudioRegistry::new(RegistryConfig::default(), hub.clone()));
//!
//!     let config = StudiosConfig::from_json(
//!         r#"{"studios": {"studio1": {"host": "10.0.0.5", "port": 9000}}}"#,
//!     )?;
//!     registry.configure(config).await?;
//!
//!     let mut events = hub.subscribe("studio1").await;
//!     let gateway = CommandGateway::new(registry.clone());
//!     let status = gateway.execute("studio1", "stat", ExecuteOptions::default()).await?;
//!     println!("{:?}", status);
//!
//!     if let Ok(event) = events.recv().await {
//!         println!("{}: {}", event.topic, event.payload);
//!     }
//!
//!     registry.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod gateway;
pub mod notify;
pub mod pool;
pub mod protocol;
pub mod publish;
pub mod session;
pub mod stats;
pub mod studio;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{DecodeError, Error, Result};
pub use gateway::{CommandGateway, Commands, ExecuteOptions};
pub use notify::{NotifyChannel, NotifyConfig};
pub use pool::{CommandPool, PoolConfig};
pub use protocol::{DecodedEvent, EventDecoder, EventKind, EventValue, PacketFramer};
pub use publish::{EventPublisher, EventSink, HubConfig, PublishedEvent, TopicHub};
pub use session::{PooledSession, SessionState};
pub use stats::{NotifyStats, PoolStats, StudioStats};
pub use studio::{
    ProcessLauncher, ReconfigureSummary, RegistryConfig, ShellLauncher, StudioConfig,
    StudioRegistry, StudioState, StudiosConfig,
};
