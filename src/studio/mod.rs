//! Studio configuration and lifecycle
//!
//! [`StudioRegistry`] turns a [`StudiosConfig`] into running links: one
//! command pool and one notify channel per studio, optionally preceded by a
//! local process launch through a [`ProcessLauncher`].
//!
//! ```text
//!   Absent ──► Starting ──► Live ◄──► Reconfiguring
//!     ▲           │                        │
//!     └───────────┴── launch failed ───────┴── removed
//! ```

pub mod config;
pub mod launcher;
pub mod registry;

pub use config::{RegistryConfig, StudioConfig, StudiosConfig};
pub use launcher::{ProcessLauncher, ShellLauncher};
pub use registry::{ReconfigureSummary, StudioLink, StudioRegistry, StudioState};
