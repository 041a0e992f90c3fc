//! Studio configuration
//!
//! Studio definitions arrive wholesale from an external configuration store
//! as `{"studios": {"<name>": {...}}}`. They are compared by value to decide
//! what changed between two `configure()` calls.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::notify::NotifyConfig;
use crate::pool::PoolConfig;

fn default_min_pool_size() -> usize {
    1
}

fn default_max_pool_size() -> usize {
    5
}

/// One remote automation-server instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioConfig {
    /// Unique studio name (filled from the map key when loading)
    #[serde(default)]
    pub name: String,

    /// Host running the automation server
    pub host: String,

    /// Command/notify port
    pub port: u16,

    /// Sessions kept open even when idle
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: usize,

    /// Upper bound on open command sessions
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,

    /// Shell command that starts a local server process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_command: Option<String>,

    /// Launch the local process automatically when the studio appears
    #[serde(default)]
    pub auto_start: bool,
}

impl StudioConfig {
    /// Create a studio definition with default pool sizes
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            min_pool_size: default_min_pool_size(),
            max_pool_size: default_max_pool_size(),
            launch_command: None,
            auto_start: false,
        }
    }

    /// Set minimum and maximum pool size
    pub fn pool_size(mut self, min: usize, max: usize) -> Self {
        self.min_pool_size = min;
        self.max_pool_size = max;
        self
    }

    /// Set the local launch command
    pub fn launch_command(mut self, command: impl Into<String>) -> Self {
        self.launch_command = Some(command.into());
        self
    }

    /// Enable or disable automatic launch
    pub fn auto_start(mut self, enabled: bool) -> Self {
        self.auto_start = enabled;
        self
    }

    /// `host:port` of the studio
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether both definitions point at the same server
    pub fn same_target(&self, other: &StudioConfig) -> bool {
        self.host == other.host && self.port == other.port
    }

    /// Whether a local process must be launched before connecting
    pub fn should_launch(&self) -> bool {
        self.auto_start && self.launch_command.is_some()
    }

    /// Reject definitions that cannot produce a working link
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidConfig {
            studio: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.host.is_empty() {
            return Err(invalid("host is empty"));
        }
        if self.port == 0 {
            return Err(invalid("port is 0"));
        }
        if self.max_pool_size == 0 {
            return Err(invalid("maxPoolSize must be at least 1"));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(invalid("minPoolSize exceeds maxPoolSize"));
        }
        Ok(())
    }
}

/// The full set of studios supplied by the configuration store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudiosConfig {
    #[serde(default)]
    pub studios: BTreeMap<String, StudioConfig>,
}

impl StudiosConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a studio, keyed by its name
    pub fn with_studio(mut self, studio: StudioConfig) -> Self {
        self.studios.insert(studio.name.clone(), studio);
        self
    }

    /// Parse the configuration store's JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: StudiosConfig = serde_json::from_str(json)?;
        for (name, studio) in config.studios.iter_mut() {
            studio.name = name.clone();
        }
        Ok(config)
    }

    /// Validate every studio
    pub fn validate(&self) -> Result<()> {
        for (name, studio) in &self.studios {
            if name != &studio.name {
                return Err(Error::InvalidConfig {
                    studio: name.clone(),
                    reason: format!("key does not match name `{}`", studio.name),
                });
            }
            studio.validate()?;
        }
        Ok(())
    }

    /// Look up a studio by name
    pub fn get(&self, name: &str) -> Option<&StudioConfig> {
        self.studios.get(name)
    }

    /// Number of configured studios
    pub fn len(&self) -> usize {
        self.studios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.studios.is_empty()
    }
}

/// Settings shared by every link a registry creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Command pool timing
    pub pool: PoolConfig,

    /// Notify channel timing
    pub notify: NotifyConfig,

    /// How long a launched studio has to start accepting connections
    pub launch_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            notify: NotifyConfig::default(),
            launch_timeout: Duration::from_secs(15),
        }
    }
}

impl RegistryConfig {
    /// Set the pool configuration
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set the notify channel configuration
    pub fn notify(mut self, notify: NotifyConfig) -> Self {
        self.notify = notify;
        self
    }

    /// Set the launch timeout
    pub fn launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }
}
