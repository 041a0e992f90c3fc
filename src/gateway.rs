//! Command gateway
//!
//! The single entry point for issuing commands to a studio by name. Ordinary
//! commands borrow a pooled session and return the studio's response;
//! realtime commands are written straight to the notify socket and return
//! nothing.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::studio::{StudioLink, StudioRegistry};

/// One command or a batch sent together on the same session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    Single(String),
    Batch(Vec<String>),
}

impl Commands {
    /// The commands in send order
    pub fn as_slice(&self) -> &[String] {
        match self {
            Commands::Single(command) => std::slice::from_ref(command),
            Commands::Batch(commands) => commands,
        }
    }
}

impl From<&str> for Commands {
    fn from(command: &str) -> Self {
        Commands::Single(command.to_string())
    }
}

impl From<String> for Commands {
    fn from(command: String) -> Self {
        Commands::Single(command)
    }
}

impl From<Vec<String>> for Commands {
    fn from(commands: Vec<String>) -> Self {
        Commands::Batch(commands)
    }
}

impl From<Vec<&str>> for Commands {
    fn from(commands: Vec<&str>) -> Self {
        Commands::Batch(commands.into_iter().map(String::from).collect())
    }
}

/// How a command is dispatched and its response returned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Write to the notify socket without waiting for a response
    pub realtime: bool,

    /// Return the response as-is instead of HTML-escaped
    pub raw: bool,
}

impl ExecuteOptions {
    /// Fire-and-forget dispatch over the notify socket
    pub fn realtime() -> Self {
        Self {
            realtime: true,
            raw: false,
        }
    }

    /// Pooled dispatch returning the unescaped response
    pub fn raw() -> Self {
        Self {
            realtime: false,
            raw: true,
        }
    }
}

/// Dispatches commands to studios by name
#[derive(Debug, Clone)]
pub struct CommandGateway {
    registry: Arc<StudioRegistry>,
}

impl CommandGateway {
    /// Create a gateway over a registry
    pub fn new(registry: Arc<StudioRegistry>) -> Self {
        Self { registry }
    }

    /// Registry the gateway resolves studio names against
    pub fn registry(&self) -> &Arc<StudioRegistry> {
        &self.registry
    }

    /// Execute commands on a studio
    ///
    /// Returns `Ok(None)` for realtime dispatch, otherwise the response to
    /// the last command.
    pub async fn execute(
        &self,
        studio: &str,
        commands: impl Into<Commands>,
        options: ExecuteOptions,
    ) -> Result<Option<String>> {
        let commands = commands.into();
        let link = self.link(studio).await?;

        if options.realtime {
            link.notify().send_realtime(commands.as_slice()).await?;
            return Ok(None);
        }

        let pool = link.pool();
        let mut session = pool.acquire().await?;
        let result = session.send_commands(commands.as_slice()).await;
        pool.release(session).await;

        let response = result.map_err(|e| {
            tracing::debug!(studio = %studio, error = %e, "Command failed");
            e
        })?;

        if options.raw {
            Ok(Some(response))
        } else {
            Ok(Some(escape_html(&response)))
        }
    }

    /// Relaunch a studio's local process and rebuild its connections
    pub async fn launch(&self, studio: &str) -> Result<()> {
        self.registry.launch(studio).await
    }

    async fn link(&self, studio: &str) -> Result<Arc<StudioLink>> {
        self.registry
            .get(studio)
            .await
            .ok_or_else(|| Error::UnknownStudio(studio.to_string()))
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
