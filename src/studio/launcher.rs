//! Local studio process launching

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;

use crate::error::{Error, Result};

use super::config::StudioConfig;

/// Starts a local studio server process
///
/// `launch` resolves once the studio is ready for connections. An error
/// means the registry must not create a pool or channel for the studio.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(&self, studio: &StudioConfig) -> Result<()>;
}

/// Runs the studio's launch command through `sh -c`
///
/// The process is left running. Launch succeeds as soon as the studio's
/// port accepts a TCP connection, and fails if the command exits with an
/// error first or the port stays closed past the launch timeout.
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    launch_timeout: Duration,
    poll_interval: Duration,
}

impl ShellLauncher {
    /// Create a launcher that waits up to `launch_timeout` for the port
    pub fn new(launch_timeout: Duration) -> Self {
        Self {
            launch_timeout,
            poll_interval: Duration::from_millis(250),
        }
    }

    /// Set how often the studio port is probed
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl ProcessLauncher for ShellLauncher {
    async fn launch(&self, studio: &StudioConfig) -> Result<()> {
        let command = studio
            .launch_command
            .as_deref()
            .ok_or_else(|| Error::NoLaunchCommand(studio.name.clone()))?;

        let failed = |reason: String| Error::Launch {
            studio: studio.name.clone(),
            reason,
        };

        tracing::info!(studio = %studio.name, command = %command, "Launching studio process");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| failed(format!("spawn failed: {}", e)))?;

        let addr = studio.address();
        let wait_ready = async {
            loop {
                if TcpStream::connect(&addr).await.is_ok() {
                    return Ok::<(), Error>(());
                }

                if let Some(status) = child.try_wait()? {
                    if !status.success() {
                        return Err(failed(format!("process exited with {}", status)));
                    }
                }

                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.launch_timeout, wait_ready).await {
            Ok(Ok(())) => {
                tracing::info!(studio = %studio.name, pid = ?child.id(), "Studio process ready");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(studio = %studio.name, error = %e, "Studio launch failed");
                Err(e)
            }
            Err(_) => {
                let _ = child.start_kill();
                tracing::warn!(
                    studio = %studio.name,
                    timeout_ms = self.launch_timeout.as_millis() as u64,
                    "Studio did not become ready"
                );
                Err(failed(format!(
                    "port {} not accepting after {:?}",
                    studio.port, self.launch_timeout
                )))
            }
        }
    }
}
