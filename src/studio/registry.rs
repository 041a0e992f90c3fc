//! Studio registry
//!
//! Owns one [`StudioLink`] (command pool plus notify channel) per configured
//! studio and reconciles that set against each new configuration. Calls to
//! `configure()` and `launch()` are serialized; lookups never wait on them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::notify::NotifyChannel;
use crate::pool::CommandPool;
use crate::publish::{EventPublisher, EventSink};
use crate::stats::StudioStats;

use super::config::{RegistryConfig, StudioConfig, StudiosConfig};
use super::launcher::{ProcessLauncher, ShellLauncher};

/// Lifecycle state of a configured studio
///
/// A studio with no entry is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudioState {
    /// Waiting on a local process launch
    Starting,
    /// Pool and channel are running
    Live,
    /// Being resized, recreated or torn down
    Reconfiguring,
}

/// The live connections for one studio
#[derive(Debug)]
pub struct StudioLink {
    config: StudioConfig,
    pool: CommandPool,
    notify: NotifyChannel,
    generation: u64,
    created_at: Instant,
}

impl StudioLink {
    /// Definition the link was built from
    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Command pool for ordinary request/response traffic
    pub fn pool(&self) -> &CommandPool {
        &self.pool
    }

    /// Push-mode channel carrying events and realtime writes
    pub fn notify(&self) -> &NotifyChannel {
        &self.notify
    }

    /// Changes every time the link's sockets are rebuilt
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drain the pool first so in-flight commands finish, then drop the
    /// notify socket
    async fn teardown(&self) {
        self.pool.drain().await;
        self.notify.shutdown().await;
        tracing::info!(studio = %self.config.name, generation = self.generation, "Studio link torn down");
    }
}

/// What a `configure()` call changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconfigureSummary {
    /// New studios now live
    pub added: Vec<String>,
    /// Studios torn down because they left the configuration
    pub removed: Vec<String>,
    /// Studios rebuilt because their host or port changed
    pub recreated: Vec<String>,
    /// Studios whose pool bounds changed in place
    pub resized: Vec<String>,
    /// Studios left exactly as they were
    pub unchanged: Vec<String>,
    /// New studios skipped because their local launch failed
    pub launch_failed: Vec<String>,
}

impl ReconfigureSummary {
    /// True when nothing was created, torn down or resized
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.recreated.is_empty()
            && self.resized.is_empty()
            && self.launch_failed.is_empty()
    }
}

/// Registry of configured studios and their links
pub struct StudioRegistry {
    config: RegistryConfig,
    launcher: Arc<dyn ProcessLauncher>,
    publisher: EventPublisher,
    configure_lock: Mutex<()>,
    desired: RwLock<StudiosConfig>,
    links: RwLock<HashMap<String, Arc<StudioLink>>>,
    states: RwLock<HashMap<String, StudioState>>,
    next_generation: AtomicU64,
}

impl StudioRegistry {
    /// Create a registry that launches local studios through `sh -c`
    pub fn new(config: RegistryConfig, sink: Arc<dyn EventSink>) -> Self {
        let launcher = Arc::new(ShellLauncher::new(config.launch_timeout));
        Self::with_launcher(config, sink, launcher)
    }

    /// Create a registry with a custom process launcher
    pub fn with_launcher(
        config: RegistryConfig,
        sink: Arc<dyn EventSink>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            config,
            launcher,
            publisher: EventPublisher::new(sink),
            configure_lock: Mutex::new(()),
            desired: RwLock::new(StudiosConfig::default()),
            links: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Pool and channel settings applied to every studio
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Reconcile the running links with the full desired configuration
    ///
    /// Idempotent: applying the same configuration twice leaves every link
    /// untouched. An invalid configuration is rejected before anything
    /// changes.
    ///
    /// A studio whose auto-start launch failed has no link, so it counts as
    /// new again on the next call and its launch is retried. Re-applying the
    /// configuration is how an operator retries a failed start.
    pub async fn configure(&self, desired: StudiosConfig) -> Result<ReconfigureSummary> {
        desired.validate()?;

        let _guard = self.configure_lock.lock().await;
        let current: HashMap<String, Arc<StudioLink>> = self.links.read().await.clone();
        let mut summary = ReconfigureSummary::default();

        for (name, link) in &current {
            if desired.get(name).is_none() {
                self.set_state(name, StudioState::Reconfiguring).await;
                self.links.write().await.remove(name);
                link.teardown().await;
                self.clear_state(name).await;

                tracing::info!(studio = %name, "Studio removed");
                summary.removed.push(name.clone());
            }
        }

        for (name, studio) in &desired.studios {
            match current.get(name) {
                Some(link) if link.config == *studio => {
                    summary.unchanged.push(name.clone());
                }
                Some(link) if link.config.same_target(studio) => {
                    self.set_state(name, StudioState::Reconfiguring).await;
                    link.pool.resize(studio.min_pool_size, studio.max_pool_size).await;

                    let resized = Arc::new(StudioLink {
                        config: studio.clone(),
                        pool: link.pool.clone(),
                        notify: link.notify.clone(),
                        generation: link.generation,
                        created_at: link.created_at,
                    });
                    self.links.write().await.insert(name.clone(), resized);
                    self.set_state(name, StudioState::Live).await;

                    summary.resized.push(name.clone());
                }
                Some(link) => {
                    self.set_state(name, StudioState::Reconfiguring).await;
                    self.links.write().await.remove(name);
                    link.teardown().await;

                    tracing::info!(
                        studio = %name,
                        from = %link.config.address(),
                        to = %studio.address(),
                        "Studio target changed, recreating link"
                    );
                    self.insert_link(studio).await;
                    summary.recreated.push(name.clone());
                }
                None => match self.start(studio).await {
                    Ok(()) => summary.added.push(name.clone()),
                    Err(_) => summary.launch_failed.push(name.clone()),
                },
            }
        }

        *self.desired.write().await = desired;

        tracing::info!(
            added = summary.added.len(),
            removed = summary.removed.len(),
            recreated = summary.recreated.len(),
            resized = summary.resized.len(),
            unchanged = summary.unchanged.len(),
            launch_failed = summary.launch_failed.len(),
            "Studios configured"
        );

        Ok(summary)
    }

    /// Relaunch a studio's local process and rebuild its link
    ///
    /// The existing link, if any, is torn down before the launch. On failure
    /// the studio is left absent until the next `configure()` or `launch()`.
    pub async fn launch(&self, name: &str) -> Result<()> {
        let _guard = self.configure_lock.lock().await;

        let studio = self
            .desired
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownStudio(name.to_string()))?;

        if studio.launch_command.is_none() {
            return Err(Error::NoLaunchCommand(name.to_string()));
        }

        let existing = self.links.write().await.remove(name);
        if let Some(link) = existing {
            self.set_state(name, StudioState::Reconfiguring).await;
            link.teardown().await;
        }

        self.set_state(name, StudioState::Starting).await;
        if let Err(e) = self.launcher.launch(&studio).await {
            self.clear_state(name).await;
            return Err(e);
        }

        self.insert_link(&studio).await;
        Ok(())
    }

    /// Live link for a studio
    pub async fn get(&self, name: &str) -> Option<Arc<StudioLink>> {
        self.links.read().await.get(name).cloned()
    }

    /// Lifecycle state of a studio; `None` when absent
    pub async fn state(&self, name: &str) -> Option<StudioState> {
        self.states.read().await.get(name).copied()
    }

    /// Names of studios with a live link, sorted
    pub async fn studios(&self) -> Vec<String> {
        let mut names: Vec<String> = self.links.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Statistics for one studio
    pub async fn stats(&self, name: &str) -> Option<StudioStats> {
        let link = self.get(name).await?;

        Some(StudioStats {
            name: name.to_string(),
            uptime: link.created_at.elapsed(),
            pool: link.pool.stats().await,
            notify: link.notify.stats(),
        })
    }

    /// Tear down every studio
    pub async fn shutdown(&self) {
        let _guard = self.configure_lock.lock().await;

        let links: Vec<(String, Arc<StudioLink>)> = self.links.write().await.drain().collect();
        for (name, link) in links {
            self.set_state(&name, StudioState::Reconfiguring).await;
            link.teardown().await;
            self.clear_state(&name).await;
        }

        *self.desired.write().await = StudiosConfig::default();
        tracing::info!("Studio registry shut down");
    }

    /// Bring up a new studio, launching its local process first if asked to
    async fn start(&self, studio: &StudioConfig) -> Result<()> {
        if studio.should_launch() {
            self.set_state(&studio.name, StudioState::Starting).await;

            if let Err(e) = self.launcher.launch(studio).await {
                tracing::warn!(studio = %studio.name, error = %e, "Studio launch failed, not connecting");
                self.clear_state(&studio.name).await;
                return Err(e);
            }
        }

        self.insert_link(studio).await;
        tracing::info!(studio = %studio.name, addr = %studio.address(), "Studio added");
        Ok(())
    }

    async fn insert_link(&self, studio: &StudioConfig) {
        let link = Arc::new(StudioLink {
            config: studio.clone(),
            pool: CommandPool::new(studio, self.config.pool.clone()),
            notify: NotifyChannel::spawn(studio, self.config.notify.clone(), self.publisher.clone()),
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            created_at: Instant::now(),
        });

        self.links.write().await.insert(studio.name.clone(), link);
        self.set_state(&studio.name, StudioState::Live).await;
    }

    async fn set_state(&self, name: &str, state: StudioState) {
        self.states.write().await.insert(name.to_string(), state);
    }

    async fn clear_state(&self, name: &str) {
        self.states.write().await.remove(name);
    }
}

impl std::fmt::Debug for StudioRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
