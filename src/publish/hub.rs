//! In-process topic hub
//!
//! Each topic owns a `broadcast` sender, created on first subscribe. Topics
//! whose subscribers have all gone away are removed by [`TopicHub::cleanup`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use super::sink::EventSink;

/// Hub settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Per-topic broadcast buffer; slow receivers lag past this
    pub channel_capacity: usize,

    /// How often empty topics are swept
    pub cleanup_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl HubConfig {
    /// Set the per-topic buffer size (at least 1)
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set how often empty topics are swept
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

/// One payload delivered on a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    /// Topic the payload was sent on
    pub topic: String,
    /// Serialized event body
    pub payload: String,
}

/// Topic-keyed broadcast fan-out
#[derive(Debug)]
pub struct TopicHub {
    topics: RwLock<HashMap<String, broadcast::Sender<PublishedEvent>>>,
    config: HubConfig,
}

impl TopicHub {
    /// Create an empty hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create an empty hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Subscribe to a topic, creating it if needed
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<PublishedEvent> {
        if let Some(tx) = self.topics.read().await.get(topic) {
            return tx.subscribe();
        }

        let mut topics = self.topics.write().await;
        let tx = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.config.channel_capacity).0);

        tracing::debug!(topic = %topic, subscribers = tx.receiver_count() + 1, "Subscriber added");
        tx.subscribe()
    }

    /// Deliver a payload to the topic's current subscribers
    ///
    /// Returns the number of receivers; 0 when nobody is listening.
    pub async fn send(&self, topic: &str, payload: String) -> usize {
        let topics = self.topics.read().await;
        let Some(tx) = topics.get(topic) else {
            return 0;
        };

        let event = PublishedEvent {
            topic: topic.to_string(),
            payload,
        };

        // send() only fails when there are no receivers
        tx.send(event).unwrap_or(0)
    }

    /// Current subscriber count for a topic
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of topics with a live sender
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }

    /// Remove topics that have no subscribers left
    pub async fn cleanup(&self) {
        let mut topics = self.topics.write().await;
        topics.retain(|topic, tx| {
            let keep = tx.receiver_count() > 0;
            if !keep {
                tracing::debug!(topic = %topic, "Topic removed by cleanup");
            }
            keep
        });
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        let interval = hub.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                hub.cleanup().await;
            }
        })
    }
}

impl Default for TopicHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for TopicHub {
    async fn publish(&self, topic: &str, payload: String) -> usize {
        self.send(topic, payload).await
    }
}
