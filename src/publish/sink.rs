//! Event sink seam

use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::DecodedEvent;

/// Destination for decoded notify events
///
/// Delivery is at most once. Implementations must not block the caller for
/// long; a slow sink stalls the notify channel that feeds it.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish `payload` on `topic`, returning how many subscribers received it
    async fn publish(&self, topic: &str, payload: String) -> usize;
}

/// Converts decoded events to payloads and forwards them to a sink
#[derive(Clone)]
pub struct EventPublisher {
    sink: Arc<dyn EventSink>,
}

impl EventPublisher {
    /// Create a publisher that forwards to `sink`
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Publish one decoded event on its topic
    pub async fn publish_event(&self, event: &DecodedEvent) -> usize {
        let delivered = self.sink.publish(&event.topic, event.to_payload()).await;

        tracing::trace!(
            studio = %event.studio,
            topic = %event.topic,
            kind = ?event.kind,
            delivered = delivered,
            "Event published"
        );

        delivered
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher").finish_non_exhaustive()
    }
}
