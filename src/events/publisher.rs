//! Event publishers for outbound queue events

use crate::error::{QueueError, Result};
use crate::events::{EventEnvelope, QueueEvent};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Trait for publishing queue events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single queue event
    async fn publish(&self, event: QueueEvent) -> Result<()>;
}

/// Fan-out publisher backed by a tokio broadcast channel
///
/// Display boards subscribe through the HTTP event stream. Publishing while
/// nobody is listening is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<EventEnvelope>,
}

impl BroadcastEventPublisher {
    /// Create a publisher whose subscribers may lag by up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: QueueEvent) -> Result<()> {
        let envelope = EventEnvelope::new(event);
        let event_id = envelope.event_id;
        let kind = envelope.event.kind();

        match self.sender.send(envelope) {
            Ok(receivers) => {
                debug!("Published {} event {} to {} subscribers", kind, event_id, receivers);
            }
            Err(_) => {
                debug!("No subscribers for {} event {}", kind, event_id);
            }
        }

        Ok(())
    }
}

/// Publisher that keeps every event in memory, for tests and dry runs
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published_events: Mutex<Vec<QueueEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published events
    pub fn get_published_events(&self) -> Vec<QueueEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count published events with the given type name
    pub fn count_events_of_type(&self, kind: &str) -> usize {
        self.published_events
            .lock()
            .map(|events| events.iter().filter(|e| e.kind() == kind).count())
            .unwrap_or(0)
    }

    /// Clear published events
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: QueueEvent) -> Result<()> {
        let mut events = self
            .published_events
            .lock()
            .map_err(|_| QueueError::lock_failed("published events"))?;
        events.push(event);
        Ok(())
    }
}
