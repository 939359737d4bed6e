//! Fire-and-forget event fan-out

use log::trace;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::models::FlasherEvent;

/// Sink for structured status messages; must never block the caller
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: Value);

    fn emit(&self, event: &FlasherEvent) {
        self.publish(event.topic(), event.payload());
    }
}

/// One published message as seen by subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Value,
}

/// Broadcasts every message to all current subscribers.
///
/// Slow subscribers lag and lose old messages; nobody listening is fine.
#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<PublishedMessage>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedMessage> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, topic: &str, payload: Value) {
        let message = PublishedMessage {
            topic: topic.to_string(),
            payload,
        };
        if self.sender.send(message).is_err() {
            trace!("No subscribers for {}", topic);
        }
    }
}
