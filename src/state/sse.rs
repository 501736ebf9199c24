use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::dto::sse::ServerEvent;

/// Fan-out point for the public event stream.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Hub backed by a broadcast channel holding at most `capacity` undelivered events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Number of connected subscribers.
    pub fn subscribers(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send an event to all current subscribers. Having none is not an error.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Serialize `payload` as JSON and broadcast it under the event name `name`.
    pub fn publish<T: Serialize>(&self, name: &str, payload: &T) {
        match ServerEvent::json(name.to_string(), payload) {
            Ok(event) => self.broadcast(event),
            Err(err) => warn!(event = name, error = %err, "failed to serialise SSE payload"),
        }
    }
}
