//! Event types for the zousho event system
//!
//! Schedulers publish queue activity on an [`EventBus`] so observers (the HTTP
//! layer, logging, tests) can follow lookups without touching scheduler state.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// How a lookup settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettledAs {
    /// Provider returned data
    Found,
    /// Provider confirmed it has nothing, or failed permanently
    NotFound,
    /// Provider asked us to back off; a retry is scheduled
    RetryPending,
}

/// zousho event types
///
/// Events are broadcast via EventBus and can be serialized for streaming to
/// clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ZoushoEvent {
    /// Keys were added to a provider queue
    LookupQueued {
        /// Provider name
        source: String,
        /// Keys that actually entered the queue
        keys: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A provider outcome was committed for a key
    LookupSettled {
        source: String,
        key: String,
        outcome: SettledAs,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A rate-limited key will be re-queued after `delay_ms`
    RetryScheduled {
        source: String,
        key: String,
        delay_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ZoushoEvent {
    /// Provider the event belongs to
    pub fn source(&self) -> &str {
        match self {
            Self::LookupQueued { source, .. }
            | Self::LookupSettled { source, .. }
            | Self::RetryScheduled { source, .. } => source,
        }
    }
}

/// Broadcast bus for [`ZoushoEvent`]s
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ZoushoEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    ///
    /// ```
    /// use zousho_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ZoushoEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ZoushoEvent,
    ) -> Result<usize, broadcast::error::SendError<ZoushoEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: ZoushoEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit(ZoushoEvent::LookupSettled {
            source: "openbd".to_string(),
            key: "9784873113944".to_string(),
            outcome: SettledAs::Found,
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.source(), "openbd");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        let event = ZoushoEvent::RetryScheduled {
            source: "google_books".to_string(),
            key: "k".to_string(),
            delay_ms: 500,
            timestamp: chrono::Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ZoushoEvent::LookupQueued {
            source: "rakuten".to_string(),
            keys: vec!["a".to_string()],
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "LookupQueued");
        assert_eq!(json["keys"][0], "a");
    }
}
