//! In-process bus backed by a `tokio::sync::broadcast` channel.
//!
//! Every subscriber sees every message and filters by its own compiled
//! pattern. Slow subscribers that fall behind the channel capacity lose the
//! oldest messages (logged), they are never allowed to block publishers.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::subject::validate_subject;
use crate::{BusError, Event, MessageBus, SubjectPattern, Subscription};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct InMemoryBus {
    tx: broadcast::Sender<Event>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, event: Event) -> Result<(), BusError> {
        validate_subject(&event.subject)?;
        // No receivers is not an error for a pub/sub bus.
        match self.tx.send(event) {
            Ok(n) => debug!(receivers = n, "published event"),
            Err(broadcast::error::SendError(event)) => {
                debug!(subject = %event.subject, "published event with no subscribers")
            }
        }
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<Subscription, BusError> {
        let compiled = SubjectPattern::parse(pattern)?;
        let rx = self.tx.subscribe();

        let stream = futures::stream::unfold((rx, compiled), |(mut rx, pattern)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if pattern.matches(&event.subject) => {
                        return Some((event, (rx, pattern)));
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%pattern, skipped = n, "subscription lagged; messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Subscription::new(pattern, Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn subscriber_only_sees_matching_subjects() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("graph.>").await.unwrap();

        bus.publish(Event::new("health.ok", json!({}))).await.unwrap();
        bus.publish(Event::new("graph.file.updated", json!({ "path": "a.rs" })))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .expect("event should arrive")
            .expect("bus open");
        assert_eq!(event.subject, "graph.file.updated");
        assert_eq!(event.payload["path"], "a.rs");
    }

    #[tokio::test]
    async fn publishing_without_subscribers_succeeds() {
        let bus = InMemoryBus::new();
        assert!(bus.publish(Event::new("graph.file", json!(null))).await.is_ok());
    }

    #[tokio::test]
    async fn wildcard_subjects_cannot_be_published() {
        let bus = InMemoryBus::new();
        assert!(matches!(
            bus.publish(Event::new("graph.*", json!(null))).await,
            Err(BusError::InvalidSubject(_))
        ));
    }

    #[tokio::test]
    async fn invalid_subscription_pattern_is_rejected() {
        let bus = InMemoryBus::new();
        assert!(bus.subscribe("a.>.b").await.is_err());
    }

    #[test]
    fn event_uses_type_on_the_wire() {
        let event: Event = serde_json::from_value(json!({
            "type": "graph.node.created",
            "payload": { "id": 7 },
            "source": "indexer"
        }))
        .unwrap();
        assert_eq!(event.subject, "graph.node.created");
        assert_eq!(event.source.as_deref(), Some("indexer"));
        assert!(event.timestamp.is_none());
    }
}
