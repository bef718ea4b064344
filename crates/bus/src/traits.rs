//! The `MessageBus` trait — publish/subscribe over hierarchical subjects.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::{BusError, Event};

/// Publish/subscribe transport.
///
/// The engine only ever needs fire-and-forget publishing and coarse
/// wildcard subscriptions; delivery guarantees are the transport's concern.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `event` on `event.subject`.
    async fn publish(&self, event: Event) -> Result<(), BusError>;

    /// Subscribe to every subject matching `pattern`.
    async fn subscribe(&self, pattern: &str) -> Result<Subscription, BusError>;
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    pattern: String,
    inner: BoxStream<'static, Event>,
}

impl Subscription {
    pub fn new(pattern: impl Into<String>, inner: BoxStream<'static, Event>) -> Self {
        Self {
            pattern: pattern.into(),
            inner,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Wait for the next matching event; `None` once the bus is closed.
    pub async fn next(&mut self) -> Option<Event> {
        self.inner.next().await
    }
}
