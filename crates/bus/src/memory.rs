//! In-memory event bus implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Result;
use crate::bus::{EventBus, EventHandler};
use crate::envelope::EventEnvelope;

/// In-process event bus.
///
/// Dispatch is sequential: `publish` invokes matching handlers one at a
/// time, in subscription order, and returns when the last one finishes. A
/// handler may itself publish; nested publishes complete before the outer
/// call returns, which is what gives saga steps their deterministic event
/// ordering within one instance.
///
/// Every published envelope is also appended to an inspection log so tests
/// can assert on event sequences.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<EventHandler>>>>,
    published: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventBus {
    /// Creates a new bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every envelope published so far, in order.
    pub async fn published(&self) -> Vec<EventEnvelope> {
        self.published.read().await.clone()
    }

    /// Returns the event type names published so far, in order.
    pub async fn published_types(&self) -> Vec<String> {
        self.published
            .read()
            .await
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Returns how many events of the given type were published.
    pub async fn published_count(&self, event_type: &str) -> usize {
        self.published
            .read()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Clears the inspection log (subscribers stay registered).
    pub async fn clear_published(&self) {
        self.published.write().await.clear();
    }

    /// Returns the number of subscribers for an event type.
    pub async fn subscriber_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .await
            .get(event_type)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        metrics::counter!("bus_events_published").increment(1);
        tracing::debug!(
            event_type = %envelope.event_type,
            aggregate_id = %envelope.aggregate_id,
            "publishing event"
        );

        self.published.write().await.push(envelope.clone());

        // Snapshot the handler list so a handler that subscribes or
        // publishes does not deadlock against this read lock.
        let matching: Vec<EventHandler> = {
            let handlers = self.handlers.read().await;
            handlers.get(&envelope.event_type).cloned().unwrap_or_default()
        };

        for handler in matching {
            if let Err(e) = handler(envelope.clone()).await {
                // Handler failures stop at this boundary; the publisher is
                // never left waiting on a subscriber's internal error.
                metrics::counter!("bus_handler_failures").increment(1);
                tracing::error!(
                    event_type = %envelope.event_type,
                    error = %e,
                    "event handler failed"
                );
            }
        }

        Ok(())
    }

    async fn subscribe(&self, event_type: &str, handler: EventHandler) {
        self.handlers
            .write()
            .await
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type(event_type)
            .aggregate_id("agg-1")
            .payload_raw(serde_json::json!({}))
            .build()
    }

    #[tokio::test]
    async fn delivers_to_matching_subscribers_only() {
        let bus = InMemoryEventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        bus.subscribe(
            "UserLoggedIn",
            Arc::new(move |_| {
                let h = h.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            }),
        )
        .await;

        bus.publish(test_envelope("UserLoggedIn")).await.unwrap();
        bus.publish(test_envelope("UserLoggedOut")).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.published().await.len(), 2);
    }

    #[tokio::test]
    async fn handler_error_does_not_reach_publisher() {
        let bus = InMemoryEventBus::new();
        bus.subscribe(
            "UserLoggedIn",
            Arc::new(|e| {
                async move { Err(crate::BusError::handler(e.event_type, "boom")) }.boxed()
            }),
        )
        .await;

        // Publish succeeds even though the only handler fails.
        bus.publish(test_envelope("UserLoggedIn")).await.unwrap();
    }

    #[tokio::test]
    async fn handlers_run_in_subscription_order() {
        let bus = InMemoryEventBus::new();
        let order = Arc::new(RwLock::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = order.clone();
            bus.subscribe(
                "SessionTerminated",
                Arc::new(move |_| {
                    let order = order.clone();
                    async move {
                        order.write().await.push(label);
                        Ok(())
                    }
                    .boxed()
                }),
            )
            .await;
        }

        bus.publish(test_envelope("SessionTerminated"))
            .await
            .unwrap();
        assert_eq!(*order.read().await, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn nested_publish_completes_before_outer_returns() {
        let bus = InMemoryEventBus::new();

        let inner_bus = bus.clone();
        bus.subscribe(
            "UserLoggedIn",
            Arc::new(move |_| {
                let bus = inner_bus.clone();
                async move { bus.publish(test_envelope("UserLoggedOut")).await }.boxed()
            }),
        )
        .await;

        bus.publish(test_envelope("UserLoggedIn")).await.unwrap();

        let types = bus.published_types().await;
        assert_eq!(types, vec!["UserLoggedIn", "UserLoggedOut"]);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let bus = InMemoryEventBus::new();
        bus.publish(test_envelope("LoginAttempt")).await.unwrap();
        assert_eq!(bus.published_count("LoginAttempt").await, 1);
        assert_eq!(bus.subscriber_count("LoginAttempt").await, 0);
    }
}
