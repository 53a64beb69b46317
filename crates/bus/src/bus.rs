//! The event bus trait.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::Result;
use crate::envelope::EventEnvelope;

/// Future returned by an event handler.
pub type HandlerFuture = BoxFuture<'static, Result<()>>;

/// A subscriber callback, invoked once per matching published event.
///
/// Handlers receive an owned envelope and run to completion before the next
/// subscriber of the same event sees it. A returned error is logged by the
/// bus and does not reach the publisher.
pub type EventHandler = Arc<dyn Fn(EventEnvelope) -> HandlerFuture + Send + Sync>;

/// Topic-based publish/subscribe bus.
///
/// No request/response semantics; correlation is layered on top. Delivery is
/// at-least-once and in-order per subscriber within the process.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes an event to all subscribers of its `event_type`.
    ///
    /// Returns once every subscriber has run. Publishing with no subscribers
    /// is not an error.
    async fn publish(&self, envelope: EventEnvelope) -> Result<()>;

    /// Registers a handler for the given event type.
    async fn subscribe(&self, event_type: &str, handler: EventHandler);
}
