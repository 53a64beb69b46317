//! Topic-based publish/subscribe bus for cross-context events.
//!
//! The bus has no request/response semantics of its own; correlation is
//! layered on top by the `correlation` crate. Delivery is reliable and
//! in-order per subscriber within a single process. Handler failures are
//! caught at the dispatch boundary and logged, never propagated to the
//! publisher.

pub mod bus;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod memory;

pub use bus::{EventBus, EventHandler, HandlerFuture};
pub use codec::{decode, encode};
pub use envelope::{EventEnvelope, EventId};
pub use error::BusError;
pub use memory::InMemoryEventBus;

/// Convenience type alias for bus results.
pub type Result<T> = std::result::Result<T, BusError>;
