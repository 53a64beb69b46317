//! Request/response correlation over a message-oriented channel.
//!
//! A saga step publishes a "requested" event carrying a fresh [`RequestId`],
//! registers a waiter here, and suspends. The subscriber on the response
//! topic resolves the waiter with the matching reply, or the deadline
//! expires first. Whichever happens first wins; the other path becomes a
//! no-op. A background sweeper evicts tickets whose timer somehow failed to
//! fire.

pub mod registry;
pub mod sweeper;

pub use common::RequestId;
pub use registry::{CorrelationRegistry, Outcome, Waiter};
pub use sweeper::spawn_sweeper;

use std::time::Duration;

/// Default interval between defensive sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(120);

/// Default age beyond which an orphaned ticket is forcibly evicted.
pub const DEFAULT_SWEEP_GRACE: Duration = Duration::from_secs(300);
