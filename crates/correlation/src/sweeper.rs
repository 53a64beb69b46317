//! Background sweep of orphaned correlation tickets.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::registry::CorrelationRegistry;

/// Spawns a background task that periodically evicts tickets older than
/// `grace`, resuming each with a timeout outcome.
///
/// Normal timeout handling lives on the waiter's own deadline; the sweeper
/// only catches tickets whose timer failed to fire. The task runs until the
/// returned handle is aborted or the runtime shuts down.
pub fn spawn_sweeper<R: Send + 'static>(
    registry: CorrelationRegistry<R>,
    interval: Duration,
    grace: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so an empty registry
        // is not swept at startup.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let swept = registry.sweep_expired(grace);
            if swept > 0 {
                tracing::warn!(swept, "correlation sweep evicted orphaned tickets");
            } else {
                tracing::trace!("correlation sweep found nothing");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::RequestId;

    #[tokio::test]
    async fn sweeper_evicts_orphaned_tickets() {
        let registry: CorrelationRegistry<u32> = CorrelationRegistry::new();
        let id = RequestId::new();
        let waiter = registry.register(id, Duration::from_secs(600));

        let handle = spawn_sweeper(
            registry.clone(),
            Duration::from_millis(20),
            Duration::from_millis(1),
        );

        // The ticket is older than the grace window by the first sweep.
        let outcome = waiter.wait().await;
        assert!(outcome.is_timeout());
        assert_eq!(registry.pending_count(), 0);

        handle.abort();
    }

    #[tokio::test]
    async fn sweeper_leaves_fresh_tickets_alone() {
        let registry: CorrelationRegistry<u32> = CorrelationRegistry::new();
        let id = RequestId::new();
        let _waiter = registry.register(id, Duration::from_secs(600));

        let handle = spawn_sweeper(
            registry.clone(),
            Duration::from_millis(10),
            Duration::from_secs(3600),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.pending_count(), 1);

        handle.abort();
    }
}
