//! The correlation registry: one ticket per outstanding request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::RequestId;
use tokio::sync::oneshot;

/// What a waiter resolves to.
#[derive(Debug)]
pub enum Outcome<R> {
    /// A matching response arrived before the deadline.
    Reply(R),
    /// The deadline expired (or the ticket was swept) first.
    TimedOut,
}

impl<R> Outcome<R> {
    /// Returns true for the `TimedOut` outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::TimedOut)
    }
}

struct Ticket<R> {
    tx: oneshot::Sender<Outcome<R>>,
    created_at: Instant,
}

/// Table of pending waiters keyed by correlation id.
///
/// `register` and `resolve` are the only mutators; both take the table lock,
/// so no two resolutions of the same id can both succeed. Registration never
/// fails; resolving an unknown id (already resolved, timed out, or a stray
/// response from before a restart) is a safe no-op.
pub struct CorrelationRegistry<R> {
    tickets: Arc<Mutex<HashMap<RequestId, Ticket<R>>>>,
}

impl<R> Clone for CorrelationRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            tickets: self.tickets.clone(),
        }
    }
}

impl<R: Send + 'static> Default for CorrelationRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + 'static> CorrelationRegistry<R> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a waiter for `id` with the given deadline.
    ///
    /// Call this *before* publishing the request event, so a fast responder
    /// cannot race the registration. The returned [`Waiter`] suspends at
    /// [`Waiter::wait`].
    pub fn register(&self, id: RequestId, deadline: Duration) -> Waiter<R> {
        let (tx, rx) = oneshot::channel();
        let ticket = Ticket {
            tx,
            created_at: Instant::now(),
        };

        let previous = self
            .tickets
            .lock()
            .expect("correlation registry lock poisoned")
            .insert(id, ticket);
        // A duplicate id would orphan the previous waiter; ids are fresh
        // UUIDs so this only happens on caller misuse.
        if previous.is_some() {
            tracing::warn!(%id, "correlation id re-registered; previous waiter dropped");
        }

        metrics::counter!("correlation_waiters_registered").increment(1);
        tracing::debug!(%id, ?deadline, "waiter registered");

        Waiter {
            id,
            rx,
            deadline,
            tickets: self.tickets.clone(),
        }
    }

    /// Resolves the waiter registered for `id` with `reply`.
    ///
    /// Returns `true` if a waiter existed and was resumed. Returns `false`
    /// when the id is unknown — already resolved, timed out, or never
    /// registered here — which callers treat as "ignored", not an error.
    /// Note: a late response arriving after timeout is indistinguishable
    /// from an unknown id on this path.
    pub fn resolve(&self, id: RequestId, reply: R) -> bool {
        let ticket = self
            .tickets
            .lock()
            .expect("correlation registry lock poisoned")
            .remove(&id);

        match ticket {
            Some(ticket) => {
                // Send fails only if the waiter was dropped without waiting;
                // the ticket is gone either way.
                let _ = ticket.tx.send(Outcome::Reply(reply));
                metrics::counter!("correlation_waiters_resolved").increment(1);
                tracing::debug!(%id, "waiter resolved");
                true
            }
            None => {
                metrics::counter!("correlation_resolutions_ignored").increment(1);
                tracing::debug!(%id, "resolution ignored: no waiter for id");
                false
            }
        }
    }

    /// Forcibly evicts tickets older than `grace`, resuming each with
    /// [`Outcome::TimedOut`].
    ///
    /// Defensive cleanup for tickets whose deadline timer failed to fire;
    /// under normal operation this finds nothing. Returns the eviction
    /// count.
    pub fn sweep_expired(&self, grace: Duration) -> usize {
        let mut swept = Vec::new();
        {
            let mut tickets = self
                .tickets
                .lock()
                .expect("correlation registry lock poisoned");
            let expired: Vec<RequestId> = tickets
                .iter()
                .filter(|(_, t)| t.created_at.elapsed() > grace)
                .map(|(id, _)| *id)
                .collect();
            for id in expired {
                if let Some(ticket) = tickets.remove(&id) {
                    swept.push((id, ticket));
                }
            }
        }

        for (id, ticket) in &swept {
            tracing::warn!(
                %id,
                age_secs = ticket.created_at.elapsed().as_secs(),
                "swept orphaned correlation ticket"
            );
        }

        let count = swept.len();
        for (_, ticket) in swept {
            let _ = ticket.tx.send(Outcome::TimedOut);
        }

        if count > 0 {
            metrics::counter!("correlation_waiters_swept").increment(count as u64);
        }
        count
    }

    /// Returns the number of outstanding tickets.
    pub fn pending_count(&self) -> usize {
        self.tickets
            .lock()
            .expect("correlation registry lock poisoned")
            .len()
    }
}

/// A registered waiter, suspended until resolution or deadline expiry.
///
/// Dropping a waiter without calling [`Waiter::wait`] removes its ticket,
/// so an abandoned request cannot leak scheduled work.
pub struct Waiter<R> {
    id: RequestId,
    rx: oneshot::Receiver<Outcome<R>>,
    deadline: Duration,
    tickets: Arc<Mutex<HashMap<RequestId, Ticket<R>>>>,
}

impl<R> Drop for Waiter<R> {
    fn drop(&mut self) {
        if let Ok(mut tickets) = self.tickets.lock() {
            tickets.remove(&self.id);
        }
    }
}

impl<R: Send + 'static> Waiter<R> {
    /// Returns the correlation id this waiter is registered under.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Suspends until the waiter is resolved or its deadline expires.
    ///
    /// Exactly-once: on expiry the ticket is removed from the table first,
    /// so a response landing just after can no longer resume anything. If
    /// the resolver won that race instead, its buffered reply is returned.
    pub async fn wait(mut self) -> Outcome<R> {
        match tokio::time::timeout(self.deadline, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                // Sender dropped without sending; only the sweeper does
                // that, and it sends TimedOut first, so this path means the
                // registry itself went away.
                tracing::warn!(id = %self.id, "waiter channel closed without resolution");
                metrics::counter!("correlation_waiters_timed_out").increment(1);
                Outcome::TimedOut
            }
            Err(_elapsed) => {
                let removed = self
                    .tickets
                    .lock()
                    .expect("correlation registry lock poisoned")
                    .remove(&self.id)
                    .is_some();

                if removed {
                    metrics::counter!("correlation_waiters_timed_out").increment(1);
                    tracing::debug!(id = %self.id, deadline = ?self.deadline, "waiter timed out");
                    Outcome::TimedOut
                } else {
                    // The resolver got there between expiry and this lock;
                    // its reply is already buffered in the channel.
                    match self.rx.try_recv() {
                        Ok(outcome) => outcome,
                        Err(_) => Outcome::TimedOut,
                    }
                }
            }
        }
    }
}
