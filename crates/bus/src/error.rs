//! Bus error types.

use thiserror::Error;

/// Errors that can occur at the bus boundary.
#[derive(Debug, Error)]
pub enum BusError {
    /// A payload did not decode into the closed event catalog.
    #[error("failed to decode '{event_type}' payload: {source}")]
    Decode {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// An envelope carried an event type the catalog does not know.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// Serialization failure while encoding an event.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A subscriber handler failed; caught at the dispatch boundary.
    #[error("handler for '{event_type}' failed: {reason}")]
    Handler { event_type: String, reason: String },
}

impl BusError {
    /// Wraps an arbitrary handler failure.
    pub fn handler(event_type: impl Into<String>, reason: impl Into<String>) -> Self {
        BusError::Handler {
            event_type: event_type.into(),
            reason: reason.into(),
        }
    }
}
