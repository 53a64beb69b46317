//! Encoding and validation of catalog events at the bus boundary.
//!
//! The catalog is closed: an envelope whose type or payload does not match
//! one of the `AuthEvent` variants is rejected at decode time, before any
//! handler sees it.

use common::AuthEvent;
use serde_json::json;

use crate::Result;
use crate::envelope::EventEnvelope;
use crate::error::BusError;

/// Encodes a catalog event into a bus envelope.
pub fn encode(event: &AuthEvent) -> Result<EventEnvelope> {
    // The catalog serializes as {"type": ..., "data": ...}; the envelope
    // carries the type separately, so only the data goes in the payload.
    let tagged = serde_json::to_value(event)?;
    let payload = tagged
        .get("data")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    Ok(EventEnvelope::builder()
        .event_type(event.event_type())
        .aggregate_id(event.aggregate_id())
        .payload_raw(payload)
        .build())
}

/// Decodes a bus envelope back into a catalog event.
///
/// Fails with [`BusError::Decode`] when the payload does not match the fixed
/// shape for the envelope's event type, and [`BusError::UnknownEventType`]
/// when the type is not in the catalog.
pub fn decode(envelope: &EventEnvelope) -> Result<AuthEvent> {
    let tagged = json!({
        "type": envelope.event_type,
        "data": envelope.payload,
    });

    serde_json::from_value(tagged).map_err(|source| {
        if is_known_event_type(&envelope.event_type) {
            BusError::Decode {
                event_type: envelope.event_type.clone(),
                source,
            }
        } else {
            BusError::UnknownEventType(envelope.event_type.clone())
        }
    })
}

fn is_known_event_type(event_type: &str) -> bool {
    matches!(
        event_type,
        "AccountIdGetterRequested"
            | "AccountIdGetterResponse"
            | "AccountStatusVerificationRequested"
            | "AccountStatusVerificationResponse"
            | "LoginCredentialVerification"
            | "LoginAttempt"
            | "UserLoggedIn"
            | "AccountDeactivationVerificationRequested"
            | "AccountDeactivationVerificationResponse"
            | "AccountDeactivationConfirmed"
            | "SessionTerminated"
            | "AllSessionsTerminated"
            | "UserLoggedOut"
    )
}
