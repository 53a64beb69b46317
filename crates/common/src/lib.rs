//! Shared kernel for the account and authentication bounded contexts.
//!
//! Holds the typed identifiers, roles, and the closed event catalog that
//! cross the context boundary. Nothing in here owns state; contexts exchange
//! only these value types over the bus.

pub mod events;
pub mod ids;
pub mod types;

pub use events::AuthEvent;
pub use ids::{AccountId, CredentialId, RequestId, SessionId};
pub use types::{
    AccountStatus, ClientInfo, InitiatorRole, LogoutType, ResponseOutcome, TerminationType,
    VerificationMethod, VerificationResult,
};
