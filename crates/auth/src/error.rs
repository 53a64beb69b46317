//! Authentication context error types.

use common::{AccountId, SessionId};
use thiserror::Error;

/// Errors that can occur in the Authentication context.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential exists for the account.
    #[error("credential not found for account: {0}")]
    CredentialNotFound(AccountId),

    /// Session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Session exists but is no longer active.
    #[error("session already terminated: {0}")]
    SessionInactive(SessionId),

    /// The interactive verification surface failed.
    #[error("verification prompt failed: {0}")]
    Prompt(String),

    /// Repository failure.
    #[error("repository error: {0}")]
    Repository(String),

    /// Bus failure while publishing or decoding.
    #[error("bus error: {0}")]
    Bus(#[from] bus::BusError),
}
