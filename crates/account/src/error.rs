//! Account context error types.

use common::AccountId;
use thiserror::Error;

/// Errors that can occur in the Account context.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Account does not exist.
    #[error("account not found: {0}")]
    NotFound(AccountId),

    /// Account is already deactivated.
    #[error("account already deactivated: {0}")]
    AlreadyDeactivated(AccountId),

    /// A user-initiated request targeted someone else's account.
    #[error("permission denied: a user may only deactivate their own account")]
    PermissionDenied,

    /// Repository failure.
    #[error("repository error: {0}")]
    Repository(String),

    /// Bus failure while publishing or decoding.
    #[error("bus error: {0}")]
    Bus(#[from] bus::BusError),
}
