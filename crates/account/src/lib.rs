//! Account bounded context.
//!
//! Owns account identity and lifecycle status. Answers id-lookup and
//! status-verification requests from the Authentication context over the
//! bus, and runs the requesting side of the account deactivation saga.
//! Nothing in this crate reaches into Authentication state; only event
//! payloads cross the boundary.

pub mod aggregate;
pub mod deactivation;
pub mod error;
pub mod handlers;
pub mod repository;

pub use aggregate::Account;
pub use deactivation::{
    DeactivationFailure, DeactivationRequest, DeactivationResult, DeactivationSaga,
    DEFAULT_VERIFICATION_DEADLINE,
};
pub use error::AccountError;
pub use handlers::attach_account_handlers;
pub use repository::{AccountRepository, InMemoryAccountRepository};

/// Convenience type alias for account results.
pub type Result<T> = std::result::Result<T, AccountError>;
