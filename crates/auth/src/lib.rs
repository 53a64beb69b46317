//! Authentication bounded context.
//!
//! Owns credentials, sessions, and tokens. Runs the login saga (correlated
//! round trips to the Account context), the logout saga (purely local), and
//! the verifying side of the account deactivation saga. Account state is
//! never touched directly; only event payloads cross the boundary.

pub mod context;
pub mod credential;
pub mod deactivation;
pub mod error;
pub mod login;
pub mod logout;
pub mod repository;
pub mod session;
pub mod token;

pub use context::AuthContext;
pub use credential::{AuthCredential, PasswordHasher, PlaintextHasher};
pub use deactivation::{
    DeactivationVerifier, InMemoryVerificationPrompt, VerificationPrompt, VerificationReply,
};
pub use error::AuthError;
pub use login::{LoginFailure, LoginResult, LoginSaga};
pub use logout::{LogoutFailure, LogoutResult, LogoutSaga};
pub use repository::{CredentialRepository, InMemoryCredentialRepository};
pub use session::{CurrentSessionCache, InMemorySessionRepository, Session, SessionRepository};
pub use token::{AccessToken, InMemoryTokenIssuer, TokenIssuer};

/// Convenience type alias for authentication results.
pub type Result<T> = std::result::Result<T, AuthError>;
