//! Route handlers and shared application state.

pub mod accounts;
pub mod auth;
pub mod health;
pub mod metrics;

use ::auth::{
    InMemoryCredentialRepository, InMemorySessionRepository, InMemoryTokenIssuer,
    InMemoryVerificationPrompt, LoginSaga, LogoutSaga, PlaintextHasher,
};
use account::{DeactivationSaga, InMemoryAccountRepository};
use bus::EventBus;

/// Shared application state accessible from all handlers.
pub struct AppState<B: EventBus + Clone + 'static> {
    pub accounts: InMemoryAccountRepository,
    pub credentials: InMemoryCredentialRepository,
    pub sessions: InMemorySessionRepository,
    pub hasher: PlaintextHasher,
    /// Interactive verification stand-in; scripted in tests, answers
    /// `Cancelled` by default.
    pub prompt: InMemoryVerificationPrompt,
    pub login_saga: LoginSaga<
        B,
        InMemoryCredentialRepository,
        InMemorySessionRepository,
        InMemoryTokenIssuer,
        PlaintextHasher,
    >,
    pub logout_saga: LogoutSaga<B, InMemorySessionRepository>,
    pub deactivation_saga: DeactivationSaga<B, InMemoryAccountRepository>,
}
