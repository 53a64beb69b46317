//! Collaborator bundle for the Authentication sagas.

use crate::credential::PasswordHasher;
use crate::repository::CredentialRepository;
use crate::session::{CurrentSessionCache, SessionRepository};
use crate::token::TokenIssuer;

/// The Authentication context's collaborators, constructed explicitly at
/// startup and handed to each saga orchestrator.
///
/// No global singletons: every orchestrator receives exactly the
/// collaborators it needs, which keeps tests on fakes trivial.
#[derive(Clone)]
pub struct AuthContext<C, S, T, H>
where
    C: CredentialRepository + Clone,
    S: SessionRepository + Clone,
    T: TokenIssuer + Clone,
    H: PasswordHasher + Clone,
{
    /// Credential storage.
    pub credentials: C,
    /// Session storage.
    pub sessions: S,
    /// Token issuance.
    pub tokens: T,
    /// Password hashing seam.
    pub hasher: H,
    /// Most-recent-session cache.
    pub current: CurrentSessionCache,
}

impl<C, S, T, H> AuthContext<C, S, T, H>
where
    C: CredentialRepository + Clone,
    S: SessionRepository + Clone,
    T: TokenIssuer + Clone,
    H: PasswordHasher + Clone,
{
    /// Bundles the given collaborators.
    pub fn new(credentials: C, sessions: S, tokens: T, hasher: H) -> Self {
        Self {
            credentials,
            sessions,
            tokens,
            hasher,
            current: CurrentSessionCache::new(),
        }
    }
}
