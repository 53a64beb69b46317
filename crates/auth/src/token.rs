//! Access token issuance.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{AccountId, SessionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Default token lifetime.
pub const TOKEN_TTL_MINUTES: i64 = 60;

/// An issued access token. The signing format is a deployment concern;
/// here the token value is opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque token value handed to the client.
    pub token: String,
    /// Account the token was issued for.
    pub account_id: AccountId,
    /// Session the token is bound to.
    pub session_id: SessionId,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

/// Token issuance boundary.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issues an access token bound to a session.
    async fn issue(
        &self,
        account_id: AccountId,
        session_id: SessionId,
    ) -> Result<AccessToken, AuthError>;

    /// Revokes every token issued for an account, returning the count.
    async fn revoke_for_account(&self, account_id: AccountId) -> Result<usize, AuthError>;
}

/// In-memory token issuer producing random opaque tokens.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenIssuer {
    issued: Arc<RwLock<HashMap<String, AccessToken>>>,
}

impl InMemoryTokenIssuer {
    /// Creates a new issuer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of currently issued tokens.
    pub fn token_count(&self) -> usize {
        self.issued.read().unwrap().len()
    }
}

#[async_trait]
impl TokenIssuer for InMemoryTokenIssuer {
    async fn issue(
        &self,
        account_id: AccountId,
        session_id: SessionId,
    ) -> Result<AccessToken, AuthError> {
        let now = Utc::now();
        let token = AccessToken {
            token: Uuid::new_v4().simple().to_string(),
            account_id,
            session_id,
            issued_at: now,
            expires_at: now + Duration::minutes(TOKEN_TTL_MINUTES),
        };
        self.issued
            .write()
            .unwrap()
            .insert(token.token.clone(), token.clone());
        Ok(token)
    }

    async fn revoke_for_account(&self, account_id: AccountId) -> Result<usize, AuthError> {
        let mut issued = self.issued.write().unwrap();
        let before = issued.len();
        issued.retain(|_, t| t.account_id != account_id);
        Ok(before - issued.len())
    }
}
