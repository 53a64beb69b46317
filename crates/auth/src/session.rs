//! Sessions and their storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::types::ClientInfo;
use common::{AccountId, SessionId};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Default session lifetime.
pub const SESSION_TTL_HOURS: i64 = 24;

/// One authenticated device/browser context for an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    account_id: AccountId,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    active: bool,
    client: Option<ClientInfo>,
}

impl Session {
    /// Creates a new active session with the default TTL.
    pub fn new(account_id: AccountId, client: Option<ClientInfo>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            account_id,
            created_at: now,
            last_activity_at: now,
            expires_at: now + Duration::hours(SESSION_TTL_HOURS),
            active: true,
            client,
        }
    }

    /// Returns the session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the owning account id.
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Returns true if the session is active and unexpired at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.active && now < self.expires_at
    }

    /// Records activity, pushing the expiry window forward.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.last_activity_at = now;
        self.expires_at = now + Duration::hours(SESSION_TTL_HOURS);
    }

    /// Marks the session terminated.
    pub fn terminate(&mut self) {
        self.active = false;
        self.last_activity_at = Utc::now();
    }

    /// Returns the client context attached at login, if any.
    pub fn client(&self) -> Option<&ClientInfo> {
        self.client.as_ref()
    }
}

/// Storage boundary for sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Looks up a session by id.
    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>, AuthError>;

    /// Returns all sessions for an account, active or not.
    async fn find_by_account_id(&self, account_id: AccountId) -> Result<Vec<Session>, AuthError>;

    /// Inserts or replaces a session.
    async fn save(&self, session: Session) -> Result<(), AuthError>;

    /// Deletes a session. Deleting a missing session is a no-op.
    async fn delete(&self, id: SessionId) -> Result<(), AuthError>;

    /// Deletes every session for an account, returning how many were active.
    async fn delete_by_account_id(&self, account_id: AccountId) -> Result<usize, AuthError>;

    /// Counts active sessions for an account.
    async fn count_active(&self, account_id: AccountId) -> Result<usize, AuthError>;
}

/// In-memory session repository.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionRepository {
    state: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl InMemorySessionRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored sessions.
    pub fn session_count(&self) -> usize {
        self.state.read().unwrap().len()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>, AuthError> {
        Ok(self.state.read().unwrap().get(&id).cloned())
    }

    async fn find_by_account_id(&self, account_id: AccountId) -> Result<Vec<Session>, AuthError> {
        Ok(self
            .state
            .read()
            .unwrap()
            .values()
            .filter(|s| s.account_id() == account_id)
            .cloned()
            .collect())
    }

    async fn save(&self, session: Session) -> Result<(), AuthError> {
        self.state.write().unwrap().insert(session.id(), session);
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), AuthError> {
        self.state.write().unwrap().remove(&id);
        Ok(())
    }

    async fn delete_by_account_id(&self, account_id: AccountId) -> Result<usize, AuthError> {
        let mut state = self.state.write().unwrap();
        let now = Utc::now();
        let ids: Vec<SessionId> = state
            .values()
            .filter(|s| s.account_id() == account_id)
            .map(|s| s.id())
            .collect();
        let active = state
            .values()
            .filter(|s| s.account_id() == account_id && s.is_active(now))
            .count();
        for id in ids {
            state.remove(&id);
        }
        Ok(active)
    }

    async fn count_active(&self, account_id: AccountId) -> Result<usize, AuthError> {
        let now = Utc::now();
        Ok(self
            .state
            .read()
            .unwrap()
            .values()
            .filter(|s| s.account_id() == account_id && s.is_active(now))
            .count())
    }
}

/// Tracks the most recent session per account.
///
/// Set on login, cleared on logout and deactivation cleanup. Purely a
/// convenience cache; the session repository stays authoritative.
#[derive(Debug, Clone, Default)]
pub struct CurrentSessionCache {
    state: Arc<RwLock<HashMap<AccountId, SessionId>>>,
}

impl CurrentSessionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the current session for an account.
    pub fn set(&self, account_id: AccountId, session_id: SessionId) {
        self.state.write().unwrap().insert(account_id, session_id);
    }

    /// Returns the current session for an account, if cached.
    pub fn get(&self, account_id: AccountId) -> Option<SessionId> {
        self.state.read().unwrap().get(&account_id).copied()
    }

    /// Clears the cache entry if it points at the given session.
    pub fn clear_if_current(&self, account_id: AccountId, session_id: SessionId) {
        let mut state = self.state.write().unwrap();
        if state.get(&account_id) == Some(&session_id) {
            state.remove(&account_id);
        }
    }

    /// Clears the cache entry for an account unconditionally.
    pub fn clear(&self, account_id: AccountId) {
        self.state.write().unwrap().remove(&account_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_session_is_active() {
        let session = Session::new(AccountId::new(), None);
        assert!(session.is_active(Utc::now()));
    }

    #[tokio::test]
    async fn terminated_session_is_inactive() {
        let mut session = Session::new(AccountId::new(), None);
        session.terminate();
        assert!(!session.is_active(Utc::now()));
    }

    #[tokio::test]
    async fn expired_session_is_inactive() {
        let session = Session::new(AccountId::new(), None);
        let later = Utc::now() + Duration::hours(SESSION_TTL_HOURS + 1);
        assert!(!session.is_active(later));
    }

    #[tokio::test]
    async fn delete_by_account_counts_only_active() {
        let repo = InMemorySessionRepository::new();
        let account_id = AccountId::new();

        let s1 = Session::new(account_id, None);
        let s2 = Session::new(account_id, None);
        let mut s3 = Session::new(account_id, None);
        s3.terminate();
        let other = Session::new(AccountId::new(), None);

        for s in [s1, s2, s3, other] {
            repo.save(s).await.unwrap();
        }

        let active = repo.delete_by_account_id(account_id).await.unwrap();
        assert_eq!(active, 2);
        // Only the unrelated account's session remains.
        assert_eq!(repo.session_count(), 1);
    }

    #[tokio::test]
    async fn count_active_ignores_terminated() {
        let repo = InMemorySessionRepository::new();
        let account_id = AccountId::new();

        let s1 = Session::new(account_id, None);
        let mut s2 = Session::new(account_id, None);
        s2.terminate();
        repo.save(s1).await.unwrap();
        repo.save(s2).await.unwrap();

        assert_eq!(repo.count_active(account_id).await.unwrap(), 1);
    }

    #[test]
    fn current_session_cache_clear_if_current() {
        let cache = CurrentSessionCache::new();
        let account_id = AccountId::new();
        let session_id = SessionId::new();

        cache.set(account_id, session_id);
        cache.clear_if_current(account_id, SessionId::new());
        assert_eq!(cache.get(account_id), Some(session_id));

        cache.clear_if_current(account_id, session_id);
        assert_eq!(cache.get(account_id), None);
    }
}
