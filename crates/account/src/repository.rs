//! Account repository trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AccountId;

use crate::aggregate::Account;
use crate::error::AccountError;

/// Storage boundary for accounts.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Looks up an account by id.
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError>;

    /// Looks up an account by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AccountError>;

    /// Inserts or replaces an account.
    async fn save(&self, account: Account) -> Result<(), AccountError>;
}

/// In-memory account repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountRepository {
    state: Arc<RwLock<HashMap<AccountId, Account>>>,
}

impl InMemoryAccountRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored accounts.
    pub fn account_count(&self) -> usize {
        self.state.read().unwrap().len()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        Ok(self.state.read().unwrap().get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AccountError> {
        Ok(self
            .state
            .read()
            .unwrap()
            .values()
            .find(|a| a.username() == username)
            .cloned())
    }

    async fn save(&self, account: Account) -> Result<(), AccountError> {
        self.state.write().unwrap().insert(account.id(), account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_find() {
        let repo = InMemoryAccountRepository::new();
        let account = Account::new("alice");
        let id = account.id();

        repo.save(account).await.unwrap();
        assert_eq!(repo.account_count(), 1);

        let by_id = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(by_id.username(), "alice");

        let by_name = repo.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id(), id);
    }

    #[tokio::test]
    async fn missing_account_is_none() {
        let repo = InMemoryAccountRepository::new();
        assert!(repo.find_by_id(AccountId::new()).await.unwrap().is_none());
        assert!(repo.find_by_username("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_existing() {
        let repo = InMemoryAccountRepository::new();
        let mut account = Account::new("bob");
        let id = account.id();
        repo.save(account.clone()).await.unwrap();

        account.deactivate().unwrap();
        repo.save(account).await.unwrap();

        assert_eq!(repo.account_count(), 1);
        assert!(repo.find_by_id(id).await.unwrap().unwrap().is_deactivated());
    }
}
