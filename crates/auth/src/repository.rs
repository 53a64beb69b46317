//! Credential repository trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AccountId;

use crate::credential::AuthCredential;
use crate::error::AuthError;

/// Storage boundary for credentials. One credential per account.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Looks up the credential for an account.
    async fn find_by_account_id(
        &self,
        account_id: AccountId,
    ) -> Result<Option<AuthCredential>, AuthError>;

    /// Inserts or replaces a credential.
    async fn save(&self, credential: AuthCredential) -> Result<(), AuthError>;

    /// Deletes the credential for an account, returning whether one existed.
    async fn delete(&self, account_id: AccountId) -> Result<bool, AuthError>;
}

/// In-memory credential repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialRepository {
    state: Arc<RwLock<HashMap<AccountId, AuthCredential>>>,
}

impl InMemoryCredentialRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored credentials.
    pub fn credential_count(&self) -> usize {
        self.state.read().unwrap().len()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn find_by_account_id(
        &self,
        account_id: AccountId,
    ) -> Result<Option<AuthCredential>, AuthError> {
        Ok(self.state.read().unwrap().get(&account_id).cloned())
    }

    async fn save(&self, credential: AuthCredential) -> Result<(), AuthError> {
        self.state
            .write()
            .unwrap()
            .insert(credential.account_id(), credential);
        Ok(())
    }

    async fn delete(&self, account_id: AccountId) -> Result<bool, AuthError> {
        Ok(self.state.write().unwrap().remove(&account_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_find_delete() {
        let repo = InMemoryCredentialRepository::new();
        let account_id = AccountId::new();
        let credential = AuthCredential::new(account_id, "hash");

        repo.save(credential).await.unwrap();
        assert!(
            repo.find_by_account_id(account_id)
                .await
                .unwrap()
                .is_some()
        );

        assert!(repo.delete(account_id).await.unwrap());
        assert!(!repo.delete(account_id).await.unwrap());
        assert!(
            repo.find_by_account_id(account_id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
