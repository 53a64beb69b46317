//! The account aggregate.

use chrono::{DateTime, Utc};
use common::{AccountId, AccountStatus};
use serde::{Deserialize, Serialize};

use crate::error::AccountError;

/// An account in the Account context.
///
/// Status transitions are one-way into `Deactivated`; every other status
/// can move freely between the administrative states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    username: String,
    status: AccountStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new active account.
    pub fn new(username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            username: username.into(),
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an account in a specific status (administrative setup).
    pub fn with_status(username: impl Into<String>, status: AccountStatus) -> Self {
        let mut account = Self::new(username);
        account.status = status;
        account
    }

    /// Returns the account id.
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Returns the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the current status.
    pub fn status(&self) -> AccountStatus {
        self.status
    }

    /// Returns true if this account may log in.
    pub fn is_login_allowed(&self) -> bool {
        self.status.is_login_allowed()
    }

    /// Returns true if this account has been deactivated.
    pub fn is_deactivated(&self) -> bool {
        self.status == AccountStatus::Deactivated
    }

    /// Moves the account into an administrative status.
    ///
    /// Fails once the account is deactivated; deactivation is terminal.
    pub fn set_status(&mut self, status: AccountStatus) -> Result<(), AccountError> {
        if self.is_deactivated() {
            return Err(AccountError::AlreadyDeactivated(self.id));
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Deactivates the account.
    pub fn deactivate(&mut self) -> Result<(), AccountError> {
        self.set_status(AccountStatus::Deactivated)
    }

    /// Returns when the account was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the account was last updated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_active() {
        let account = Account::new("alice");
        assert_eq!(account.username(), "alice");
        assert_eq!(account.status(), AccountStatus::Active);
        assert!(account.is_login_allowed());
        assert!(!account.is_deactivated());
    }

    #[test]
    fn with_status_denies_login_for_suspended() {
        let account = Account::with_status("bob", AccountStatus::Suspended);
        assert!(!account.is_login_allowed());
    }

    #[test]
    fn deactivation_is_terminal() {
        let mut account = Account::new("carol");
        account.deactivate().unwrap();
        assert!(account.is_deactivated());

        let err = account.set_status(AccountStatus::Active).unwrap_err();
        assert!(matches!(err, AccountError::AlreadyDeactivated(_)));

        let err = account.deactivate().unwrap_err();
        assert!(matches!(err, AccountError::AlreadyDeactivated(_)));
    }

    #[test]
    fn status_changes_touch_updated_at() {
        let mut account = Account::new("dave");
        let before = account.updated_at();
        account.set_status(AccountStatus::Locked).unwrap();
        assert!(account.updated_at() >= before);
        assert_eq!(account.status(), AccountStatus::Locked);
    }
}
