//! The password credential aggregate and the hashing seam.

use chrono::{DateTime, Duration, Utc};
use common::{AccountId, CredentialId};
use serde::{Deserialize, Serialize};

/// Failed attempts beyond this count lock the credential.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// How long a credential stays locked after too many failures.
pub const LOCK_WINDOW_MINUTES: i64 = 15;

/// Hashing seam. The algorithm is a deployment concern; the sagas only
/// ever call through this trait.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a raw password for storage.
    fn hash(&self, raw: &str) -> String;

    /// Checks a raw password against a stored hash.
    fn verify(&self, raw: &str, hash: &str) -> bool;
}

/// Identity "hash" for tests and demos. Not for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextHasher;

impl PasswordHasher for PlaintextHasher {
    fn hash(&self, raw: &str) -> String {
        raw.to_string()
    }

    fn verify(&self, raw: &str, hash: &str) -> bool {
        raw == hash
    }
}

/// A password credential with failed-attempt lockout.
///
/// One credential per account. The failed-attempt counter is incremented on
/// every wrong password; exceeding [`MAX_FAILED_ATTEMPTS`] locks the
/// credential for [`LOCK_WINDOW_MINUTES`]. While locked, the login saga
/// refuses the attempt without comparing passwords.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCredential {
    id: CredentialId,
    account_id: AccountId,
    password_hash: String,
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AuthCredential {
    /// Creates a credential from an already-hashed password.
    pub fn new(account_id: AccountId, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CredentialId::new(),
            account_id,
            password_hash: password_hash.into(),
            failed_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the credential id.
    pub fn id(&self) -> CredentialId {
        self.id
    }

    /// Returns the owning account id.
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Returns the stored password hash.
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Returns the current failed-attempt count.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Returns true if the credential is locked at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Records a failed verification attempt.
    ///
    /// Returns true if this attempt pushed the credential into the locked
    /// state.
    pub fn record_failed_attempt(&mut self, now: DateTime<Utc>) -> bool {
        self.failed_attempts += 1;
        self.updated_at = now;
        if self.failed_attempts > MAX_FAILED_ATTEMPTS && !self.is_locked(now) {
            self.locked_until = Some(now + Duration::minutes(LOCK_WINDOW_MINUTES));
            return true;
        }
        false
    }

    /// Clears the failed-attempt counter after a successful login.
    pub fn reset_failed_attempts(&mut self) {
        self.failed_attempts = 0;
        self.locked_until = None;
        self.updated_at = Utc::now();
    }
}
