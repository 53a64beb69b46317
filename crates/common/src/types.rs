//! Value types shared by the account and authentication contexts.

use serde::{Deserialize, Serialize};

/// Who initiated a saga request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiatorRole {
    /// The account owner acting on their own behalf.
    User,
    /// An administrator acting on another account.
    Admin,
    /// An automated system process.
    System,
}

impl InitiatorRole {
    /// Returns the role name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            InitiatorRole::User => "user",
            InitiatorRole::Admin => "admin",
            InitiatorRole::System => "system",
        }
    }
}

impl std::fmt::Display for InitiatorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional client context attached to request events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client IP address, if known.
    pub ip_address: Option<String>,
    /// User agent string, if known.
    pub user_agent: Option<String>,
    /// Device identifier, if known.
    pub device_id: Option<String>,
}

/// Lifecycle status of an account.
///
/// Only `Active` accounts may log in; every other status carries a
/// human-readable message explaining the refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Account is in good standing.
    Active,
    /// Account is administratively locked.
    Locked,
    /// Account is suspended pending review.
    Suspended,
    /// Account has not completed verification.
    PendingVerification,
    /// Account has been deactivated (terminal).
    Deactivated,
}

impl AccountStatus {
    /// Returns true if an account in this status may log in.
    pub fn is_login_allowed(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }

    /// Human-readable explanation used in status responses and audit events.
    pub fn status_message(&self) -> &'static str {
        match self {
            AccountStatus::Active => "account is active",
            AccountStatus::Locked => "account is locked",
            AccountStatus::Suspended => "account is suspended",
            AccountStatus::PendingVerification => "account is pending verification",
            AccountStatus::Deactivated => "account is deactivated",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountStatus::Active => "active",
            AccountStatus::Locked => "locked",
            AccountStatus::Suspended => "suspended",
            AccountStatus::PendingVerification => "pending_verification",
            AccountStatus::Deactivated => "deactivated",
        };
        write!(f, "{s}")
    }
}

/// Outcome tag carried by every response-type event.
///
/// `Timeout` is synthesized locally by the correlation registry and is never
/// published by a remote side; a remote that gives up publishes `Cancelled`
/// or `Failed` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOutcome {
    Success,
    Failed,
    Cancelled,
    Timeout,
}

impl ResponseOutcome {
    /// Returns true for the `Success` outcome.
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseOutcome::Success)
    }
}

/// Result of a single credential verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationResult {
    Success,
    Failed,
}

/// How a deactivation request was verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// Password re-entry through the interactive boundary.
    Password,
    /// MFA code through the interactive boundary.
    Mfa,
    /// Administrative override, no interactive step.
    AdminOverride,
    /// System-initiated override, no interactive step.
    SystemOverride,
}

/// Why a logout was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutType {
    /// User-initiated logout.
    Manual,
    /// Administratively forced logout.
    Forced,
    /// Session expired.
    Expired,
}

/// Why a session was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationType {
    /// Ordinary logout.
    Logout,
    /// Administratively forced logout.
    ForcedLogout,
    /// Account deactivation cleanup.
    AccountDeactivation,
    /// Session expiry.
    Expiry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_allows_login() {
        assert!(AccountStatus::Active.is_login_allowed());
        assert!(!AccountStatus::Locked.is_login_allowed());
        assert!(!AccountStatus::Suspended.is_login_allowed());
        assert!(!AccountStatus::PendingVerification.is_login_allowed());
        assert!(!AccountStatus::Deactivated.is_login_allowed());
    }

    #[test]
    fn initiator_role_display() {
        assert_eq!(InitiatorRole::User.to_string(), "user");
        assert_eq!(InitiatorRole::Admin.to_string(), "admin");
        assert_eq!(InitiatorRole::System.to_string(), "system");
    }

    #[test]
    fn response_outcome_serializes_snake_case() {
        let json = serde_json::to_string(&ResponseOutcome::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        let back: ResponseOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ResponseOutcome::Cancelled);
    }

    #[test]
    fn status_serialization_roundtrip() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Locked,
            AccountStatus::Suspended,
            AccountStatus::PendingVerification,
            AccountStatus::Deactivated,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: AccountStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(status, back);
        }
    }
}
