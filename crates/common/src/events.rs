//! The closed catalog of events exchanged between the two contexts.
//!
//! Every payload shape is fixed here; the bus codec refuses anything that
//! does not decode into one of these variants. Request-type events carry the
//! correlation id, the initiator, and optional client context. Response-type
//! events carry the same correlation id plus an outcome and, when the
//! outcome is not successful, a reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, CredentialId, RequestId, SessionId};
use crate::types::{
    AccountStatus, ClientInfo, InitiatorRole, LogoutType, ResponseOutcome, TerminationType,
    VerificationMethod, VerificationResult,
};

/// Events exchanged over the bus between the Account and Authentication
/// contexts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AuthEvent {
    /// Authentication asks Account to resolve a username to an account id.
    AccountIdGetterRequested(AccountIdGetterRequestedData),

    /// Account answers an id lookup request.
    AccountIdGetterResponse(AccountIdGetterResponseData),

    /// Authentication asks Account whether login is allowed for an account.
    AccountStatusVerificationRequested(AccountStatusVerificationRequestedData),

    /// Account answers a status verification request.
    AccountStatusVerificationResponse(AccountStatusVerificationResponseData),

    /// Audit record of one password check against a credential.
    LoginCredentialVerification(LoginCredentialVerificationData),

    /// Audit record of one login attempt, successful or not.
    LoginAttempt(LoginAttemptData),

    /// A user completed login and received a session.
    UserLoggedIn(UserLoggedInData),

    /// Account asks Authentication to verify a deactivation request.
    AccountDeactivationVerificationRequested(DeactivationVerificationRequestedData),

    /// Authentication answers a deactivation verification request.
    AccountDeactivationVerificationResponse(DeactivationVerificationResponseData),

    /// Deactivation was verified and auth-side cleanup ran.
    AccountDeactivationConfirmed(DeactivationConfirmedData),

    /// A single session was terminated.
    SessionTerminated(SessionTerminatedData),

    /// All sessions of an account were terminated at once.
    AllSessionsTerminated(AllSessionsTerminatedData),

    /// A user was logged out of one session.
    UserLoggedOut(UserLoggedOutData),
}

/// Payload for `AccountIdGetterRequested`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountIdGetterRequestedData {
    /// Correlation id generated by the requester.
    pub request_id: RequestId,
    /// Username to resolve.
    pub username: String,
    /// Client context of the login attempt, if known.
    pub client: Option<ClientInfo>,
}

/// Payload for `AccountIdGetterResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountIdGetterResponseData {
    /// Correlation id copied from the request.
    pub request_id: RequestId,
    /// Username that was looked up.
    pub username: String,
    /// Resolved account id, absent when the username is unknown.
    pub account_id: Option<AccountId>,
    /// Lookup outcome.
    pub outcome: ResponseOutcome,
    /// Reason when the outcome is not successful.
    pub reason: Option<String>,
}

/// Payload for `AccountStatusVerificationRequested`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStatusVerificationRequestedData {
    /// Correlation id generated by the requester.
    pub request_id: RequestId,
    /// Account whose status is being verified.
    pub account_id: AccountId,
}

/// Payload for `AccountStatusVerificationResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStatusVerificationResponseData {
    /// Correlation id copied from the request.
    pub request_id: RequestId,
    /// Account whose status was verified.
    pub account_id: AccountId,
    /// Current status, absent when the account does not exist.
    pub account_status: Option<AccountStatus>,
    /// Whether login is allowed in the current status.
    pub is_login_allowed: bool,
    /// Human-readable status explanation.
    pub status_message: Option<String>,
    /// Verification outcome.
    pub outcome: ResponseOutcome,
}

/// Payload for `LoginCredentialVerification`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentialVerificationData {
    /// Account the credential belongs to.
    pub account_id: AccountId,
    /// Credential that was checked.
    pub credential_id: CredentialId,
    /// Result of the check.
    pub verification_result: VerificationResult,
    /// Reason when the check failed.
    pub failure_reason: Option<String>,
}

/// Payload for `LoginAttempt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttemptData {
    /// Username supplied by the caller.
    pub username: String,
    /// Resolved account id, when known at the point of failure.
    pub account_id: Option<AccountId>,
    /// Attempt outcome.
    pub result: VerificationResult,
    /// Reason when the attempt failed.
    pub failure_reason: Option<String>,
    /// Client context, if known.
    pub client: Option<ClientInfo>,
}

/// Payload for `UserLoggedIn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLoggedInData {
    /// Account that logged in.
    pub account_id: AccountId,
    /// Session created for this login.
    pub session_id: SessionId,
    /// When the login completed.
    pub login_at: DateTime<Utc>,
}

/// Payload for `AccountDeactivationVerificationRequested`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivationVerificationRequestedData {
    /// Correlation id generated by the requester.
    pub request_id: RequestId,
    /// Account being deactivated.
    pub account_id: AccountId,
    /// Who initiated the deactivation.
    pub requested_by: InitiatorRole,
    /// Optional reason supplied by the initiator.
    pub reason: Option<String>,
    /// Client context of the request, if known.
    pub client: Option<ClientInfo>,
}

/// Payload for `AccountDeactivationVerificationResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivationVerificationResponseData {
    /// Correlation id copied from the request.
    pub request_id: RequestId,
    /// Account the verification was for.
    pub account_id: AccountId,
    /// Verification outcome.
    pub outcome: ResponseOutcome,
    /// How the request was verified, on success.
    pub verification_method: Option<VerificationMethod>,
    /// Reason when the outcome is not successful.
    pub reason: Option<String>,
}

/// Payload for `AccountDeactivationConfirmed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivationConfirmedData {
    /// Account that was deactivated.
    pub account_id: AccountId,
    /// Who deactivated it.
    pub deactivated_by: InitiatorRole,
    /// Reason supplied with the original request.
    pub reason: Option<String>,
    /// Whether credential/token cleanup ran.
    pub auth_data_cleanup: bool,
    /// Number of sessions terminated during cleanup.
    pub session_termination_count: usize,
    /// When the deactivation was confirmed.
    pub deactivated_at: DateTime<Utc>,
}

/// Payload for `SessionTerminated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTerminatedData {
    /// The terminated session.
    pub session_id: SessionId,
    /// Account the session belonged to.
    pub account_id: AccountId,
    /// Why the session ended.
    pub termination_type: TerminationType,
    /// Active sessions remaining for the account after termination.
    pub remaining_active_sessions: usize,
}

/// Payload for `AllSessionsTerminated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllSessionsTerminatedData {
    /// Account whose sessions were terminated.
    pub account_id: AccountId,
    /// Why the sessions ended.
    pub termination_type: TerminationType,
    /// Number of sessions that were active and are now terminated.
    pub terminated_session_count: usize,
}

/// Payload for `UserLoggedOut`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLoggedOutData {
    /// Account that logged out.
    pub account_id: AccountId,
    /// Session that ended.
    pub session_id: SessionId,
    /// Kind of logout.
    pub logout_type: LogoutType,
    /// Optional reason (always set for forced logouts).
    pub logout_reason: Option<String>,
}

impl AuthEvent {
    /// Returns the event type name used as the bus topic.
    pub fn event_type(&self) -> &'static str {
        match self {
            AuthEvent::AccountIdGetterRequested(_) => "AccountIdGetterRequested",
            AuthEvent::AccountIdGetterResponse(_) => "AccountIdGetterResponse",
            AuthEvent::AccountStatusVerificationRequested(_) => {
                "AccountStatusVerificationRequested"
            }
            AuthEvent::AccountStatusVerificationResponse(_) => "AccountStatusVerificationResponse",
            AuthEvent::LoginCredentialVerification(_) => "LoginCredentialVerification",
            AuthEvent::LoginAttempt(_) => "LoginAttempt",
            AuthEvent::UserLoggedIn(_) => "UserLoggedIn",
            AuthEvent::AccountDeactivationVerificationRequested(_) => {
                "AccountDeactivationVerificationRequested"
            }
            AuthEvent::AccountDeactivationVerificationResponse(_) => {
                "AccountDeactivationVerificationResponse"
            }
            AuthEvent::AccountDeactivationConfirmed(_) => "AccountDeactivationConfirmed",
            AuthEvent::SessionTerminated(_) => "SessionTerminated",
            AuthEvent::AllSessionsTerminated(_) => "AllSessionsTerminated",
            AuthEvent::UserLoggedOut(_) => "UserLoggedOut",
        }
    }

    /// Returns the correlation id for request/response events, `None` for
    /// pure audit events.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            AuthEvent::AccountIdGetterRequested(d) => Some(d.request_id),
            AuthEvent::AccountIdGetterResponse(d) => Some(d.request_id),
            AuthEvent::AccountStatusVerificationRequested(d) => Some(d.request_id),
            AuthEvent::AccountStatusVerificationResponse(d) => Some(d.request_id),
            AuthEvent::AccountDeactivationVerificationRequested(d) => Some(d.request_id),
            AuthEvent::AccountDeactivationVerificationResponse(d) => Some(d.request_id),
            _ => None,
        }
    }

    /// Returns the id of the aggregate this event is about, used as the
    /// envelope's `aggregate_id`. Falls back to the username for the one
    /// event that precedes id resolution.
    pub fn aggregate_id(&self) -> String {
        match self {
            AuthEvent::AccountIdGetterRequested(d) => d.username.clone(),
            AuthEvent::AccountIdGetterResponse(d) => d
                .account_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| d.username.clone()),
            AuthEvent::AccountStatusVerificationRequested(d) => d.account_id.to_string(),
            AuthEvent::AccountStatusVerificationResponse(d) => d.account_id.to_string(),
            AuthEvent::LoginCredentialVerification(d) => d.account_id.to_string(),
            AuthEvent::LoginAttempt(d) => d
                .account_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| d.username.clone()),
            AuthEvent::UserLoggedIn(d) => d.account_id.to_string(),
            AuthEvent::AccountDeactivationVerificationRequested(d) => d.account_id.to_string(),
            AuthEvent::AccountDeactivationVerificationResponse(d) => d.account_id.to_string(),
            AuthEvent::AccountDeactivationConfirmed(d) => d.account_id.to_string(),
            AuthEvent::SessionTerminated(d) => d.account_id.to_string(),
            AuthEvent::AllSessionsTerminated(d) => d.account_id.to_string(),
            AuthEvent::UserLoggedOut(d) => d.account_id.to_string(),
        }
    }
}

// Convenience constructors
impl AuthEvent {
    /// Creates an `AccountIdGetterRequested` event.
    pub fn account_id_getter_requested(
        request_id: RequestId,
        username: impl Into<String>,
        client: Option<ClientInfo>,
    ) -> Self {
        AuthEvent::AccountIdGetterRequested(AccountIdGetterRequestedData {
            request_id,
            username: username.into(),
            client,
        })
    }

    /// Creates a successful `AccountIdGetterResponse` event.
    pub fn account_id_found(
        request_id: RequestId,
        username: impl Into<String>,
        account_id: AccountId,
    ) -> Self {
        AuthEvent::AccountIdGetterResponse(AccountIdGetterResponseData {
            request_id,
            username: username.into(),
            account_id: Some(account_id),
            outcome: ResponseOutcome::Success,
            reason: None,
        })
    }

    /// Creates a failed `AccountIdGetterResponse` event.
    pub fn account_id_not_found(request_id: RequestId, username: impl Into<String>) -> Self {
        AuthEvent::AccountIdGetterResponse(AccountIdGetterResponseData {
            request_id,
            username: username.into(),
            account_id: None,
            outcome: ResponseOutcome::Failed,
            reason: Some("unknown username".to_string()),
        })
    }

    /// Creates an `AccountStatusVerificationRequested` event.
    pub fn status_verification_requested(request_id: RequestId, account_id: AccountId) -> Self {
        AuthEvent::AccountStatusVerificationRequested(AccountStatusVerificationRequestedData {
            request_id,
            account_id,
        })
    }

    /// Creates an `AccountStatusVerificationResponse` for a known account.
    pub fn status_verified(
        request_id: RequestId,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Self {
        AuthEvent::AccountStatusVerificationResponse(AccountStatusVerificationResponseData {
            request_id,
            account_id,
            account_status: Some(status),
            is_login_allowed: status.is_login_allowed(),
            status_message: Some(status.status_message().to_string()),
            outcome: ResponseOutcome::Success,
        })
    }

    /// Creates an `AccountStatusVerificationResponse` for a missing account.
    pub fn status_account_missing(request_id: RequestId, account_id: AccountId) -> Self {
        AuthEvent::AccountStatusVerificationResponse(AccountStatusVerificationResponseData {
            request_id,
            account_id,
            account_status: None,
            is_login_allowed: false,
            status_message: Some("account not found".to_string()),
            outcome: ResponseOutcome::Failed,
        })
    }

    /// Creates a `LoginCredentialVerification` audit event.
    pub fn credential_verification(
        account_id: AccountId,
        credential_id: CredentialId,
        verification_result: VerificationResult,
        failure_reason: Option<String>,
    ) -> Self {
        AuthEvent::LoginCredentialVerification(LoginCredentialVerificationData {
            account_id,
            credential_id,
            verification_result,
            failure_reason,
        })
    }

    /// Creates a `LoginAttempt` audit event.
    pub fn login_attempt(
        username: impl Into<String>,
        account_id: Option<AccountId>,
        result: VerificationResult,
        failure_reason: Option<String>,
        client: Option<ClientInfo>,
    ) -> Self {
        AuthEvent::LoginAttempt(LoginAttemptData {
            username: username.into(),
            account_id,
            result,
            failure_reason,
            client,
        })
    }

    /// Creates a `UserLoggedIn` event stamped with the current time.
    pub fn user_logged_in(account_id: AccountId, session_id: SessionId) -> Self {
        AuthEvent::UserLoggedIn(UserLoggedInData {
            account_id,
            session_id,
            login_at: Utc::now(),
        })
    }

    /// Creates an `AccountDeactivationVerificationRequested` event.
    pub fn deactivation_verification_requested(
        request_id: RequestId,
        account_id: AccountId,
        requested_by: InitiatorRole,
        reason: Option<String>,
        client: Option<ClientInfo>,
    ) -> Self {
        AuthEvent::AccountDeactivationVerificationRequested(DeactivationVerificationRequestedData {
            request_id,
            account_id,
            requested_by,
            reason,
            client,
        })
    }

    /// Creates a successful `AccountDeactivationVerificationResponse`.
    pub fn deactivation_verified(
        request_id: RequestId,
        account_id: AccountId,
        method: VerificationMethod,
    ) -> Self {
        AuthEvent::AccountDeactivationVerificationResponse(DeactivationVerificationResponseData {
            request_id,
            account_id,
            outcome: ResponseOutcome::Success,
            verification_method: Some(method),
            reason: None,
        })
    }

    /// Creates a non-success `AccountDeactivationVerificationResponse`.
    pub fn deactivation_rejected(
        request_id: RequestId,
        account_id: AccountId,
        outcome: ResponseOutcome,
        reason: impl Into<String>,
    ) -> Self {
        AuthEvent::AccountDeactivationVerificationResponse(DeactivationVerificationResponseData {
            request_id,
            account_id,
            outcome,
            verification_method: None,
            reason: Some(reason.into()),
        })
    }

    /// Creates an `AccountDeactivationConfirmed` event stamped with the
    /// current time.
    pub fn deactivation_confirmed(
        account_id: AccountId,
        deactivated_by: InitiatorRole,
        reason: Option<String>,
        auth_data_cleanup: bool,
        session_termination_count: usize,
    ) -> Self {
        AuthEvent::AccountDeactivationConfirmed(DeactivationConfirmedData {
            account_id,
            deactivated_by,
            reason,
            auth_data_cleanup,
            session_termination_count,
            deactivated_at: Utc::now(),
        })
    }

    /// Creates a `SessionTerminated` event.
    pub fn session_terminated(
        session_id: SessionId,
        account_id: AccountId,
        termination_type: TerminationType,
        remaining_active_sessions: usize,
    ) -> Self {
        AuthEvent::SessionTerminated(SessionTerminatedData {
            session_id,
            account_id,
            termination_type,
            remaining_active_sessions,
        })
    }

    /// Creates an `AllSessionsTerminated` event.
    pub fn all_sessions_terminated(
        account_id: AccountId,
        termination_type: TerminationType,
        terminated_session_count: usize,
    ) -> Self {
        AuthEvent::AllSessionsTerminated(AllSessionsTerminatedData {
            account_id,
            termination_type,
            terminated_session_count,
        })
    }

    /// Creates a `UserLoggedOut` event.
    pub fn user_logged_out(
        account_id: AccountId,
        session_id: SessionId,
        logout_type: LogoutType,
        logout_reason: Option<String>,
    ) -> Self {
        AuthEvent::UserLoggedOut(UserLoggedOutData {
            account_id,
            session_id,
            logout_type,
            logout_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names() {
        let rid = RequestId::new();
        let aid = AccountId::new();

        assert_eq!(
            AuthEvent::account_id_getter_requested(rid, "alice", None).event_type(),
            "AccountIdGetterRequested"
        );
        assert_eq!(
            AuthEvent::account_id_found(rid, "alice", aid).event_type(),
            "AccountIdGetterResponse"
        );
        assert_eq!(
            AuthEvent::status_verification_requested(rid, aid).event_type(),
            "AccountStatusVerificationRequested"
        );
        assert_eq!(
            AuthEvent::status_verified(rid, aid, AccountStatus::Active).event_type(),
            "AccountStatusVerificationResponse"
        );
        assert_eq!(
            AuthEvent::user_logged_in(aid, SessionId::new()).event_type(),
            "UserLoggedIn"
        );
        assert_eq!(
            AuthEvent::deactivation_confirmed(aid, InitiatorRole::Admin, None, true, 2)
                .event_type(),
            "AccountDeactivationConfirmed"
        );
    }

    #[test]
    fn request_id_present_only_on_correlated_events() {
        let rid = RequestId::new();
        let aid = AccountId::new();

        assert_eq!(
            AuthEvent::status_verification_requested(rid, aid).request_id(),
            Some(rid)
        );
        assert_eq!(
            AuthEvent::user_logged_in(aid, SessionId::new()).request_id(),
            None
        );
        assert_eq!(
            AuthEvent::login_attempt("alice", None, VerificationResult::Failed, None, None)
                .request_id(),
            None
        );
    }

    #[test]
    fn serialization_roundtrip() {
        let rid = RequestId::new();
        let aid = AccountId::new();
        let sid = SessionId::new();

        let events = vec![
            AuthEvent::account_id_getter_requested(rid, "alice", Some(ClientInfo::default())),
            AuthEvent::account_id_not_found(rid, "alice"),
            AuthEvent::status_verified(rid, aid, AccountStatus::Suspended),
            AuthEvent::credential_verification(
                aid,
                CredentialId::new(),
                VerificationResult::Failed,
                Some("invalid password".to_string()),
            ),
            AuthEvent::deactivation_verification_requested(
                rid,
                aid,
                InitiatorRole::User,
                Some("leaving".to_string()),
                None,
            ),
            AuthEvent::deactivation_rejected(rid, aid, ResponseOutcome::Cancelled, "declined"),
            AuthEvent::session_terminated(sid, aid, TerminationType::Logout, 1),
            AuthEvent::user_logged_out(aid, sid, LogoutType::Forced, Some("admin".to_string())),
        ];

        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: AuthEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(event.event_type(), back.event_type());
        }
    }

    #[test]
    fn status_verified_derives_login_allowed() {
        let rid = RequestId::new();
        let aid = AccountId::new();

        if let AuthEvent::AccountStatusVerificationResponse(data) =
            AuthEvent::status_verified(rid, aid, AccountStatus::Locked)
        {
            assert!(!data.is_login_allowed);
            assert_eq!(data.account_status, Some(AccountStatus::Locked));
            assert_eq!(data.outcome, ResponseOutcome::Success);
        } else {
            panic!("expected AccountStatusVerificationResponse");
        }
    }
}
