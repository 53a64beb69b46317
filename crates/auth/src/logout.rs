//! The logout saga.
//!
//! Entirely local to the Authentication context: no correlated round trip,
//! no deadline. Shares the event-sequencing and terminal-result discipline
//! of the other sagas.

use bus::{EventBus, codec};
use chrono::Utc;
use common::types::{ClientInfo, LogoutType, TerminationType};
use common::{AccountId, AuthEvent, SessionId};

use crate::session::{CurrentSessionCache, SessionRepository};

/// Why a logout request did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutFailure {
    /// Session does not exist.
    SessionNotFound,
    /// Session exists but was already terminated.
    AlreadyLoggedOut,
    /// Unexpected orchestration failure.
    SystemError,
}

/// Terminal result of a logout request.
#[derive(Debug, Clone)]
pub struct LogoutResult {
    pub success: bool,
    pub message: String,
    /// How many sessions were terminated by this call.
    pub terminated_sessions: usize,
    pub failure: Option<LogoutFailure>,
}

impl LogoutResult {
    fn done(terminated_sessions: usize, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            terminated_sessions,
            failure: None,
        }
    }

    fn failed(failure: LogoutFailure, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            terminated_sessions: 0,
            failure: Some(failure),
        }
    }
}

/// Orchestrates session termination.
pub struct LogoutSaga<B, S>
where
    B: EventBus + Clone + 'static,
    S: SessionRepository + Clone,
{
    bus: B,
    sessions: S,
    current: CurrentSessionCache,
}

impl<B, S> LogoutSaga<B, S>
where
    B: EventBus + Clone + 'static,
    S: SessionRepository + Clone,
{
    /// Creates a new logout saga.
    pub fn new(bus: B, sessions: S, current: CurrentSessionCache) -> Self {
        Self {
            bus,
            sessions,
            current,
        }
    }

    /// Terminates one session.
    #[tracing::instrument(skip(self))]
    pub async fn logout_session(
        &self,
        session_id: SessionId,
        logout_type: LogoutType,
        reason: Option<String>,
    ) -> LogoutResult {
        metrics::counter!("logout_requests_total").increment(1);

        let session = match self.sessions.find_by_id(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                return LogoutResult::failed(LogoutFailure::SessionNotFound, "session not found");
            }
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed");
                return LogoutResult::failed(LogoutFailure::SystemError, "logout failed");
            }
        };

        if !session.is_active(Utc::now()) {
            return LogoutResult::failed(
                LogoutFailure::AlreadyLoggedOut,
                "session already terminated",
            );
        }

        let account_id = session.account_id();
        if let Err(e) = self.sessions.delete(session_id).await {
            tracing::error!(error = %e, "session delete failed");
            return LogoutResult::failed(LogoutFailure::SystemError, "logout failed");
        }
        self.current.clear_if_current(account_id, session_id);

        let remaining = self
            .sessions
            .count_active(account_id)
            .await
            .unwrap_or_default();

        self.publish_best_effort(&AuthEvent::session_terminated(
            session_id,
            account_id,
            termination_type_for(logout_type),
            remaining,
        ))
        .await;
        self.publish_best_effort(&AuthEvent::user_logged_out(
            account_id,
            session_id,
            logout_type,
            reason,
        ))
        .await;

        tracing::info!(%account_id, %session_id, remaining, "session terminated");
        LogoutResult::done(1, "logged out")
    }

    /// Terminates every active session for an account.
    ///
    /// Publishes one `AllSessionsTerminated` event plus one `UserLoggedOut`
    /// per session that was active, and returns the count.
    #[tracing::instrument(skip(self))]
    pub async fn logout_all_sessions(
        &self,
        account_id: AccountId,
        logout_type: LogoutType,
        reason: Option<String>,
    ) -> LogoutResult {
        metrics::counter!("logout_requests_total").increment(1);

        let sessions = match self.sessions.find_by_account_id(account_id).await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed");
                return LogoutResult::failed(LogoutFailure::SystemError, "logout failed");
            }
        };
        let now = Utc::now();
        let active: Vec<SessionId> = sessions
            .iter()
            .filter(|s| s.is_active(now))
            .map(|s| s.id())
            .collect();

        if let Err(e) = self.sessions.delete_by_account_id(account_id).await {
            tracing::error!(error = %e, "bulk session delete failed");
            return LogoutResult::failed(LogoutFailure::SystemError, "logout failed");
        }
        self.current.clear(account_id);

        let termination_type = termination_type_for(logout_type);
        self.publish_best_effort(&AuthEvent::all_sessions_terminated(
            account_id,
            termination_type,
            active.len(),
        ))
        .await;
        for session_id in &active {
            self.publish_best_effort(&AuthEvent::user_logged_out(
                account_id,
                *session_id,
                logout_type,
                reason.clone(),
            ))
            .await;
        }

        metrics::counter!("sessions_terminated").increment(active.len() as u64);
        tracing::info!(%account_id, terminated = active.len(), "all sessions terminated");
        LogoutResult::done(
            active.len(),
            format!("terminated {} session(s)", active.len()),
        )
    }

    /// Administrative logout of every session for an account.
    ///
    /// Sugar over [`Self::logout_all_sessions`] with a `Forced` logout type
    /// and an annotated reason.
    #[tracing::instrument(skip(self, admin))]
    pub async fn force_logout(
        &self,
        account_id: AccountId,
        reason: &str,
        admin: Option<ClientInfo>,
    ) -> LogoutResult {
        let mut annotated = format!("forced logout: {reason}");
        if let Some(device) = admin.as_ref().and_then(|a| a.device_id.as_deref()) {
            annotated.push_str(&format!(" (by {device})"));
        }
        self.logout_all_sessions(account_id, LogoutType::Forced, Some(annotated))
            .await
    }

    async fn publish_best_effort(&self, event: &AuthEvent) {
        match codec::encode(event) {
            Ok(envelope) => {
                if let Err(e) = self.bus.publish(envelope).await {
                    tracing::error!(event_type = event.event_type(), error = %e, "publish failed");
                }
            }
            Err(e) => {
                tracing::error!(event_type = event.event_type(), error = %e, "encode failed");
            }
        }
    }
}

fn termination_type_for(logout_type: LogoutType) -> TerminationType {
    match logout_type {
        LogoutType::Manual => TerminationType::Logout,
        LogoutType::Forced => TerminationType::ForcedLogout,
        LogoutType::Expired => TerminationType::Expiry,
    }
}
