//! The login saga.
//!
//! Two correlated round trips to the Account context (id lookup, status
//! verification), then local credential verification and session/token
//! issuance. Audit events for one attempt are always published in the order
//! status-check, credential-check, outcome.

use std::sync::Arc;
use std::time::Duration;

use bus::{EventBus, codec};
use chrono::Utc;
use common::types::{AccountStatus, ClientInfo, VerificationResult};
use common::{AccountId, AuthEvent, RequestId, SessionId};
use correlation::{CorrelationRegistry, Outcome};
use futures_util::FutureExt;

use crate::context::AuthContext;
use crate::credential::PasswordHasher;
use crate::repository::CredentialRepository;
use crate::session::{Session, SessionRepository};
use crate::token::{AccessToken, TokenIssuer};

/// Deadline for the username-to-id lookup round trip.
pub const DEFAULT_LOOKUP_DEADLINE: Duration = Duration::from_secs(10);

/// Deadline for the account-status verification round trip.
pub const DEFAULT_STATUS_DEADLINE: Duration = Duration::from_secs(10);

/// Why a login attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    /// Unknown username or missing credential.
    AccountNotFound,
    /// Wrong password.
    InvalidCredentials,
    /// Account or credential is locked.
    AccountLocked,
    /// Account status forbids login (suspended, pending, deactivated).
    AccountInactive,
    /// A correlated round trip hit its deadline.
    Timeout,
    /// Unexpected orchestration failure.
    SystemError,
}

/// Terminal result of a login attempt.
///
/// Always carries a success flag and a human-readable message; the caller
/// is never left without an answer, even on timeout.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub success: bool,
    pub message: String,
    pub account_id: Option<AccountId>,
    pub session_id: Option<SessionId>,
    pub token: Option<AccessToken>,
    pub failure: Option<LoginFailure>,
}

impl LoginResult {
    fn logged_in(account_id: AccountId, session_id: SessionId, token: AccessToken) -> Self {
        Self {
            success: true,
            message: "login successful".to_string(),
            account_id: Some(account_id),
            session_id: Some(session_id),
            token: Some(token),
            failure: None,
        }
    }

    fn failed(
        failure: LoginFailure,
        message: impl Into<String>,
        account_id: Option<AccountId>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            account_id,
            session_id: None,
            token: None,
            failure: Some(failure),
        }
    }
}

/// Orchestrates login attempts.
pub struct LoginSaga<B, C, S, T, H>
where
    B: EventBus + Clone + 'static,
    C: CredentialRepository + Clone,
    S: SessionRepository + Clone,
    T: TokenIssuer + Clone,
    H: PasswordHasher + Clone,
{
    bus: B,
    ctx: AuthContext<C, S, T, H>,
    registry: CorrelationRegistry<AuthEvent>,
    lookup_deadline: Duration,
    status_deadline: Duration,
}

impl<B, C, S, T, H> LoginSaga<B, C, S, T, H>
where
    B: EventBus + Clone + 'static,
    C: CredentialRepository + Clone,
    S: SessionRepository + Clone,
    T: TokenIssuer + Clone,
    H: PasswordHasher + Clone,
{
    /// Creates a new login saga with the default deadlines.
    pub fn new(
        bus: B,
        ctx: AuthContext<C, S, T, H>,
        registry: CorrelationRegistry<AuthEvent>,
    ) -> Self {
        Self {
            bus,
            ctx,
            registry,
            lookup_deadline: DEFAULT_LOOKUP_DEADLINE,
            status_deadline: DEFAULT_STATUS_DEADLINE,
        }
    }

    /// Overrides both round-trip deadlines (tests).
    pub fn with_deadlines(mut self, lookup: Duration, status: Duration) -> Self {
        self.lookup_deadline = lookup;
        self.status_deadline = status;
        self
    }

    /// Subscribes the response resolvers on the bus. Call once at startup.
    pub async fn attach(&self) {
        for topic in ["AccountIdGetterResponse", "AccountStatusVerificationResponse"] {
            let registry = self.registry.clone();
            self.bus
                .subscribe(
                    topic,
                    Arc::new(move |envelope| {
                        let registry = registry.clone();
                        async move {
                            let event = codec::decode(&envelope)?;
                            if let Some(request_id) = event.request_id() {
                                registry.resolve(request_id, event);
                            }
                            Ok(())
                        }
                        .boxed()
                    }),
                )
                .await;
        }
    }

    /// Runs one login attempt to a terminal result.
    #[tracing::instrument(skip(self, password, client), fields(username = %username))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client: Option<ClientInfo>,
    ) -> LoginResult {
        metrics::counter!("login_attempts_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.run(username, password, client).await;

        metrics::histogram!("login_duration_seconds").record(started.elapsed().as_secs_f64());
        if result.success {
            metrics::counter!("login_success").increment(1);
        } else {
            metrics::counter!("login_failures").increment(1);
        }
        result
    }

    async fn run(&self, username: &str, password: &str, client: Option<ClientInfo>) -> LoginResult {
        // 1. Resolve the account id from the username (correlated).
        let request_id = RequestId::new();
        let waiter = self.registry.register(request_id, self.lookup_deadline);
        let request = AuthEvent::account_id_getter_requested(request_id, username, client.clone());
        if let Err(e) = self.publish(&request).await {
            tracing::error!(error = %e, "failed to publish id lookup request");
            return LoginResult::failed(LoginFailure::SystemError, "login failed", None);
        }

        let account_id = match waiter.wait().await {
            Outcome::Reply(AuthEvent::AccountIdGetterResponse(data)) => match data.account_id {
                Some(account_id) => account_id,
                None => {
                    self.audit_failure(username, None, "unknown username", &client)
                        .await;
                    return LoginResult::failed(
                        LoginFailure::AccountNotFound,
                        "invalid username or password",
                        None,
                    );
                }
            },
            Outcome::Reply(other) => {
                tracing::error!(
                    event_type = other.event_type(),
                    "unexpected reply to id lookup"
                );
                return LoginResult::failed(LoginFailure::SystemError, "login failed", None);
            }
            Outcome::TimedOut => {
                tracing::warn!(%username, "account id lookup timed out");
                self.audit_failure(username, None, "account lookup timed out", &client)
                    .await;
                return LoginResult::failed(LoginFailure::Timeout, "login timed out", None);
            }
        };

        // 2. Load the credential. Local to this context, not a saga step.
        let mut credential = match self.ctx.credentials.find_by_account_id(account_id).await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                self.audit_failure(
                    username,
                    Some(account_id),
                    "no credential for account",
                    &client,
                )
                .await;
                return LoginResult::failed(
                    LoginFailure::AccountNotFound,
                    "invalid username or password",
                    Some(account_id),
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "credential lookup failed");
                return LoginResult::failed(
                    LoginFailure::SystemError,
                    "login failed",
                    Some(account_id),
                );
            }
        };

        // 3. Verify the account status (correlated). A disallowed status
        // returns before any password comparison.
        let request_id = RequestId::new();
        let waiter = self.registry.register(request_id, self.status_deadline);
        let request = AuthEvent::status_verification_requested(request_id, account_id);
        if let Err(e) = self.publish(&request).await {
            tracing::error!(error = %e, "failed to publish status verification request");
            return LoginResult::failed(
                LoginFailure::SystemError,
                "login failed",
                Some(account_id),
            );
        }

        match waiter.wait().await {
            Outcome::Reply(AuthEvent::AccountStatusVerificationResponse(data)) => {
                if !data.is_login_allowed {
                    let (failure, message) = match data.account_status {
                        Some(AccountStatus::Locked) => {
                            (LoginFailure::AccountLocked, "account is locked")
                        }
                        Some(_) => (LoginFailure::AccountInactive, "account is not active"),
                        None => (LoginFailure::AccountNotFound, "invalid username or password"),
                    };
                    let reason = data
                        .status_message
                        .unwrap_or_else(|| "login not allowed".to_string());
                    self.audit_failure(username, Some(account_id), &reason, &client)
                        .await;
                    return LoginResult::failed(failure, message, Some(account_id));
                }
            }
            Outcome::Reply(other) => {
                tracing::error!(
                    event_type = other.event_type(),
                    "unexpected reply to status verification"
                );
                return LoginResult::failed(
                    LoginFailure::SystemError,
                    "login failed",
                    Some(account_id),
                );
            }
            Outcome::TimedOut => {
                tracing::warn!(%account_id, "status verification timed out");
                self.audit_failure(
                    username,
                    Some(account_id),
                    "status verification timed out",
                    &client,
                )
                .await;
                return LoginResult::failed(
                    LoginFailure::Timeout,
                    "login timed out",
                    Some(account_id),
                );
            }
        }

        // 4. Verify the password locally. A locked credential refuses the
        // attempt without comparing passwords.
        let now = Utc::now();
        if credential.is_locked(now) {
            self.publish_best_effort(&AuthEvent::credential_verification(
                account_id,
                credential.id(),
                VerificationResult::Failed,
                Some("credential locked".to_string()),
            ))
            .await;
            self.audit_failure(username, Some(account_id), "credential locked", &client)
                .await;
            return LoginResult::failed(
                LoginFailure::AccountLocked,
                "account is locked",
                Some(account_id),
            );
        }

        if !self
            .ctx
            .hasher
            .verify(password, credential.password_hash())
        {
            self.publish_best_effort(&AuthEvent::credential_verification(
                account_id,
                credential.id(),
                VerificationResult::Failed,
                Some("invalid password".to_string()),
            ))
            .await;
            self.audit_failure(username, Some(account_id), "invalid password", &client)
                .await;

            // The increment may itself trip the lockout.
            if credential.record_failed_attempt(now) {
                metrics::counter!("credentials_locked").increment(1);
                tracing::warn!(%account_id, "credential locked after repeated failures");
            }
            if let Err(e) = self.ctx.credentials.save(credential).await {
                tracing::error!(error = %e, "failed to persist failed-attempt counter");
            }

            return LoginResult::failed(
                LoginFailure::InvalidCredentials,
                "invalid username or password",
                Some(account_id),
            );
        }

        // 5. Success: session, token, audit trail.
        credential.reset_failed_attempts();
        let credential_id = credential.id();
        if let Err(e) = self.ctx.credentials.save(credential).await {
            tracing::error!(error = %e, "failed to persist credential reset");
        }

        self.publish_best_effort(&AuthEvent::credential_verification(
            account_id,
            credential_id,
            VerificationResult::Success,
            None,
        ))
        .await;

        let session = Session::new(account_id, client.clone());
        let session_id = session.id();
        if let Err(e) = self.ctx.sessions.save(session).await {
            tracing::error!(error = %e, "failed to persist session");
            return LoginResult::failed(
                LoginFailure::SystemError,
                "login failed",
                Some(account_id),
            );
        }
        self.ctx.current.set(account_id, session_id);

        let token = match self.ctx.tokens.issue(account_id, session_id).await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(error = %e, "token issuance failed");
                return LoginResult::failed(
                    LoginFailure::SystemError,
                    "login failed",
                    Some(account_id),
                );
            }
        };

        self.publish_best_effort(&AuthEvent::user_logged_in(account_id, session_id))
            .await;
        self.publish_best_effort(&AuthEvent::login_attempt(
            username,
            Some(account_id),
            VerificationResult::Success,
            None,
            client,
        ))
        .await;

        tracing::info!(%account_id, %session_id, "user logged in");
        LoginResult::logged_in(account_id, session_id, token)
    }

    async fn publish(&self, event: &AuthEvent) -> bus::Result<()> {
        self.bus.publish(codec::encode(event)?).await
    }

    /// Publishes an audit event; failures are logged, never returned, so a
    /// flaky audit trail cannot change a login outcome.
    async fn publish_best_effort(&self, event: &AuthEvent) {
        if let Err(e) = self.publish(event).await {
            tracing::error!(event_type = event.event_type(), error = %e, "audit publish failed");
        }
    }

    async fn audit_failure(
        &self,
        username: &str,
        account_id: Option<AccountId>,
        reason: &str,
        client: &Option<ClientInfo>,
    ) {
        self.publish_best_effort(&AuthEvent::login_attempt(
            username,
            account_id,
            VerificationResult::Failed,
            Some(reason.to_string()),
            client.clone(),
        ))
        .await;
    }
}
