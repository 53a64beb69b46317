//! Verifying side of the account deactivation saga.
//!
//! Listens for verification requests from the Account context. User-initiated
//! requests go through the interactive boundary (password re-entry or
//! cancellation); admin/system requests skip it — the override is itself a
//! successful verification method. Confirmation (credential deletion, session
//! termination, token revocation) runs at most once per account and only on a
//! successful verification.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bus::{EventBus, codec};
use common::events::DeactivationVerificationRequestedData;
use common::types::{InitiatorRole, ResponseOutcome, VerificationMethod};
use common::{AccountId, AuthEvent, RequestId};
use futures_util::FutureExt;

use crate::context::AuthContext;
use crate::credential::PasswordHasher;
use crate::error::AuthError;
use crate::repository::CredentialRepository;
use crate::session::SessionRepository;
use crate::token::TokenIssuer;

/// What the user supplied at the interactive boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationReply {
    /// Password re-entry.
    Password(String),
    /// MFA code.
    Mfa(String),
    /// The user declined.
    Cancelled,
}

/// Interactive confirmation surface (external collaborator).
///
/// Forwards a verification prompt to the user and returns their reply,
/// keyed by the originating request id.
#[async_trait]
pub trait VerificationPrompt: Send + Sync {
    /// Prompts the user and waits for their reply.
    async fn request_verification(
        &self,
        account_id: AccountId,
        request_id: RequestId,
    ) -> Result<VerificationReply, AuthError>;
}

#[derive(Debug, Default)]
struct InMemoryPromptState {
    reply: Option<VerificationReply>,
    prompts: Vec<(AccountId, RequestId)>,
}

/// Scripted interactive surface for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVerificationPrompt {
    state: Arc<RwLock<InMemoryPromptState>>,
}

impl InMemoryVerificationPrompt {
    /// Creates a prompt that answers `Cancelled` until scripted otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the reply for subsequent prompts.
    pub fn set_reply(&self, reply: VerificationReply) {
        self.state.write().unwrap().reply = Some(reply);
    }

    /// Returns how many prompts were shown.
    pub fn prompt_count(&self) -> usize {
        self.state.read().unwrap().prompts.len()
    }
}

#[async_trait]
impl VerificationPrompt for InMemoryVerificationPrompt {
    async fn request_verification(
        &self,
        account_id: AccountId,
        request_id: RequestId,
    ) -> Result<VerificationReply, AuthError> {
        let mut state = self.state.write().unwrap();
        state.prompts.push((account_id, request_id));
        Ok(state.reply.clone().unwrap_or(VerificationReply::Cancelled))
    }
}

/// Handles deactivation verification requests in the Authentication context.
pub struct DeactivationVerifier<B, C, S, T, H, V>
where
    B: EventBus + Clone + 'static,
    C: CredentialRepository + Clone,
    S: SessionRepository + Clone,
    T: TokenIssuer + Clone,
    H: PasswordHasher + Clone,
    V: VerificationPrompt + Clone,
{
    bus: B,
    ctx: AuthContext<C, S, T, H>,
    prompt: V,
    /// Accounts this verifier has already confirmed; a second request for
    /// one of them is answered `Failed`, never confirmed twice.
    confirmed: Arc<RwLock<HashSet<AccountId>>>,
}

impl<B, C, S, T, H, V> Clone for DeactivationVerifier<B, C, S, T, H, V>
where
    B: EventBus + Clone + 'static,
    C: CredentialRepository + Clone,
    S: SessionRepository + Clone,
    T: TokenIssuer + Clone,
    H: PasswordHasher + Clone,
    V: VerificationPrompt + Clone,
{
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            ctx: self.ctx.clone(),
            prompt: self.prompt.clone(),
            confirmed: self.confirmed.clone(),
        }
    }
}

impl<B, C, S, T, H, V> DeactivationVerifier<B, C, S, T, H, V>
where
    B: EventBus + Clone + 'static,
    C: CredentialRepository + Clone + 'static,
    S: SessionRepository + Clone + 'static,
    T: TokenIssuer + Clone + 'static,
    H: PasswordHasher + Clone + 'static,
    V: VerificationPrompt + Clone + 'static,
{
    /// Creates a new verifier.
    pub fn new(bus: B, ctx: AuthContext<C, S, T, H>, prompt: V) -> Self {
        Self {
            bus,
            ctx,
            prompt,
            confirmed: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Subscribes the verification handler on the bus. Call once at startup.
    pub async fn attach(&self) {
        let verifier = self.clone();
        self.bus
            .subscribe(
                "AccountDeactivationVerificationRequested",
                Arc::new(move |envelope| {
                    let verifier = verifier.clone();
                    async move {
                        let AuthEvent::AccountDeactivationVerificationRequested(data) =
                            codec::decode(&envelope)?
                        else {
                            return Ok(());
                        };
                        verifier.handle_request(data).await
                    }
                    .boxed()
                }),
            )
            .await;
    }

    #[tracing::instrument(skip(self, data), fields(account_id = %data.account_id, requested_by = %data.requested_by))]
    async fn handle_request(&self, data: DeactivationVerificationRequestedData) -> bus::Result<()> {
        metrics::counter!("deactivation_verifications_total").increment(1);
        let account_id = data.account_id;
        let request_id = data.request_id;

        // A request for an account this verifier already confirmed must not
        // confirm twice; answer with an explicit failure instead.
        if self.confirmed.read().unwrap().contains(&account_id) {
            return self
                .respond(AuthEvent::deactivation_rejected(
                    request_id,
                    account_id,
                    ResponseOutcome::Failed,
                    "account already deactivated",
                ))
                .await;
        }

        let credential = match self.ctx.credentials.find_by_account_id(account_id).await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                return self
                    .respond(AuthEvent::deactivation_rejected(
                        request_id,
                        account_id,
                        ResponseOutcome::Failed,
                        "no credential",
                    ))
                    .await;
            }
            Err(e) => {
                tracing::error!(error = %e, "credential lookup failed");
                return self
                    .respond(AuthEvent::deactivation_rejected(
                        request_id,
                        account_id,
                        ResponseOutcome::Failed,
                        "internal error",
                    ))
                    .await;
            }
        };

        // Admin/system overrides skip the interactive step entirely.
        let method = match data.requested_by {
            InitiatorRole::Admin => VerificationMethod::AdminOverride,
            InitiatorRole::System => VerificationMethod::SystemOverride,
            InitiatorRole::User => {
                match self.prompt.request_verification(account_id, request_id).await {
                    Ok(VerificationReply::Cancelled) => {
                        return self
                            .respond(AuthEvent::deactivation_rejected(
                                request_id,
                                account_id,
                                ResponseOutcome::Cancelled,
                                "verification cancelled by user",
                            ))
                            .await;
                    }
                    Ok(VerificationReply::Password(password)) => {
                        if !self.ctx.hasher.verify(&password, credential.password_hash()) {
                            return self
                                .respond(AuthEvent::deactivation_rejected(
                                    request_id,
                                    account_id,
                                    ResponseOutcome::Failed,
                                    "invalid password",
                                ))
                                .await;
                        }
                        VerificationMethod::Password
                    }
                    Ok(VerificationReply::Mfa(_)) => {
                        return self
                            .respond(AuthEvent::deactivation_rejected(
                                request_id,
                                account_id,
                                ResponseOutcome::Failed,
                                "unsupported verification method",
                            ))
                            .await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "verification prompt failed");
                        return self
                            .respond(AuthEvent::deactivation_rejected(
                                request_id,
                                account_id,
                                ResponseOutcome::Failed,
                                "verification prompt failed",
                            ))
                            .await;
                    }
                }
            }
        };

        // Verification succeeded: answer the requester, then run the
        // one-time confirmation cleanup.
        self.respond(AuthEvent::deactivation_verified(
            request_id, account_id, method,
        ))
        .await?;

        self.confirm(account_id, data.requested_by, data.reason).await
    }

    /// Deletes auth-side data for the account and publishes the terminal
    /// confirmation event. Runs at most once per account.
    async fn confirm(
        &self,
        account_id: AccountId,
        deactivated_by: InitiatorRole,
        reason: Option<String>,
    ) -> bus::Result<()> {
        // Claim the account before any cleanup so a concurrent request
        // cannot confirm alongside this one.
        if !self.confirmed.write().unwrap().insert(account_id) {
            tracing::warn!(%account_id, "duplicate confirmation suppressed");
            return Ok(());
        }

        let cleanup = match self.ctx.credentials.delete(account_id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!(error = %e, "credential deletion failed");
                false
            }
        };

        let terminated = match self.ctx.sessions.delete_by_account_id(account_id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "session termination failed");
                0
            }
        };
        self.ctx.current.clear(account_id);

        match self.ctx.tokens.revoke_for_account(account_id).await {
            Ok(revoked) => {
                tracing::debug!(%account_id, revoked, "tokens revoked");
            }
            Err(e) => tracing::error!(error = %e, "token revocation failed"),
        }

        metrics::counter!("deactivations_confirmed").increment(1);
        tracing::info!(
            %account_id,
            %deactivated_by,
            sessions_terminated = terminated,
            "account deactivation confirmed"
        );

        self.respond(AuthEvent::deactivation_confirmed(
            account_id,
            deactivated_by,
            reason,
            cleanup,
            terminated,
        ))
        .await
    }

    async fn respond(&self, event: AuthEvent) -> bus::Result<()> {
        self.bus.publish(codec::encode(&event)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{AuthCredential, PlaintextHasher};
    use crate::repository::InMemoryCredentialRepository;
    use crate::session::{InMemorySessionRepository, Session};
    use crate::token::InMemoryTokenIssuer;
    use bus::InMemoryEventBus;

    struct Fixture {
        bus: InMemoryEventBus,
        credentials: InMemoryCredentialRepository,
        sessions: InMemorySessionRepository,
        tokens: InMemoryTokenIssuer,
        prompt: InMemoryVerificationPrompt,
        account_id: AccountId,
    }

    async fn setup(with_credential: bool) -> Fixture {
        let bus = InMemoryEventBus::new();
        let credentials = InMemoryCredentialRepository::new();
        let sessions = InMemorySessionRepository::new();
        let tokens = InMemoryTokenIssuer::new();
        let prompt = InMemoryVerificationPrompt::new();
        let ctx = AuthContext::new(
            credentials.clone(),
            sessions.clone(),
            tokens.clone(),
            PlaintextHasher,
        );
        let verifier = DeactivationVerifier::new(bus.clone(), ctx, prompt.clone());
        verifier.attach().await;

        let account_id = AccountId::new();
        if with_credential {
            credentials
                .save(AuthCredential::new(account_id, "secret"))
                .await
                .unwrap();
        }

        Fixture {
            bus,
            credentials,
            sessions,
            tokens,
            prompt,
            account_id,
        }
    }

    async fn send_request(f: &Fixture, requested_by: InitiatorRole) {
        let request = AuthEvent::deactivation_verification_requested(
            RequestId::new(),
            f.account_id,
            requested_by,
            Some("test".to_string()),
            None,
        );
        f.bus
            .publish(codec::encode(&request).unwrap())
            .await
            .unwrap();
    }

    async fn last_response(f: &Fixture) -> AuthEvent {
        let published = f.bus.published().await;
        let envelope = published
            .iter()
            .rev()
            .find(|e| e.event_type == "AccountDeactivationVerificationResponse")
            .expect("no verification response");
        codec::decode(envelope).unwrap()
    }

    #[tokio::test]
    async fn admin_override_skips_interactive_verification() {
        let f = setup(true).await;
        f.sessions
            .save(Session::new(f.account_id, None))
            .await
            .unwrap();

        send_request(&f, InitiatorRole::Admin).await;

        // No prompt was shown.
        assert_eq!(f.prompt.prompt_count(), 0);

        let AuthEvent::AccountDeactivationVerificationResponse(response) = last_response(&f).await
        else {
            unreachable!();
        };
        assert_eq!(response.outcome, ResponseOutcome::Success);
        assert_eq!(
            response.verification_method,
            Some(VerificationMethod::AdminOverride)
        );

        // Confirmation ran: credential gone, sessions gone, event published.
        assert_eq!(f.credentials.credential_count(), 0);
        assert_eq!(f.sessions.session_count(), 0);
        assert_eq!(f.bus.published_count("AccountDeactivationConfirmed").await, 1);

        let published = f.bus.published().await;
        let confirmed = published
            .iter()
            .find(|e| e.event_type == "AccountDeactivationConfirmed")
            .unwrap();
        let AuthEvent::AccountDeactivationConfirmed(data) = codec::decode(confirmed).unwrap()
        else {
            unreachable!();
        };
        assert_eq!(data.deactivated_by, InitiatorRole::Admin);
        assert!(data.auth_data_cleanup);
        assert_eq!(data.session_termination_count, 1);
    }

    #[tokio::test]
    async fn user_with_correct_password_confirms() {
        let f = setup(true).await;
        f.prompt
            .set_reply(VerificationReply::Password("secret".to_string()));

        send_request(&f, InitiatorRole::User).await;

        assert_eq!(f.prompt.prompt_count(), 1);
        let AuthEvent::AccountDeactivationVerificationResponse(response) = last_response(&f).await
        else {
            unreachable!();
        };
        assert_eq!(response.outcome, ResponseOutcome::Success);
        assert_eq!(
            response.verification_method,
            Some(VerificationMethod::Password)
        );
        assert_eq!(f.bus.published_count("AccountDeactivationConfirmed").await, 1);
    }

    #[tokio::test]
    async fn user_with_wrong_password_is_rejected() {
        let f = setup(true).await;
        f.prompt
            .set_reply(VerificationReply::Password("wrong".to_string()));

        send_request(&f, InitiatorRole::User).await;

        let AuthEvent::AccountDeactivationVerificationResponse(response) = last_response(&f).await
        else {
            unreachable!();
        };
        assert_eq!(response.outcome, ResponseOutcome::Failed);
        assert_eq!(response.reason.as_deref(), Some("invalid password"));
        // No cleanup happened.
        assert_eq!(f.credentials.credential_count(), 1);
        assert_eq!(f.bus.published_count("AccountDeactivationConfirmed").await, 0);
    }

    #[tokio::test]
    async fn cancellation_maps_to_cancelled_outcome() {
        let f = setup(true).await;
        f.prompt.set_reply(VerificationReply::Cancelled);

        send_request(&f, InitiatorRole::User).await;

        let AuthEvent::AccountDeactivationVerificationResponse(response) = last_response(&f).await
        else {
            unreachable!();
        };
        assert_eq!(response.outcome, ResponseOutcome::Cancelled);
        assert_eq!(f.bus.published_count("AccountDeactivationConfirmed").await, 0);
    }

    #[tokio::test]
    async fn mfa_reply_is_unsupported() {
        let f = setup(true).await;
        f.prompt
            .set_reply(VerificationReply::Mfa("123456".to_string()));

        send_request(&f, InitiatorRole::User).await;

        let AuthEvent::AccountDeactivationVerificationResponse(response) = last_response(&f).await
        else {
            unreachable!();
        };
        assert_eq!(response.outcome, ResponseOutcome::Failed);
        assert_eq!(
            response.reason.as_deref(),
            Some("unsupported verification method")
        );
    }

    #[tokio::test]
    async fn missing_credential_is_rejected_immediately() {
        let f = setup(false).await;

        send_request(&f, InitiatorRole::Admin).await;

        let AuthEvent::AccountDeactivationVerificationResponse(response) = last_response(&f).await
        else {
            unreachable!();
        };
        assert_eq!(response.outcome, ResponseOutcome::Failed);
        assert_eq!(response.reason.as_deref(), Some("no credential"));
        assert_eq!(f.prompt.prompt_count(), 0);
    }

    #[tokio::test]
    async fn second_request_never_confirms_twice() {
        let f = setup(true).await;

        send_request(&f, InitiatorRole::Admin).await;
        assert_eq!(f.bus.published_count("AccountDeactivationConfirmed").await, 1);

        send_request(&f, InitiatorRole::Admin).await;

        // Still exactly one confirmation; the second request was refused.
        assert_eq!(f.bus.published_count("AccountDeactivationConfirmed").await, 1);
        let AuthEvent::AccountDeactivationVerificationResponse(response) = last_response(&f).await
        else {
            unreachable!();
        };
        assert_eq!(response.outcome, ResponseOutcome::Failed);
        assert_eq!(response.reason.as_deref(), Some("account already deactivated"));
    }

    #[tokio::test]
    async fn confirmation_revokes_tokens() {
        let f = setup(true).await;
        let session = Session::new(f.account_id, None);
        let session_id = session.id();
        f.sessions.save(session).await.unwrap();
        f.tokens.issue(f.account_id, session_id).await.unwrap();
        assert_eq!(f.tokens.token_count(), 1);

        send_request(&f, InitiatorRole::System).await;

        assert_eq!(f.tokens.token_count(), 0);
    }
}
