//! Requesting side of the account deactivation saga.

use std::sync::Arc;
use std::time::Duration;

use bus::{EventBus, codec};
use common::types::{ClientInfo, InitiatorRole, ResponseOutcome};
use common::{AccountId, AuthEvent, RequestId};
use correlation::{CorrelationRegistry, Outcome};
use futures_util::FutureExt;

use crate::repository::AccountRepository;

/// How long the requester waits for the verification round trip.
pub const DEFAULT_VERIFICATION_DEADLINE: Duration = Duration::from_secs(30);

/// A deactivation request as received from the caller.
#[derive(Debug, Clone)]
pub struct DeactivationRequest {
    /// Account to deactivate.
    pub account_id: AccountId,
    /// Who is asking.
    pub requested_by: InitiatorRole,
    /// The requester's own account, for the self-service permission check.
    pub requester_account_id: Option<AccountId>,
    /// Optional reason, recorded in the confirmation event.
    pub reason: Option<String>,
    /// Client context, if known.
    pub client: Option<ClientInfo>,
}

/// Why a deactivation request did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationFailure {
    /// Account does not exist.
    AccountNotFound,
    /// Account is already deactivated.
    AlreadyDeactivated,
    /// A user tried to deactivate someone else's account.
    PermissionDenied,
    /// The verifying side rejected the request.
    VerificationFailed,
    /// The user declined interactively.
    Cancelled,
    /// No verification response arrived within the deadline.
    Timeout,
    /// Unexpected orchestration failure.
    SystemError,
}

/// Terminal result of a deactivation request.
///
/// Always carries a success flag and a human-readable message; the caller
/// is never left without an answer, even on timeout.
#[derive(Debug, Clone)]
pub struct DeactivationResult {
    pub success: bool,
    pub message: String,
    pub account_id: AccountId,
    pub failure: Option<DeactivationFailure>,
}

impl DeactivationResult {
    fn success(account_id: AccountId) -> Self {
        Self {
            success: true,
            message: "account deactivated".to_string(),
            account_id,
            failure: None,
        }
    }

    fn failure(
        account_id: AccountId,
        failure: DeactivationFailure,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            account_id,
            failure: Some(failure),
        }
    }
}

/// Orchestrates account deactivation from the Account context side.
///
/// Publishes a verification request and suspends on the correlation
/// registry until the Authentication context answers or the deadline
/// expires. The account status flip itself happens on the
/// `AccountDeactivationConfirmed` subscription, not here.
pub struct DeactivationSaga<B, R>
where
    B: EventBus + Clone + 'static,
    R: AccountRepository,
{
    bus: B,
    accounts: R,
    registry: CorrelationRegistry<AuthEvent>,
    verification_deadline: Duration,
}

impl<B, R> DeactivationSaga<B, R>
where
    B: EventBus + Clone + 'static,
    R: AccountRepository,
{
    /// Creates a new saga with the default verification deadline.
    pub fn new(bus: B, accounts: R, registry: CorrelationRegistry<AuthEvent>) -> Self {
        Self {
            bus,
            accounts,
            registry,
            verification_deadline: DEFAULT_VERIFICATION_DEADLINE,
        }
    }

    /// Overrides the verification deadline (tests).
    pub fn with_verification_deadline(mut self, deadline: Duration) -> Self {
        self.verification_deadline = deadline;
        self
    }

    /// Subscribes the response resolver on the bus. Call once at startup.
    pub async fn attach(&self) {
        let registry = self.registry.clone();
        self.bus
            .subscribe(
                "AccountDeactivationVerificationResponse",
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

    /// Runs one deactivation request to a terminal result.
    #[tracing::instrument(skip(self, request), fields(account_id = %request.account_id, requested_by = %request.requested_by))]
    pub async fn request_account_deactivation(
        &self,
        request: DeactivationRequest,
    ) -> DeactivationResult {
        metrics::counter!("deactivation_requests_total").increment(1);
        let account_id = request.account_id;

        // 1. Local lookup; missing or already-deactivated accounts
        // short-circuit with no published events.
        let account = match self.accounts.find_by_id(account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                return DeactivationResult::failure(
                    account_id,
                    DeactivationFailure::AccountNotFound,
                    "account not found",
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "account lookup failed");
                return DeactivationResult::failure(
                    account_id,
                    DeactivationFailure::SystemError,
                    "account lookup failed",
                );
            }
        };

        if account.is_deactivated() {
            return DeactivationResult::failure(
                account_id,
                DeactivationFailure::AlreadyDeactivated,
                "account is already deactivated",
            );
        }

        // 2. A user may only deactivate their own account.
        if request.requested_by == InitiatorRole::User
            && request.requester_account_id != Some(account_id)
        {
            metrics::counter!("deactivation_permission_denied").increment(1);
            return DeactivationResult::failure(
                account_id,
                DeactivationFailure::PermissionDenied,
                "a user may only deactivate their own account",
            );
        }

        // 3. Publish the verification request and suspend.
        let request_id = RequestId::new();
        let waiter = self.registry.register(request_id, self.verification_deadline);

        let requested = AuthEvent::deactivation_verification_requested(
            request_id,
            account_id,
            request.requested_by,
            request.reason.clone(),
            request.client.clone(),
        );
        let envelope = match codec::encode(&requested) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode verification request");
                return DeactivationResult::failure(
                    account_id,
                    DeactivationFailure::SystemError,
                    "failed to publish verification request",
                );
            }
        };
        if let Err(e) = self.bus.publish(envelope).await {
            tracing::error!(error = %e, "failed to publish verification request");
            return DeactivationResult::failure(
                account_id,
                DeactivationFailure::SystemError,
                "failed to publish verification request",
            );
        }

        // 4. Resolve the correlated response into a terminal result.
        match waiter.wait().await {
            Outcome::Reply(AuthEvent::AccountDeactivationVerificationResponse(data)) => {
                match data.outcome {
                    ResponseOutcome::Success => {
                        metrics::counter!("deactivation_completed").increment(1);
                        tracing::info!(%account_id, "deactivation verified and confirmed");
                        DeactivationResult::success(account_id)
                    }
                    ResponseOutcome::Cancelled => DeactivationResult::failure(
                        account_id,
                        DeactivationFailure::Cancelled,
                        data.reason
                            .unwrap_or_else(|| "verification cancelled".to_string()),
                    ),
                    ResponseOutcome::Failed | ResponseOutcome::Timeout => {
                        DeactivationResult::failure(
                            account_id,
                            DeactivationFailure::VerificationFailed,
                            data.reason
                                .unwrap_or_else(|| "verification failed".to_string()),
                        )
                    }
                }
            }
            Outcome::Reply(other) => {
                tracing::error!(
                    event_type = other.event_type(),
                    "unexpected reply to deactivation verification"
                );
                DeactivationResult::failure(
                    account_id,
                    DeactivationFailure::SystemError,
                    "unexpected verification reply",
                )
            }
            Outcome::TimedOut => {
                metrics::counter!("deactivation_timeouts").increment(1);
                tracing::warn!(%account_id, "deactivation verification timed out");
                DeactivationResult::failure(
                    account_id,
                    DeactivationFailure::Timeout,
                    "verification timed out",
                )
            }
        }
    }
}
