//! Bus handlers answering requests from the Authentication context.

use std::sync::Arc;

use bus::{EventBus, codec};
use common::AuthEvent;
use common::events::{AccountIdGetterResponseData, AccountStatusVerificationResponseData};
use common::types::ResponseOutcome;
use futures_util::FutureExt;

use crate::repository::AccountRepository;

/// Subscribes the Account context's request handlers on the bus.
///
/// Every request receives a response event, even when the account is
/// missing or the repository fails; the waiting side must never be left to
/// its deadline by a handler-side error.
pub async fn attach_account_handlers<B, R>(bus: B, repo: R)
where
    B: EventBus + Clone + 'static,
    R: AccountRepository + Clone + 'static,
{
    attach_id_getter(&bus, repo.clone()).await;
    attach_status_verifier(&bus, repo.clone()).await;
    attach_deactivation_listener(&bus, repo).await;
}

async fn attach_id_getter<B, R>(bus: &B, repo: R)
where
    B: EventBus + Clone + 'static,
    R: AccountRepository + Clone + 'static,
{
    let publisher = bus.clone();
    bus.subscribe(
        "AccountIdGetterRequested",
        Arc::new(move |envelope| {
            let bus = publisher.clone();
            let accounts = repo.clone();
            async move {
                let AuthEvent::AccountIdGetterRequested(data) = codec::decode(&envelope)? else {
                    return Ok(());
                };

                let response = match accounts.find_by_username(&data.username).await {
                    Ok(Some(account)) => {
                        AuthEvent::account_id_found(data.request_id, data.username, account.id())
                    }
                    Ok(None) => AuthEvent::account_id_not_found(data.request_id, data.username),
                    Err(e) => {
                        tracing::error!(username = %data.username, error = %e, "id lookup failed");
                        AuthEvent::AccountIdGetterResponse(AccountIdGetterResponseData {
                            request_id: data.request_id,
                            username: data.username,
                            account_id: None,
                            outcome: ResponseOutcome::Failed,
                            reason: Some("internal error".to_string()),
                        })
                    }
                };

                bus.publish(codec::encode(&response)?).await
            }
            .boxed()
        }),
    )
    .await;
}

async fn attach_status_verifier<B, R>(bus: &B, repo: R)
where
    B: EventBus + Clone + 'static,
    R: AccountRepository + Clone + 'static,
{
    let publisher = bus.clone();
    bus.subscribe(
        "AccountStatusVerificationRequested",
        Arc::new(move |envelope| {
            let bus = publisher.clone();
            let accounts = repo.clone();
            async move {
                let AuthEvent::AccountStatusVerificationRequested(data) =
                    codec::decode(&envelope)?
                else {
                    return Ok(());
                };

                let response = match accounts.find_by_id(data.account_id).await {
                    Ok(Some(account)) => AuthEvent::status_verified(
                        data.request_id,
                        data.account_id,
                        account.status(),
                    ),
                    Ok(None) => {
                        AuthEvent::status_account_missing(data.request_id, data.account_id)
                    }
                    Err(e) => {
                        tracing::error!(
                            account_id = %data.account_id,
                            error = %e,
                            "status verification failed"
                        );
                        AuthEvent::AccountStatusVerificationResponse(
                            AccountStatusVerificationResponseData {
                                request_id: data.request_id,
                                account_id: data.account_id,
                                account_status: None,
                                is_login_allowed: false,
                                status_message: Some("internal error".to_string()),
                                outcome: ResponseOutcome::Failed,
                            },
                        )
                    }
                };

                bus.publish(codec::encode(&response)?).await
            }
            .boxed()
        }),
    )
    .await;
}

/// Applies `AccountDeactivationConfirmed` to the local aggregate.
///
/// The Authentication context confirms deactivation; the account record
/// itself is owned here, so the status flip happens on this subscription
/// rather than inside the requesting saga.
async fn attach_deactivation_listener<B, R>(bus: &B, repo: R)
where
    B: EventBus + Clone + 'static,
    R: AccountRepository + Clone + 'static,
{
    bus.subscribe(
        "AccountDeactivationConfirmed",
        Arc::new(move |envelope| {
            let accounts = repo.clone();
            async move {
                let AuthEvent::AccountDeactivationConfirmed(data) = codec::decode(&envelope)?
                else {
                    return Ok(());
                };

                match accounts.find_by_id(data.account_id).await {
                    Ok(Some(mut account)) => {
                        match account.deactivate() {
                            Ok(()) => {
                                if let Err(e) = accounts.save(account).await {
                                    tracing::error!(
                                        account_id = %data.account_id,
                                        error = %e,
                                        "failed to persist deactivation"
                                    );
                                }
                                metrics::counter!("accounts_deactivated").increment(1);
                                tracing::info!(
                                    account_id = %data.account_id,
                                    deactivated_by = %data.deactivated_by,
                                    "account deactivated"
                                );
                            }
                            // Duplicate confirmation; the first one already won.
                            Err(_) => tracing::debug!(
                                account_id = %data.account_id,
                                "confirmation for already-deactivated account ignored"
                            ),
                        }
                    }
                    Ok(None) => tracing::warn!(
                        account_id = %data.account_id,
                        "deactivation confirmed for unknown account"
                    ),
                    Err(e) => tracing::error!(
                        account_id = %data.account_id,
                        error = %e,
                        "account lookup failed while applying deactivation"
                    ),
                }

                Ok(())
            }
            .boxed()
        }),
    )
    .await;
}
