//! Account registration, lookup, and deactivation endpoints.

use std::sync::Arc;

use account::{Account, AccountRepository, DeactivationRequest};
use auth::{AuthCredential, CredentialRepository, PasswordHasher};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bus::EventBus;
use common::types::{ClientInfo, InitiatorRole};
use common::AccountId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, deactivation_failure_to_error};
use crate::routes::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct DeactivateRequest {
    pub requested_by: InitiatorRole,
    pub requester_account_id: Option<Uuid>,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct AccountResponse {
    pub account_id: String,
    pub username: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct DeactivateResponse {
    pub account_id: String,
    pub message: String,
}

/// POST /accounts — registers an account with a password credential.
pub async fn register<B: EventBus + Clone + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    if request.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".into()));
    }
    if request.password.is_empty() {
        return Err(ApiError::BadRequest("password must not be empty".into()));
    }

    let existing = state
        .accounts
        .find_by_username(&request.username)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("username already taken".into()));
    }

    let account = Account::new(&request.username);
    let account_id = account.id();
    let response = AccountResponse {
        account_id: account_id.to_string(),
        username: account.username().to_string(),
        status: account.status().to_string(),
    };

    state
        .accounts
        .save(account)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    state
        .credentials
        .save(AuthCredential::new(
            account_id,
            state.hasher.hash(&request.password),
        ))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(%account_id, username = %request.username, "account registered");
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /accounts/{id} — returns an account's public state.
pub async fn get<B: EventBus + Clone + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = AccountId::from_uuid(id);
    let account = state
        .accounts
        .find_by_id(account_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("account not found".into()))?;

    Ok(Json(AccountResponse {
        account_id: account.id().to_string(),
        username: account.username().to_string(),
        status: account.status().to_string(),
    }))
}

/// POST /accounts/{id}/deactivate — runs the deactivation saga.
pub async fn deactivate<B: EventBus + Clone + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
    Json(request): Json<DeactivateRequest>,
) -> Result<Json<DeactivateResponse>, ApiError> {
    let account_id = AccountId::from_uuid(id);
    let client = client_info(&request);

    let result = state
        .deactivation_saga
        .request_account_deactivation(DeactivationRequest {
            account_id,
            requested_by: request.requested_by,
            requester_account_id: request.requester_account_id.map(AccountId::from_uuid),
            reason: request.reason,
            client,
        })
        .await;

    if result.success {
        Ok(Json(DeactivateResponse {
            account_id: account_id.to_string(),
            message: result.message,
        }))
    } else {
        let failure = result
            .failure
            .unwrap_or(account::DeactivationFailure::SystemError);
        Err(deactivation_failure_to_error(failure, result.message))
    }
}

fn client_info(request: &DeactivateRequest) -> Option<ClientInfo> {
    if request.ip_address.is_none() && request.user_agent.is_none() && request.device_id.is_none()
    {
        return None;
    }
    Some(ClientInfo {
        ip_address: request.ip_address.clone(),
        user_agent: request.user_agent.clone(),
        device_id: request.device_id.clone(),
    })
}
