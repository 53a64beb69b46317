//! Login and logout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use bus::EventBus;
use chrono::{DateTime, Utc};
use common::types::{ClientInfo, LogoutType};
use common::{AccountId, SessionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, login_failure_to_error, logout_failure_to_error};
use crate::routes::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub session_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct LogoutAllRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct ForceLogoutRequest {
    pub reason: String,
    pub admin_device_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct LoginResponse {
    pub account_id: String,
    pub session_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub terminated_sessions: usize,
    pub message: String,
}

/// POST /login — runs the login saga.
pub async fn login<B: EventBus + Clone + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let client = login_client_info(&request);

    let result = state
        .login_saga
        .login(&request.username, &request.password, client)
        .await;

    if result.success {
        let Some(token) = result.token else {
            return Err(ApiError::Internal("login succeeded without a token".into()));
        };
        Ok(Json(LoginResponse {
            account_id: token.account_id.to_string(),
            session_id: token.session_id.to_string(),
            token: token.token,
            expires_at: token.expires_at,
        }))
    } else {
        let failure = result.failure.unwrap_or(auth::LoginFailure::SystemError);
        Err(login_failure_to_error(failure, result.message))
    }
}

/// POST /logout — terminates one session.
pub async fn logout<B: EventBus + Clone + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Json(request): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let session_id = SessionId::from_uuid(request.session_id);

    let result = state
        .logout_saga
        .logout_session(session_id, LogoutType::Manual, request.reason)
        .await;

    logout_result_to_response(result)
}

/// POST /accounts/{id}/logout-all — terminates every session for an account.
pub async fn logout_all<B: EventBus + Clone + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
    Json(request): Json<LogoutAllRequest>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let account_id = AccountId::from_uuid(id);

    let result = state
        .logout_saga
        .logout_all_sessions(account_id, LogoutType::Manual, request.reason)
        .await;

    logout_result_to_response(result)
}

/// POST /accounts/{id}/force-logout — administrative logout of all sessions.
pub async fn force_logout<B: EventBus + Clone + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ForceLogoutRequest>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let account_id = AccountId::from_uuid(id);
    let admin = request.admin_device_id.map(|device_id| ClientInfo {
        device_id: Some(device_id),
        ..ClientInfo::default()
    });

    let result = state
        .logout_saga
        .force_logout(account_id, &request.reason, admin)
        .await;

    logout_result_to_response(result)
}

fn logout_result_to_response(result: auth::LogoutResult) -> Result<Json<LogoutResponse>, ApiError> {
    if result.success {
        Ok(Json(LogoutResponse {
            terminated_sessions: result.terminated_sessions,
            message: result.message,
        }))
    } else {
        let failure = result.failure.unwrap_or(auth::LogoutFailure::SystemError);
        Err(logout_failure_to_error(failure, result.message))
    }
}

fn login_client_info(request: &LoginRequest) -> Option<ClientInfo> {
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
