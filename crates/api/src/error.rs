//! API error types with HTTP response mapping.

use account::DeactivationFailure;
use auth::{LoginFailure, LogoutFailure};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Authentication failed.
    Unauthorized(String),
    /// The caller is not allowed to do this.
    Forbidden(String),
    /// The resource is already in the requested state.
    Conflict(String),
    /// Credential or account is locked.
    Locked(String),
    /// A cross-context round trip timed out.
    Timeout(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Locked(msg) => (StatusCode::LOCKED, msg),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Maps a login failure to an HTTP error.
///
/// Unknown usernames and wrong passwords intentionally share one message so
/// the HTTP surface does not reveal which part was wrong.
pub fn login_failure_to_error(failure: LoginFailure, message: String) -> ApiError {
    match failure {
        LoginFailure::AccountNotFound | LoginFailure::InvalidCredentials => {
            ApiError::Unauthorized("invalid username or password".to_string())
        }
        LoginFailure::AccountLocked => ApiError::Locked(message),
        LoginFailure::AccountInactive => ApiError::Forbidden(message),
        LoginFailure::Timeout => ApiError::Timeout(message),
        LoginFailure::SystemError => ApiError::Internal(message),
    }
}

/// Maps a deactivation failure to an HTTP error.
pub fn deactivation_failure_to_error(failure: DeactivationFailure, message: String) -> ApiError {
    match failure {
        DeactivationFailure::AccountNotFound => ApiError::NotFound(message),
        DeactivationFailure::AlreadyDeactivated => ApiError::Conflict(message),
        DeactivationFailure::PermissionDenied => ApiError::Forbidden(message),
        DeactivationFailure::VerificationFailed => ApiError::Forbidden(message),
        DeactivationFailure::Cancelled => ApiError::Conflict(message),
        DeactivationFailure::Timeout => ApiError::Timeout(message),
        DeactivationFailure::SystemError => ApiError::Internal(message),
    }
}

/// Maps a logout failure to an HTTP error.
pub fn logout_failure_to_error(failure: LogoutFailure, message: String) -> ApiError {
    match failure {
        LogoutFailure::SessionNotFound => ApiError::NotFound(message),
        LogoutFailure::AlreadyLoggedOut => ApiError::Conflict(message),
        LogoutFailure::SystemError => ApiError::Internal(message),
    }
}
