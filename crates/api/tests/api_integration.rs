//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::config::Config;
use api::routes::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bus::InMemoryEventBus;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup() -> (Router, Arc<AppState<InMemoryEventBus>>) {
    let bus = InMemoryEventBus::new();
    let state = api::create_default_state(bus, &Config::default()).await;
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/accounts",
        Some(json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["account_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup().await;
    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_and_get_account() {
    let (app, _) = setup().await;
    let account_id = register(&app, "alice", "secret").await;

    let (status, body) = request(&app, "GET", &format!("/accounts/{account_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let (app, _) = setup().await;
    register(&app, "alice", "secret").await;

    let (status, _) = request(
        &app,
        "POST",
        "/accounts",
        Some(json!({"username": "alice", "password": "other"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_roundtrip() {
    let (app, _) = setup().await;
    let account_id = register(&app, "alice", "secret").await;

    let (status, body) = request(
        &app,
        "POST",
        "/login",
        Some(json!({"username": "alice", "password": "secret"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["account_id"], account_id);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["session_id"].as_str().is_some());
}

#[tokio::test]
async fn test_login_wrong_password_is_unauthorized() {
    let (app, _) = setup().await;
    register(&app, "alice", "secret").await;

    let (status, body) = request(
        &app,
        "POST",
        "/login",
        Some(json!({"username": "alice", "password": "wrong"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // The message does not reveal which part was wrong.
    assert_eq!(body["error"], "invalid username or password");
}

#[tokio::test]
async fn test_login_unknown_user_is_unauthorized() {
    let (app, _) = setup().await;

    let (status, body) = request(
        &app,
        "POST",
        "/login",
        Some(json!({"username": "ghost", "password": "whatever"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid username or password");
}

#[tokio::test]
async fn test_logout_roundtrip() {
    let (app, _) = setup().await;
    register(&app, "alice", "secret").await;

    let (_, login) = request(
        &app,
        "POST",
        "/login",
        Some(json!({"username": "alice", "password": "secret"})),
    )
    .await;
    let session_id = login["session_id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app,
        "POST",
        "/logout",
        Some(json!({"session_id": session_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["terminated_sessions"], 1);

    // The session is gone; logging out again is a 404.
    let (status, _) = request(
        &app,
        "POST",
        "/logout",
        Some(json!({"session_id": session_id})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logout_all_sessions() {
    let (app, _) = setup().await;
    let account_id = register(&app, "alice", "secret").await;

    for _ in 0..3 {
        let (status, _) = request(
            &app,
            "POST",
            "/login",
            Some(json!({"username": "alice", "password": "secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = request(
        &app,
        "POST",
        &format!("/accounts/{account_id}/logout-all"),
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["terminated_sessions"], 3);
}

#[tokio::test]
async fn test_force_logout() {
    let (app, _) = setup().await;
    let account_id = register(&app, "alice", "secret").await;
    request(
        &app,
        "POST",
        "/login",
        Some(json!({"username": "alice", "password": "secret"})),
    )
    .await;

    let (status, body) = request(
        &app,
        "POST",
        &format!("/accounts/{account_id}/force-logout"),
        Some(json!({"reason": "compromised credentials"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["terminated_sessions"], 1);
}

#[tokio::test]
async fn test_admin_deactivation_flow() {
    let (app, _) = setup().await;
    let account_id = register(&app, "alice", "secret").await;

    let (status, body) = request(
        &app,
        "POST",
        &format!("/accounts/{account_id}/deactivate"),
        Some(json!({"requested_by": "admin", "reason": "policy"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // The account is now deactivated.
    let (_, body) = request(&app, "GET", &format!("/accounts/{account_id}"), None).await;
    assert_eq!(body["status"], "deactivated");

    // A repeat request conflicts.
    let (status, _) = request(
        &app,
        "POST",
        &format!("/accounts/{account_id}/deactivate"),
        Some(json!({"requested_by": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // And the credential is gone, so login fails.
    let (status, _) = request(
        &app,
        "POST",
        "/login",
        Some(json!({"username": "alice", "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_cannot_deactivate_other_account() {
    let (app, _) = setup().await;
    let target_id = register(&app, "victim", "secret").await;
    let attacker_id = register(&app, "attacker", "hunter2").await;

    let (status, _) = request(
        &app,
        "POST",
        &format!("/accounts/{target_id}/deactivate"),
        Some(json!({
            "requested_by": "user",
            "requester_account_id": attacker_id,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_self_deactivation_with_scripted_prompt() {
    let (app, state) = setup().await;
    let account_id = register(&app, "alice", "secret").await;
    state
        .prompt
        .set_reply(auth::VerificationReply::Password("secret".to_string()));

    let (status, body) = request(
        &app,
        "POST",
        &format!("/accounts/{account_id}/deactivate"),
        Some(json!({
            "requested_by": "user",
            "requester_account_id": account_id,
            "reason": "leaving",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(state.prompt.prompt_count(), 1);
}

#[tokio::test]
async fn test_declined_prompt_conflicts() {
    let (app, state) = setup().await;
    let account_id = register(&app, "alice", "secret").await;
    // The default prompt reply is Cancelled; make it explicit.
    state.prompt.set_reply(auth::VerificationReply::Cancelled);

    let (status, _) = request(
        &app,
        "POST",
        &format!("/accounts/{account_id}/deactivate"),
        Some(json!({
            "requested_by": "user",
            "requester_account_id": account_id,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_deactivate_unknown_account_is_not_found() {
    let (app, _) = setup().await;

    let (status, _) = request(
        &app,
        "POST",
        &format!("/accounts/{}/deactivate", uuid::Uuid::new_v4()),
        Some(json!({"requested_by": "admin"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup().await;
    register(&app, "alice", "secret").await;
    request(
        &app,
        "POST",
        "/login",
        Some(json!({"username": "alice", "password": "secret"})),
    )
    .await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
