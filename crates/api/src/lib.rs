//! HTTP API server with observability for the auth saga system.
//!
//! Wires both bounded contexts onto one in-memory bus and exposes the saga
//! entry points as REST endpoints, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use account::{DeactivationSaga, InMemoryAccountRepository, attach_account_handlers};
use auth::{
    AuthContext, DeactivationVerifier, InMemoryCredentialRepository, InMemorySessionRepository,
    InMemoryTokenIssuer, InMemoryVerificationPrompt, LoginSaga, LogoutSaga, PlaintextHasher,
};
use axum::Router;
use axum::routing::{get, post};
use bus::EventBus;
use common::AuthEvent;
use correlation::{CorrelationRegistry, spawn_sweeper};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<B: EventBus + Clone + 'static>(
    state: Arc<AppState<B>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/accounts", post(routes::accounts::register::<B>))
        .route("/accounts/{id}", get(routes::accounts::get::<B>))
        .route(
            "/accounts/{id}/deactivate",
            post(routes::accounts::deactivate::<B>),
        )
        .route(
            "/accounts/{id}/logout-all",
            post(routes::auth::logout_all::<B>),
        )
        .route(
            "/accounts/{id}/force-logout",
            post(routes::auth::force_logout::<B>),
        )
        .route("/login", post(routes::auth::login::<B>))
        .route("/logout", post(routes::auth::logout::<B>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires both bounded contexts onto the given bus and builds the shared
/// application state.
///
/// Attaches every bus subscriber (account handlers, saga resolvers, the
/// deactivation verifier) and spawns the correlation sweepers as detached
/// background tasks.
pub async fn create_default_state<B: EventBus + Clone + 'static>(
    bus: B,
    config: &Config,
) -> Arc<AppState<B>> {
    // Account context.
    let accounts = InMemoryAccountRepository::new();
    attach_account_handlers(bus.clone(), accounts.clone()).await;

    let account_registry: CorrelationRegistry<AuthEvent> = CorrelationRegistry::new();
    let deactivation_saga =
        DeactivationSaga::new(bus.clone(), accounts.clone(), account_registry.clone());
    deactivation_saga.attach().await;

    // Authentication context.
    let credentials = InMemoryCredentialRepository::new();
    let sessions = InMemorySessionRepository::new();
    let hasher = PlaintextHasher;
    let ctx = AuthContext::new(
        credentials.clone(),
        sessions.clone(),
        InMemoryTokenIssuer::new(),
        hasher,
    );

    let auth_registry: CorrelationRegistry<AuthEvent> = CorrelationRegistry::new();
    let login_saga = LoginSaga::new(bus.clone(), ctx.clone(), auth_registry.clone());
    login_saga.attach().await;

    let logout_saga = LogoutSaga::new(bus.clone(), sessions.clone(), ctx.current.clone());

    let prompt = InMemoryVerificationPrompt::new();
    let verifier = DeactivationVerifier::new(bus.clone(), ctx, prompt.clone());
    verifier.attach().await;

    // Defensive cleanup for tickets whose timer failed to fire.
    spawn_sweeper(account_registry, config.sweep_interval, config.sweep_grace);
    spawn_sweeper(auth_registry, config.sweep_interval, config.sweep_grace);

    Arc::new(AppState {
        accounts,
        credentials,
        sessions,
        hasher,
        prompt,
        login_saga,
        logout_saga,
        deactivation_saga,
    })
}
