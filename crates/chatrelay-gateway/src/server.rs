// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use chatrelay_config::model::ServerConfig;
use chatrelay_core::RelayError;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admission::{AdmissionState, admission_middleware};
use crate::handlers;
use crate::session::SessionGateway;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            start_time: std::time::Instant::now(),
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub sessions: Arc<SessionGateway>,
    /// Name of the session cookie.
    pub cookie_name: Arc<str>,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(sessions: Arc<SessionGateway>, cookie_name: &str) -> Self {
        Self {
            sessions,
            cookie_name: Arc::from(cookie_name),
            health: HealthState::default(),
        }
    }
}

/// Builds the gateway router.
///
/// Routes:
/// - POST /api/chat (admission-controlled)
/// - GET /api/history
/// - POST /api/clear
/// - GET /api/config
/// - GET /health
pub fn build_router(state: GatewayState, admission: AdmissionState) -> Router {
    // Only the chat operation counts against the quota.
    let chat_routes = Router::new()
        .route("/api/chat", post(handlers::post_chat))
        .route_layer(axum_middleware::from_fn_with_state(
            admission,
            admission_middleware,
        ))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/history", get(handlers::get_history))
        .route("/api/clear", post(handlers::post_clear))
        .route("/api/config", get(handlers::get_config))
        .route("/health", get(handlers::get_health))
        .with_state(state);

    Router::new()
        .merge(chat_routes)
        .merge(api_routes)
        .fallback(handlers::fallback)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds to the configured host:port and serves `app` until `shutdown` is
/// cancelled.
pub async fn start_server(
    config: &ServerConfig,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), RelayError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    serve(listener, app, shutdown).await
}

/// Serves `app` on an already-bound listener with graceful shutdown.
///
/// Peer addresses are exposed to handlers as `ConnectInfo<SocketAddr>`.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), RelayError> {
    match listener.local_addr() {
        Ok(addr) => tracing::info!("Gateway server listening on {addr}"),
        Err(e) => tracing::warn!(error = %e, "gateway listening on unknown address"),
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(|e| RelayError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway server stopped");
    Ok(())
}
