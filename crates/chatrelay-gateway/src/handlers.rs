// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the chat API.
//!
//! Handles POST /api/chat, GET /api/history, POST /api/clear, GET /api/config,
//! GET /health, and the JSON 404 fallback.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chatrelay_core::{HealthStatus, RelayError, SessionId};
use serde::Serialize;

use crate::error::{ApiError, ApiErrorKind, ErrorResponse};
use crate::server::GatewayState;
use crate::session::ChatInput;

/// Response body for POST /api/chat.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    /// Reply text from the upstream.
    pub response: String,
    pub bot_name: String,
    pub user_name: String,
}

/// One message in GET /api/history.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub sender: String,
    pub message: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// Response body for GET /api/history.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<HistoryEntry>,
    pub session_id: String,
}

/// Response body for POST /api/clear.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

/// Response body for GET /api/config.
#[derive(Debug, Serialize)]
pub struct PublicConfigResponse {
    pub bot_name: String,
    pub user_name: String,
    pub safety_prompt: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", "degraded", or "unavailable".
    pub status: String,
    /// Binary version.
    pub version: String,
    pub uptime_secs: u64,
    /// Upstream health as reported by its client.
    pub upstream: String,
}

/// Reads the session cookie, minting a new session id when absent.
///
/// The returned jar carries the new cookie, if any, so it must be part of
/// the response.
pub fn session_cookie(jar: CookieJar, name: &str) -> (CookieJar, SessionId) {
    let existing = jar
        .get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.trim().is_empty());
    if let Some(id) = existing {
        return (jar, SessionId(id));
    }

    let id = uuid::Uuid::new_v4().to_string();
    tracing::info!(session = %id, "new session created");
    let cookie = Cookie::build((name.to_string(), id.clone()))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax);
    (jar.add(cookie), SessionId(id))
}

/// POST /api/chat
///
/// Runs after the admission middleware. A missing or malformed body is a
/// validation failure.
pub async fn post_chat(
    State(state): State<GatewayState>,
    jar: CookieJar,
    body: Result<Json<ChatInput>, JsonRejection>,
) -> Response {
    let (jar, session_id) = session_cookie(jar, &state.cookie_name);

    let input = match body {
        Ok(Json(input)) => input,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected chat body");
            let error = ApiError(RelayError::Validation("Missing message in request".into()));
            return (jar, error).into_response();
        }
    };

    match state.sessions.chat(&session_id, input).await {
        Ok(outcome) => (
            jar,
            Json(ChatResponse {
                success: true,
                response: outcome.reply,
                bot_name: outcome.bot_name,
                user_name: outcome.user_name,
            }),
        )
            .into_response(),
        Err(e) => (jar, ApiError(e)).into_response(),
    }
}

/// GET /api/history
pub async fn get_history(State(state): State<GatewayState>, jar: CookieJar) -> Response {
    let (jar, session_id) = session_cookie(jar, &state.cookie_name);

    match state.sessions.history(&session_id).await {
        Ok(history) => {
            let history = history
                .messages()
                .iter()
                .map(|m| HistoryEntry {
                    sender: m.sender().to_string(),
                    message: m.text().to_string(),
                    timestamp: m.created_at().to_rfc3339(),
                })
                .collect();
            (
                jar,
                Json(HistoryResponse {
                    success: true,
                    history,
                    session_id: session_id.0,
                }),
            )
                .into_response()
        }
        Err(e) => (jar, ApiError(e)).into_response(),
    }
}

/// POST /api/clear
pub async fn post_clear(State(state): State<GatewayState>, jar: CookieJar) -> Response {
    let (jar, session_id) = session_cookie(jar, &state.cookie_name);

    match state.sessions.clear(&session_id).await {
        Ok(()) => (
            jar,
            Json(ClearResponse {
                success: true,
                message: "Chat history cleared".to_string(),
            }),
        )
            .into_response(),
        Err(e) => (jar, ApiError(e)).into_response(),
    }
}

/// GET /api/config
///
/// Public conversation defaults for the front end.
pub async fn get_config(State(state): State<GatewayState>) -> Json<PublicConfigResponse> {
    let defaults = state.sessions.defaults();
    Json(PublicConfigResponse {
        bot_name: defaults.bot_name.clone(),
        user_name: defaults.user_name.clone(),
        safety_prompt: defaults.safety_prompt.clone(),
    })
}

/// GET /health
///
/// 200 while the upstream is usable, 503 otherwise.
pub async fn get_health(State(state): State<GatewayState>) -> (StatusCode, Json<HealthResponse>) {
    let (status_code, status, upstream) = match state.sessions.upstream().health_check().await {
        HealthStatus::Healthy => (StatusCode::OK, "ok", "healthy".to_string()),
        HealthStatus::Degraded(reason) => {
            (StatusCode::OK, "degraded", format!("degraded: {reason}"))
        }
        HealthStatus::Unhealthy(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "unavailable",
            format!("unhealthy: {reason}"),
        ),
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.health.start_time.elapsed().as_secs(),
            upstream,
        }),
    )
}

/// Fallback for unknown routes.
pub async fn fallback() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(ApiErrorKind::NotFound, "Endpoint not found")),
    )
}
