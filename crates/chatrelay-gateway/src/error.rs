// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`RelayError`] to HTTP responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use chatrelay_core::{ErrorClass, RelayError, retry_after_secs};
use serde::Serialize;

/// Stable machine-readable failure tag in error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    InvalidRequest,
    RateLimited,
    UpstreamTimeout,
    UpstreamUnavailable,
    NotFound,
    Internal,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable description.
    pub error: String,
    pub kind: ApiErrorKind,
}

impl ErrorResponse {
    pub fn new(kind: ApiErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            kind,
        }
    }
}

/// Handler error wrapper so `RelayError` can be returned with `?`.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(error: RelayError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.class() {
            ErrorClass::BadInput => StatusCode::BAD_REQUEST,
            ErrorClass::Throttled => StatusCode::TOO_MANY_REQUESTS,
            ErrorClass::TimedOut => StatusCode::GATEWAY_TIMEOUT,
            ErrorClass::Degraded => StatusCode::BAD_GATEWAY,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self.0.class() {
            ErrorClass::BadInput => ApiErrorKind::InvalidRequest,
            ErrorClass::Throttled => ApiErrorKind::RateLimited,
            ErrorClass::TimedOut => ApiErrorKind::UpstreamTimeout,
            ErrorClass::Degraded => ApiErrorKind::UpstreamUnavailable,
            ErrorClass::Internal => ApiErrorKind::Internal,
        }
    }

    /// Message shown to the client. Internal details are logged, not returned.
    pub fn message(&self) -> String {
        match &self.0 {
            RelayError::Validation(message) => message.clone(),
            RelayError::RateLimited { retry_after } => format!(
                "Rate limit exceeded. Try again in {} seconds.",
                retry_after_secs(*retry_after)
            ),
            RelayError::Upstream(e) => format!("Chat service error: {e}"),
            RelayError::Storage { .. } | RelayError::Config(_) | RelayError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.class() == ErrorClass::Internal {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = Json(ErrorResponse::new(self.kind(), self.message()));
        match self.0 {
            RelayError::RateLimited { retry_after } => {
                let header = HeaderValue::from(retry_after_secs(retry_after));
                (status, [(RETRY_AFTER, header)], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}
