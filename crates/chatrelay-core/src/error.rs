// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the chatrelay service.

use std::time::Duration;

use strum::Display;
use thiserror::Error;

/// Failure of a single upstream send, after retries have been exhausted or
/// skipped for a terminal condition.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The caller's deadline elapsed before a definitive response.
    #[error("upstream request timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The transport could not reach the endpoint.
    #[error("failed to connect to upstream: {0}")]
    ConnectionFailure(String),

    /// A non-success status that was terminal or exhausted its retries.
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Anything else (body read failure, client shut down, request build error).
    #[error("unexpected upstream error: {0}")]
    Unexpected(String),
}

/// Tag identifying the variant of an [`UpstreamError`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum UpstreamErrorKind {
    Timeout,
    ConnectionFailure,
    UpstreamError,
    Unexpected,
}

impl UpstreamError {
    /// Returns the classification tag for this failure.
    pub fn kind(&self) -> UpstreamErrorKind {
        match self {
            UpstreamError::Timeout { .. } => UpstreamErrorKind::Timeout,
            UpstreamError::ConnectionFailure(_) => UpstreamErrorKind::ConnectionFailure,
            UpstreamError::Status { .. } => UpstreamErrorKind::UpstreamError,
            UpstreamError::Unexpected(_) => UpstreamErrorKind::Unexpected,
        }
    }

    /// HTTP status returned by the upstream, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The primary error type for chat operations and service plumbing.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed or empty inbound input. Never reaches the upstream.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Admission denied by the rate limiter.
    #[error("rate limit exceeded, retry after {}s", retry_after_secs(*retry_after))]
    RateLimited { retry_after: Duration },

    /// The upstream send failed.
    #[error("chat service error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Session store backend errors.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (missing token, bad header value, bind failure).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Externally visible failure class.
///
/// The HTTP layer maps each class to a distinct response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorClass {
    BadInput,
    Throttled,
    /// The upstream gave no definitive answer before the deadline.
    TimedOut,
    Degraded,
    Internal,
}

impl RelayError {
    /// Classifies this error for the external response shape.
    pub fn class(&self) -> ErrorClass {
        match self {
            RelayError::Validation(_) => ErrorClass::BadInput,
            RelayError::RateLimited { .. } => ErrorClass::Throttled,
            RelayError::Upstream(UpstreamError::Timeout { .. }) => ErrorClass::TimedOut,
            RelayError::Upstream(_) => ErrorClass::Degraded,
            RelayError::Storage { .. } | RelayError::Config(_) | RelayError::Internal(_) => {
                ErrorClass::Internal
            }
        }
    }
}

/// Whole seconds to wait before retrying, rounded up and never zero.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}
