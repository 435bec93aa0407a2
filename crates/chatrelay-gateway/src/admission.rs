// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission middleware for the chat route.
//!
//! Derives a client identity from the peer address (or the first
//! `X-Forwarded-For` hop when the proxy is trusted) and rejects requests
//! over the per-identity quota before the handler runs.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chatrelay_admission::{Admission, AdmissionController};
use chatrelay_core::RelayError;

use crate::error::ApiError;

/// Identity used when neither a peer address nor a forwarded hop is known.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Admission configuration for the gateway.
#[derive(Clone)]
pub struct AdmissionState {
    pub limiter: Arc<AdmissionController>,
    /// Honour `X-Forwarded-For`. Only safe behind a proxy that overwrites it.
    pub trust_forwarded_for: bool,
}

impl std::fmt::Debug for AdmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionState")
            .field("max_requests", &self.limiter.max_requests())
            .field("window", &self.limiter.window())
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

/// The rate-limit key for a request, inserted as a request extension once
/// admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

/// Derives the client identity for `request`.
pub fn client_identity(request: &Request, trust_forwarded_for: bool) -> ClientIdentity {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        if let Some(hop) = forwarded {
            return ClientIdentity(hop.to_string());
        }
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => ClientIdentity(addr.ip().to_string()),
        None => ClientIdentity(UNKNOWN_IDENTITY.to_string()),
    }
}

/// Middleware that admits or rejects a request against the identity's window.
pub async fn admission_middleware(
    State(admission): State<AdmissionState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = client_identity(&request, admission.trust_forwarded_for);

    match admission.limiter.check(&identity.0, Instant::now()) {
        Admission::Admitted => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Admission::Rejected { retry_after } => {
            tracing::warn!(identity = %identity.0, "rate limit exceeded");
            ApiError(RelayError::RateLimited { retry_after }).into_response()
        }
    }
}
