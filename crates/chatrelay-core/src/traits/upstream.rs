// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upstream trait for the remote inference endpoint.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RelayError, UpstreamError};
use crate::types::{ChatRequest, HealthStatus};

/// A remote endpoint that turns a conversation payload into a reply.
///
/// `send` always resolves to either the reply text or an [`UpstreamError`];
/// a failed send never panics. `deadline` bounds the total wall-clock time
/// of the call including any retries.
#[async_trait]
pub trait ChatUpstream: Send + Sync + 'static {
    /// Human-readable name of this upstream, used in logs and health output.
    fn name(&self) -> &str;

    /// Sends one composed request and returns the reply text.
    async fn send(&self, request: &ChatRequest, deadline: Duration)
        -> Result<String, UpstreamError>;

    /// Reports whether the upstream can accept sends.
    async fn health_check(&self) -> HealthStatus;

    /// Releases pooled connections. Later sends fail without network I/O.
    async fn shutdown(&self) -> Result<(), RelayError>;
}
