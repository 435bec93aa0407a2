// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilient client for the remote chat inference endpoint.
//!
//! This crate implements [`ChatUpstream`] over HTTP: it serializes a
//! [`ChatRequest`](chatrelay_core::ChatRequest) into the endpoint's JSON shape,
//! retries transient failures with exponential backoff, and bounds every send
//! by a caller-supplied deadline.

pub mod backoff;
pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use chatrelay_core::{ChatRequest, ChatUpstream, HealthStatus, RelayError, UpstreamError};
use tracing::debug;

pub use crate::backoff::RetryPolicy;
pub use crate::client::UpstreamClient;

#[async_trait]
impl ChatUpstream for UpstreamClient {
    fn name(&self) -> &str {
        "upstream"
    }

    async fn send(
        &self,
        request: &ChatRequest,
        deadline: Duration,
    ) -> Result<String, UpstreamError> {
        UpstreamClient::send(self, request, deadline).await
    }

    async fn health_check(&self) -> HealthStatus {
        // No probe request: the endpoint bills per call.
        if self.is_open() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy(client::SHUT_DOWN.to_string())
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        debug!("upstream shutting down");
        self.close();
        Ok(())
    }
}
