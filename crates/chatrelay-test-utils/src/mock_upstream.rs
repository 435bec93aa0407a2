// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock upstream for deterministic testing.
//!
//! `MockUpstream` implements `ChatUpstream` with pre-configured outcomes,
//! enabling fast, CI-runnable tests without a live inference endpoint.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use chatrelay_core::{ChatRequest, ChatUpstream, HealthStatus, RelayError, UpstreamError};

/// Reply returned once the scripted queue is empty.
pub const DEFAULT_REPLY: &str = "mock response";

/// A mock upstream that returns scripted outcomes and records every request.
///
/// Outcomes are popped from a FIFO queue. When the queue is empty,
/// [`DEFAULT_REPLY`] is returned.
pub struct MockUpstream {
    outcomes: Mutex<VecDeque<Result<String, UpstreamError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
    shut_down: AtomicBool,
}

impl MockUpstream {
    /// Create a new mock upstream with an empty outcome queue.
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Create a mock upstream pre-loaded with successful replies.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcomes: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::new()
        }
    }

    /// Delay every send by `latency` (useful for overlapping requests).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a successful reply.
    pub async fn push_reply(&self, text: impl Into<String>) {
        self.outcomes.lock().await.push_back(Ok(text.into()));
    }

    /// Queue a failure.
    pub async fn push_error(&self, error: UpstreamError) {
        self.outcomes.lock().await.push_back(Err(error));
    }

    /// Number of sends received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of sends observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }

    /// The most recent request, if any.
    pub async fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().await.last().cloned()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatUpstream for MockUpstream {
    fn name(&self) -> &str {
        "mock-upstream"
    }

    async fn send(
        &self,
        request: &ChatRequest,
        _deadline: Duration,
    ) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()))
    }

    async fn health_check(&self) -> HealthStatus {
        if self.is_shut_down() {
            HealthStatus::Unhealthy("mock shut down".into())
        } else {
            HealthStatus::Healthy
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Convenience for tests that need the mock both as a trait object and as
/// itself.
pub fn shared(mock: MockUpstream) -> (Arc<MockUpstream>, Arc<dyn ChatUpstream>) {
    let mock = Arc::new(mock);
    let upstream: Arc<dyn ChatUpstream> = mock.clone();
    (mock, upstream)
}
