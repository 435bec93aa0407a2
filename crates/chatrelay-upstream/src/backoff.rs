// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy: which responses are retried and how long to wait.

use std::time::Duration;

use chatrelay_config::model::UpstreamConfig;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Exponential backoff schedule bounded by an attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per send, first try included. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            max_backoff,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.backoff_base(),
            config.max_backoff(),
        )
    }

    /// Delay before retry `retry` (1-based): `base * 2^(retry-1)`, capped.
    ///
    /// A server-supplied `Retry-After` raises the delay but never past the cap.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let scheduled = self
            .base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff);
        let delay = match retry_after {
            Some(hint) => scheduled.max(hint),
            None => scheduled,
        };
        delay.min(self.max_backoff)
    }

    /// The full delay schedule for a send that fails every attempt.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|n| self.delay_for(n, None)).collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&UpstreamConfig::default())
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Reads an integer-seconds `Retry-After` header. HTTP-date values are ignored.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
