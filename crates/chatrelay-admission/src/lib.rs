// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-identity sliding-window admission control.
//!
//! [`AdmissionController`] admits at most `max_requests` requests per
//! identity within any `window`-long span. Each identity has its own mutex,
//! so checks for different identities never contend beyond the brief
//! `DashMap` shard lookup.

pub mod window;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chatrelay_config::model::RateLimitConfig;
use dashmap::DashMap;
use tracing::{debug, info};

pub use crate::window::{Admission, WindowState};

type Slot = Arc<Mutex<WindowState>>;

/// Sliding-window limiter keyed by client identity.
#[derive(Debug)]
pub struct AdmissionController {
    max_requests: usize,
    window: Duration,
    eviction_windows: u32,
    table: DashMap<String, Slot>,
}

impl AdmissionController {
    /// Creates a limiter admitting `max_requests` per `window` per identity.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            eviction_windows: 2,
            table: DashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
            .with_eviction_windows(config.eviction_windows)
    }

    /// Idle identities are evicted after this many whole windows (min 1).
    pub fn with_eviction_windows(mut self, windows: u32) -> Self {
        self.eviction_windows = windows.max(1);
        self
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Checks and, if admitted, records a request from `identity` at `now`.
    pub fn check(&self, identity: &str, now: Instant) -> Admission {
        loop {
            let slot = self.slot(identity, now);
            let mut state = lock(&slot);
            if state.is_evicted() {
                // Lost a race with `evict_idle`; the table now holds (or will
                // hold) a fresh entry.
                continue;
            }
            let admission = state.admit(now, self.max_requests, self.window);
            if let Admission::Rejected { retry_after } = admission {
                debug!(
                    identity,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "admission rejected"
                );
            }
            return admission;
        }
    }

    /// Boolean form of [`check`](Self::check).
    pub fn allow(&self, identity: &str, now: Instant) -> bool {
        self.check(identity, now).is_admitted()
    }

    /// Removes identities with no admission in the last
    /// `eviction_windows × window`. Returns the number removed.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let idle = self.window.saturating_mul(self.eviction_windows);
        let before = self.table.len();
        self.table.retain(|_, slot| {
            let mut state = lock(slot);
            if state.is_idle(now, idle) {
                state.mark_evicted();
                false
            } else {
                true
            }
        });
        let evicted = before.saturating_sub(self.table.len());
        if evicted > 0 {
            info!(evicted, remaining = self.table.len(), "evicted idle rate-limit entries");
        }
        evicted
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.table.len()
    }

    /// Fetches or inserts the identity's slot. The shard lock is released
    /// before the caller locks the slot.
    fn slot(&self, identity: &str, now: Instant) -> Slot {
        if let Some(slot) = self.table.get(identity) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .table
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(WindowState::new(now))));
        Arc::clone(slot.value())
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

/// A panic inside the critical section leaves the window consistent, so a
/// poisoned lock is still usable.
fn lock(slot: &Mutex<WindowState>) -> MutexGuard<'_, WindowState> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
