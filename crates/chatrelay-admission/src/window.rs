// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-identity sliding-window state.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request was counted against the window.
    Admitted,
    /// Quota exhausted. `retry_after` is the time until the oldest counted
    /// request leaves the window.
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Admission timestamps for one identity.
///
/// Only admitted requests are recorded. Mutated exclusively under the
/// owning controller's per-identity mutex.
#[derive(Debug)]
pub struct WindowState {
    timestamps: VecDeque<Instant>,
    last_seen: Instant,
    evicted: bool,
}

impl WindowState {
    pub fn new(now: Instant) -> Self {
        Self {
            timestamps: VecDeque::new(),
            last_seen: now,
            evicted: false,
        }
    }

    /// Prunes expired timestamps, then admits and records `now` if fewer
    /// than `max_requests` remain. A rejection leaves the state unchanged
    /// apart from pruning.
    pub fn admit(&mut self, now: Instant, max_requests: usize, window: Duration) -> Admission {
        self.prune(now, window);

        if self.timestamps.len() < max_requests {
            self.timestamps.push_back(now);
            if now > self.last_seen {
                self.last_seen = now;
            }
            return Admission::Admitted;
        }

        let oldest = self.timestamps.iter().min().copied().unwrap_or(now);
        let age = now.saturating_duration_since(oldest);
        Admission::Rejected {
            retry_after: window.saturating_sub(age),
        }
    }

    /// Drops timestamps at least `window` old. Tolerates out-of-order
    /// `now` values from concurrent callers.
    fn prune(&mut self, now: Instant, window: Duration) {
        self.timestamps
            .retain(|ts| now.saturating_duration_since(*ts) < window);
    }

    /// Number of timestamps currently recorded (expired ones included until
    /// the next check prunes them).
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Whether the identity has been idle for at least `idle`.
    pub fn is_idle(&self, now: Instant, idle: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) >= idle
    }

    pub(crate) fn mark_evicted(&mut self) {
        self.evicted = true;
    }

    pub(crate) fn is_evicted(&self) -> bool {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn admits_up_to_quota() {
        let t0 = Instant::now();
        let mut state = WindowState::new(t0);
        for i in 0..5 {
            assert!(state.admit(t0 + Duration::from_secs(i), 5, WINDOW).is_admitted());
        }
        assert_eq!(state.len(), 5);
        assert!(!state.admit(t0 + Duration::from_secs(10), 5, WINDOW).is_admitted());
        assert_eq!(state.len(), 5, "rejection must not record a timestamp");
    }

    #[test]
    fn retry_after_counts_down_from_oldest() {
        let t0 = Instant::now();
        let mut state = WindowState::new(t0);
        state.admit(t0, 1, WINDOW);
        assert_eq!(
            state.admit(t0 + Duration::from_secs(20), 1, WINDOW),
            Admission::Rejected {
                retry_after: Duration::from_secs(40)
            }
        );
    }

    #[test]
    fn timestamp_exactly_window_old_has_expired() {
        let t0 = Instant::now();
        let mut state = WindowState::new(t0);
        state.admit(t0, 1, WINDOW);
        assert!(!state.admit(t0 + WINDOW - Duration::from_millis(1), 1, WINDOW).is_admitted());
        assert!(state.admit(t0 + WINDOW, 1, WINDOW).is_admitted());
    }

    #[test]
    fn out_of_order_now_does_not_panic() {
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(5);
        let mut state = WindowState::new(t0);
        assert!(state.admit(later, 2, WINDOW).is_admitted());
        assert!(state.admit(t0, 2, WINDOW).is_admitted());
        match state.admit(t0, 2, WINDOW) {
            Admission::Rejected { retry_after } => assert!(retry_after <= WINDOW),
            Admission::Admitted => panic!("quota is two"),
        }
    }

    #[test]
    fn idleness_tracks_last_admission() {
        let t0 = Instant::now();
        let mut state = WindowState::new(t0);
        state.admit(t0 + Duration::from_secs(30), 5, WINDOW);
        assert!(!state.is_idle(t0 + Duration::from_secs(100), Duration::from_secs(120)));
        assert!(state.is_idle(t0 + Duration::from_secs(150), Duration::from_secs(120)));
    }
}
