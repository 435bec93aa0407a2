// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for chatrelay integration tests.
//!
//! Provides mock collaborators for fast, deterministic, CI-runnable tests
//! without a live inference endpoint.
//!
//! # Components
//!
//! - [`MockUpstream`] - Scripted upstream that records every request
//! - [`FailingSessionStore`] - Session store whose every call fails

pub mod mock_store;
pub mod mock_upstream;

pub use mock_store::FailingSessionStore;
pub use mock_upstream::{DEFAULT_REPLY, MockUpstream, shared};
