// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the chatrelay service.
//!
//! This crate holds the conversation records, the error taxonomy, and the
//! collaborator traits ([`ChatUpstream`], [`SessionStore`]) that the
//! upstream client, the gateway, and the test utilities share.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ErrorClass, RelayError, UpstreamError, UpstreamErrorKind, retry_after_secs};
pub use traits::{ChatUpstream, SessionStore};
pub use types::{ChatRequest, ConversationHistory, HealthStatus, Message, SessionId};
