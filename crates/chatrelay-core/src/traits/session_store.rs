// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session store trait for per-session conversation history.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::types::{ConversationHistory, SessionId};

/// Storage capability for conversation histories keyed by session.
///
/// The gateway serializes operations per session, so implementations only
/// need each individual call to be atomic.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the stored history, or an empty one for an unknown session.
    async fn get(&self, session_id: &SessionId) -> Result<ConversationHistory, RelayError>;

    /// Replaces the stored history for a session.
    async fn put(
        &self,
        session_id: &SessionId,
        history: ConversationHistory,
    ) -> Result<(), RelayError>;

    /// Removes all history for a session.
    async fn clear(&self, session_id: &SessionId) -> Result<(), RelayError>;
}
