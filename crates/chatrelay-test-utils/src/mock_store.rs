// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session store that always fails, for exercising storage error paths.

use async_trait::async_trait;

use chatrelay_core::{ConversationHistory, RelayError, SessionId, SessionStore};

/// A `SessionStore` whose every call returns `RelayError::Storage`.
#[derive(Debug, Default)]
pub struct FailingSessionStore;

fn unavailable() -> RelayError {
    RelayError::Storage {
        source: Box::new(std::io::Error::other("session store unavailable")),
    }
}

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn get(&self, _session_id: &SessionId) -> Result<ConversationHistory, RelayError> {
        Err(unavailable())
    }

    async fn put(
        &self,
        _session_id: &SessionId,
        _history: ConversationHistory,
    ) -> Result<(), RelayError> {
        Err(unavailable())
    }

    async fn clear(&self, _session_id: &SessionId) -> Result<(), RelayError> {
        Err(unavailable())
    }
}
