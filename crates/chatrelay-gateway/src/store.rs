// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory session store.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chatrelay_core::{ConversationHistory, RelayError, SessionId, SessionStore};
use dashmap::DashMap;
use tracing::info;

#[derive(Debug)]
struct StoredSession {
    history: ConversationHistory,
    touched: Instant,
}

/// [`SessionStore`] backed by a `DashMap`. Histories live for the life of
/// the process unless [`evict_idle`](Self::evict_idle) drops them.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<SessionId, StoredSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with stored history.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops sessions not read or written within `ttl`. Returns the number dropped.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        self.evict_idle_at(Instant::now(), ttl)
    }

    fn evict_idle_at(&self, now: Instant, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.saturating_duration_since(session.touched) < ttl);
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            info!(evicted, remaining = self.sessions.len(), "evicted idle sessions");
        }
        evicted
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &SessionId) -> Result<ConversationHistory, RelayError> {
        Ok(match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.touched = Instant::now();
                session.history.clone()
            }
            None => ConversationHistory::new(),
        })
    }

    async fn put(
        &self,
        session_id: &SessionId,
        history: ConversationHistory,
    ) -> Result<(), RelayError> {
        self.sessions.insert(
            session_id.clone(),
            StoredSession {
                history,
                touched: Instant::now(),
            },
        );
        Ok(())
    }

    async fn clear(&self, session_id: &SessionId) -> Result<(), RelayError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}
