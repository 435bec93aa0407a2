// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-scoped chat orchestration.
//!
//! [`SessionGateway`] reads a session's history, composes the upstream
//! request, and appends both turns only after the upstream succeeds.
//! Operations on the same session are serialized; different sessions
//! proceed independently.

use std::sync::Arc;
use std::time::Duration;

use chatrelay_config::model::ChatConfig;
use chatrelay_core::{
    ChatRequest, ChatUpstream, ConversationHistory, Message, RelayError, SessionId, SessionStore,
};
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Inbound chat operation.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatInput {
    pub message: String,
    #[serde(default)]
    pub bot_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

impl ChatInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            bot_name: None,
            user_name: None,
            custom_prompt: None,
        }
    }
}

/// Result of a successful chat operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub reply: String,
    pub bot_name: String,
    pub user_name: String,
}

/// Defaults applied when a chat input omits optional fields.
#[derive(Debug, Clone)]
pub struct ChatDefaults {
    pub bot_name: String,
    pub user_name: String,
    pub safety_prompt: String,
    pub memory: String,
    /// Prior messages sent upstream, `0` for all.
    pub history_limit: usize,
}

impl From<&ChatConfig> for ChatDefaults {
    fn from(config: &ChatConfig) -> Self {
        Self {
            bot_name: config.default_bot_name.clone(),
            user_name: config.default_user_name.clone(),
            safety_prompt: config.safety_prompt.clone(),
            memory: config.memory.clone(),
            history_limit: config.history_limit,
        }
    }
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

type SessionLocks = DashMap<SessionId, Arc<Mutex<()>>>;

/// Handle on one session's lock entry.
///
/// Dropping it removes the entry once no other operation holds or waits on
/// it. This also runs when the owning future is cancelled while still
/// waiting for the lock.
struct SessionSlot<'a> {
    locks: &'a SessionLocks,
    id: SessionId,
    lock: Arc<Mutex<()>>,
}

impl Drop for SessionSlot<'_> {
    fn drop(&mut self) {
        // The table and this slot are the only remaining holders.
        self.locks.remove_if(&self.id, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

/// Orchestrates chat, history, and clear operations for sessions.
pub struct SessionGateway {
    upstream: Arc<dyn ChatUpstream>,
    store: Arc<dyn SessionStore>,
    defaults: ChatDefaults,
    deadline: Duration,
    locks: SessionLocks,
}

impl SessionGateway {
    pub fn new(
        upstream: Arc<dyn ChatUpstream>,
        store: Arc<dyn SessionStore>,
        defaults: ChatDefaults,
        deadline: Duration,
    ) -> Self {
        Self {
            upstream,
            store,
            defaults,
            deadline,
            locks: DashMap::new(),
        }
    }

    pub fn defaults(&self) -> &ChatDefaults {
        &self.defaults
    }

    pub fn upstream(&self) -> &Arc<dyn ChatUpstream> {
        &self.upstream
    }

    /// Sends one user message and records the exchange.
    ///
    /// An empty message is rejected before the store or the upstream is
    /// touched. On upstream failure the history is left unchanged.
    pub async fn chat(
        &self,
        session_id: &SessionId,
        input: ChatInput,
    ) -> Result<ChatOutcome, RelayError> {
        let message = input.message.trim();
        if message.is_empty() {
            return Err(RelayError::Validation("Empty message not allowed".into()));
        }

        let bot_name = or_default(input.bot_name, &self.defaults.bot_name);
        let user_name = or_default(input.user_name, &self.defaults.user_name);
        let prompt = or_default(input.custom_prompt, &self.defaults.safety_prompt);

        let slot = self.slot(session_id);
        let _guard = slot.lock.lock().await;
        info!(session = %session_id, "processing chat request");

        let mut history = self.store.get(session_id).await?;
        let request = ChatRequest::compose(
            prompt,
            bot_name.as_str(),
            user_name.as_str(),
            history.recent(self.defaults.history_limit),
            message,
        )?
        .with_memory(self.defaults.memory.as_str());

        let reply = self
            .upstream
            .send(&request, self.deadline)
            .await
            .map_err(|e| {
                error!(session = %session_id, kind = %e.kind(), error = %e, "upstream send failed");
                RelayError::Upstream(e)
            })?;

        history.push(request.user_message().clone());
        history.push(Message::new(bot_name.as_str(), reply.as_str()));
        self.store.put(session_id, history).await?;

        Ok(ChatOutcome {
            reply,
            bot_name,
            user_name,
        })
    }

    /// Returns the session's stored history.
    pub async fn history(&self, session_id: &SessionId) -> Result<ConversationHistory, RelayError> {
        let slot = self.slot(session_id);
        let _guard = slot.lock.lock().await;
        self.store.get(session_id).await
    }

    /// Empties the session's history.
    pub async fn clear(&self, session_id: &SessionId) -> Result<(), RelayError> {
        let slot = self.slot(session_id);
        let _guard = slot.lock.lock().await;
        self.store.clear(session_id).await?;
        info!(session = %session_id, "history cleared");
        Ok(())
    }

    /// Number of sessions with a live lock entry.
    pub fn active_sessions(&self) -> usize {
        self.locks.len()
    }

    fn slot(&self, session_id: &SessionId) -> SessionSlot<'_> {
        // The shard guard is released before the caller awaits the lock.
        let lock = Arc::clone(self.locks.entry(session_id.clone()).or_default().value());
        SessionSlot {
            locks: &self.locks,
            id: session_id.clone(),
            lock,
        }
    }
}

/// Treats an absent or whitespace-only optional value as the default.
fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
