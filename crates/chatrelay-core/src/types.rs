// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation records shared by the gateway and the upstream client.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Opaque identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Health status reported by collaborator health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

/// A single turn in a conversation.
///
/// Messages are immutable once created. `created_at` is kept for history
/// display and is not part of the upstream payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    sender: String,
    text: String,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a message stamped with the current time.
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ordered, append-only sequence of messages belonging to one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the end of the history.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns at most the `limit` most recent messages. `0` means no limit.
    pub fn recent(&self, limit: usize) -> &[Message] {
        if limit == 0 || limit >= self.messages.len() {
            &self.messages
        } else {
            &self.messages[self.messages.len() - limit..]
        }
    }
}

impl From<Vec<Message>> for ConversationHistory {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// A fully composed request for the upstream endpoint.
///
/// Built once per outbound call and never mutated afterwards. The history
/// always ends with the new user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    prompt_preamble: String,
    bot_name: String,
    user_name: String,
    history: Vec<Message>,
    memory_note: String,
}

impl ChatRequest {
    /// Composes a request from prior turns plus the new user message.
    ///
    /// Rejects empty names and an empty user message. The user message is
    /// appended as the final history entry, attributed to `user_name`.
    pub fn compose(
        prompt_preamble: impl Into<String>,
        bot_name: impl Into<String>,
        user_name: impl Into<String>,
        prior: &[Message],
        user_message: &str,
    ) -> Result<Self, RelayError> {
        let bot_name = bot_name.into();
        let user_name = user_name.into();

        if bot_name.trim().is_empty() {
            return Err(RelayError::Validation("bot name must not be empty".into()));
        }
        if user_name.trim().is_empty() {
            return Err(RelayError::Validation("user name must not be empty".into()));
        }
        if user_message.trim().is_empty() {
            return Err(RelayError::Validation("empty message not allowed".into()));
        }

        let mut history = Vec::with_capacity(prior.len() + 1);
        history.extend_from_slice(prior);
        history.push(Message::new(user_name.clone(), user_message));

        Ok(Self {
            prompt_preamble: prompt_preamble.into(),
            bot_name,
            user_name,
            history,
            memory_note: String::new(),
        })
    }

    /// Attaches a memory note, consuming the request.
    pub fn with_memory(mut self, memory_note: impl Into<String>) -> Self {
        self.memory_note = memory_note.into();
        self
    }

    pub fn prompt_preamble(&self) -> &str {
        &self.prompt_preamble
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn memory_note(&self) -> &str {
        &self.memory_note
    }

    /// The new user message (always the final history entry).
    pub fn user_message(&self) -> &Message {
        // compose() always pushes the user message, so history is never empty.
        &self.history[self.history.len() - 1]
    }
}
