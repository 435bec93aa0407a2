// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the upstream chat endpoint.

use chatrelay_core::{ChatRequest, Message};
use serde::{Deserialize, Serialize};

/// Reply text used when a JSON body carries no `model_output` string.
pub const NO_RESPONSE: &str = "No response";

// --- Request types ---

/// One turn in the upstream `chat_history` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiChatMessage {
    /// Display name of the speaker.
    pub sender: String,
    /// Message text.
    pub message: String,
}

impl From<&Message> for ApiChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            sender: message.sender().to_string(),
            message: message.text().to_string(),
        }
    }
}

/// The JSON body POSTed to the upstream endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatPayload {
    /// Memory note carried across turns (may be empty).
    pub memory: String,
    /// Prompt preamble.
    pub prompt: String,
    pub bot_name: String,
    pub user_name: String,
    /// Prior turns followed by the new user message.
    pub chat_history: Vec<ApiChatMessage>,
}

impl From<&ChatRequest> for ChatPayload {
    fn from(request: &ChatRequest) -> Self {
        Self {
            memory: request.memory_note().to_string(),
            prompt: request.prompt_preamble().to_string(),
            bot_name: request.bot_name().to_string(),
            user_name: request.user_name().to_string(),
            chat_history: request.history().iter().map(ApiChatMessage::from).collect(),
        }
    }
}

// --- Response types ---

/// A successful JSON reply. Other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub model_output: Option<serde_json::Value>,
}

/// Extracts the reply text from a 200 response body.
///
/// JSON bodies yield their `model_output` string, or [`NO_RESPONSE`] when it
/// is absent or not a string. Anything that does not parse as a JSON object
/// is returned as plain text with surrounding whitespace trimmed.
pub fn parse_reply(body: &str) -> String {
    match serde_json::from_str::<ChatReply>(body) {
        Ok(reply) => match reply.model_output {
            Some(serde_json::Value::String(text)) => text,
            _ => NO_RESPONSE.to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}
