// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the chatrelay service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level chatrelay configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// HTTP listener and logging settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote inference endpoint settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Conversation defaults.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Per-client admission limits for the chat operation.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Session cookie and retention settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Derive client identity from the first `X-Forwarded-For` hop.
    /// Only enable behind a proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            trust_forwarded_for: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Upstream inference endpoint configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Endpoint URL receiving the chat payload.
    #[serde(default = "default_upstream_url")]
    pub url: String,

    /// Bearer token. `None` requires `CHATRELAY_UPSTREAM_API_TOKEN`.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-attempt transport timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Total time budget for one send, including retries, in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Maximum number of attempts per send (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay before the first retry, in milliseconds. Doubles per retry.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on any single retry delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[redacted]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("deadline_secs", &self.deadline_secs)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .finish()
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            deadline_secs: default_deadline_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_upstream_url() -> String {
    "http://guanaco-submitter.guanaco-backend.k2.chaiverse.com/endpoints/onsite/chat".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_deadline_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

/// Conversation defaults applied when a chat request omits them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Bot name used when the request does not supply one.
    #[serde(default = "default_bot_name")]
    pub default_bot_name: String,

    /// User name used when the request does not supply one.
    #[serde(default = "default_user_name")]
    pub default_user_name: String,

    /// Prompt preamble used when the request has no `custom_prompt`.
    #[serde(default = "default_safety_prompt")]
    pub safety_prompt: String,

    /// Memory note sent with every request.
    #[serde(default)]
    pub memory: String,

    /// Maximum number of prior messages sent upstream. `0` sends all.
    /// Stored history is never truncated.
    #[serde(default)]
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_bot_name: default_bot_name(),
            default_user_name: default_user_name(),
            safety_prompt: default_safety_prompt(),
            memory: String::new(),
            history_limit: 0,
        }
    }
}

fn default_bot_name() -> String {
    "Assistant".to_string()
}

fn default_user_name() -> String {
    "User".to_string()
}

fn default_safety_prompt() -> String {
    "This conversation must be family friendly. Avoid using profanity, or being rude. \
     Be courteous and use language which is appropriate for any audience. \
     Avoid NSFW content. ###"
        .to_string()
}

/// Sliding-window admission limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Requests admitted per identity within one window.
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Idle identities are evicted after this many whole windows.
    #[serde(default = "default_eviction_windows")]
    pub eviction_windows: u32,

    /// How often the background sweeper runs, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            eviction_windows: default_eviction_windows(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_max_requests() -> usize {
    5
}

fn default_window_secs() -> u64 {
    60
}

fn default_eviction_windows() -> u32 {
    2
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Session cookie and retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Sessions untouched for this many seconds are dropped. `0` keeps them
    /// for the life of the process.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

impl SessionConfig {
    /// Idle TTL, or `None` when eviction is disabled.
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            idle_ttl_secs: default_idle_ttl_secs(),
        }
    }
}

fn default_cookie_name() -> String {
    "session_id".to_string()
}

fn default_idle_ttl_secs() -> u64 {
    86_400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_debug_redacts_token() {
        let config = UpstreamConfig {
            api_token: Some("CR_secret".to_string()),
            ..UpstreamConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("CR_secret"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn duration_helpers() {
        let config = RelayConfig::default();
        assert_eq!(config.upstream.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.upstream.backoff_base(), Duration::from_secs(1));
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(config.session.idle_ttl(), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn zero_idle_ttl_disables_eviction() {
        let config = SessionConfig {
            idle_ttl_secs: 0,
            ..SessionConfig::default()
        };
        assert!(config.idle_ttl().is_none());
    }

    #[test]
    fn safety_prompt_default_ends_with_marker() {
        let chat = ChatConfig::default();
        assert!(chat.safety_prompt.starts_with("This conversation must be family friendly."));
        assert!(chat.safety_prompt.ends_with("###"));
    }
}
