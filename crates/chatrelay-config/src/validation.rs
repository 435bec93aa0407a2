// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL schemes, non-zero quotas, and ordering between timeouts.

use crate::diagnostic::ConfigError;
use crate::model::RelayConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    // Server
    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    // Upstream
    let url = config.upstream.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        fail(format!(
            "upstream.url must start with http:// or https://, got `{url}`"
        ));
    }
    if config.upstream.max_attempts < 1 {
        fail("upstream.max_attempts must be at least 1".to_string());
    }
    if config.upstream.request_timeout_secs < 1 {
        fail("upstream.request_timeout_secs must be at least 1".to_string());
    }
    if config.upstream.deadline_secs < config.upstream.request_timeout_secs {
        fail(format!(
            "upstream.deadline_secs ({}) must not be shorter than upstream.request_timeout_secs ({})",
            config.upstream.deadline_secs, config.upstream.request_timeout_secs
        ));
    }
    if config.upstream.backoff_base_ms > config.upstream.max_backoff_ms {
        fail(format!(
            "upstream.backoff_base_ms ({}) must not exceed upstream.max_backoff_ms ({})",
            config.upstream.backoff_base_ms, config.upstream.max_backoff_ms
        ));
    }

    // Chat
    if config.chat.default_bot_name.trim().is_empty() {
        fail("chat.default_bot_name must not be empty".to_string());
    }
    if config.chat.default_user_name.trim().is_empty() {
        fail("chat.default_user_name must not be empty".to_string());
    }

    // Rate limit
    if config.rate_limit.max_requests < 1 {
        fail("rate_limit.max_requests must be at least 1".to_string());
    }
    if config.rate_limit.window_secs < 1 {
        fail("rate_limit.window_secs must be at least 1".to_string());
    }
    if config.rate_limit.eviction_windows < 1 {
        fail("rate_limit.eviction_windows must be at least 1".to_string());
    }
    if config.rate_limit.sweep_interval_secs < 1 {
        fail("rate_limit.sweep_interval_secs must be at least 1".to_string());
    }

    // Session
    if config.session.cookie_name.trim().is_empty() {
        fail("session.cookie_name must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
