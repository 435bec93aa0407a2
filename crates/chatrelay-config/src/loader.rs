// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./chatrelay.toml` > `~/.config/chatrelay/chatrelay.toml` > `/etc/chatrelay/chatrelay.toml`
//! with environment variable overrides via `CHATRELAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::RelayConfig;

/// Config sections, used to map `CHATRELAY_<SECTION>_<KEY>` onto `section.key`.
const SECTIONS: &[&str] = &["server", "upstream", "chat", "rate_limit", "session"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatrelay/chatrelay.toml` (system-wide)
/// 3. `~/.config/chatrelay/chatrelay.toml` (user XDG config)
/// 4. `./chatrelay.toml` (local directory)
/// 5. `CHATRELAY_*` environment variables
pub fn load_config() -> Result<RelayConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::file("/etc/chatrelay/chatrelay.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chatrelay/chatrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chatrelay.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `CHATRELAY_UPSTREAM_API_TOKEN` to
/// `upstream.api_token`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because both section
/// names (`rate_limit`) and keys (`api_token`) contain underscores.
fn env_provider() -> Env {
    Env::prefixed("CHATRELAY_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
///
/// Keys that do not start with a known section are passed through unchanged
/// so that `deny_unknown_fields` reports them.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
