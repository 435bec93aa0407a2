// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the chatrelay configuration system.

use chatrelay_config::diagnostic::ConfigError;
use chatrelay_config::model::RelayConfig;
use chatrelay_config::{load_and_validate_str, load_config, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_relay_config() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 8080
log_level = "debug"
trust_forwarded_for = true

[upstream]
url = "https://inference.example.com/chat"
api_token = "CR_test"
request_timeout_secs = 10
deadline_secs = 45
max_attempts = 4
backoff_base_ms = 250
max_backoff_ms = 4000

[chat]
default_bot_name = "Nova"
default_user_name = "Guest"
safety_prompt = "Be kind. ###"
memory = "The user prefers short answers."
history_limit = 40

[rate_limit]
max_requests = 10
window_secs = 30
eviction_windows = 3
sweep_interval_secs = 15

[session]
cookie_name = "relay_sid"
idle_ttl_secs = 0
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.log_level, "debug");
    assert!(config.server.trust_forwarded_for);
    assert_eq!(config.upstream.url, "https://inference.example.com/chat");
    assert_eq!(config.upstream.api_token.as_deref(), Some("CR_test"));
    assert_eq!(config.upstream.request_timeout_secs, 10);
    assert_eq!(config.upstream.deadline_secs, 45);
    assert_eq!(config.upstream.max_attempts, 4);
    assert_eq!(config.upstream.backoff_base_ms, 250);
    assert_eq!(config.upstream.max_backoff_ms, 4000);
    assert_eq!(config.chat.default_bot_name, "Nova");
    assert_eq!(config.chat.default_user_name, "Guest");
    assert_eq!(config.chat.safety_prompt, "Be kind. ###");
    assert_eq!(config.chat.memory, "The user prefers short answers.");
    assert_eq!(config.chat.history_limit, 40);
    assert_eq!(config.rate_limit.max_requests, 10);
    assert_eq!(config.rate_limit.window_secs, 30);
    assert_eq!(config.rate_limit.eviction_windows, 3);
    assert_eq!(config.rate_limit.sweep_interval_secs, 15);
    assert_eq!(config.session.cookie_name, "relay_sid");
    assert!(config.session.idle_ttl().is_none());
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.server.log_level, "info");
    assert!(!config.server.trust_forwarded_for);
    assert!(config.upstream.api_token.is_none());
    assert_eq!(config.upstream.request_timeout_secs, 30);
    assert_eq!(config.upstream.max_attempts, 3);
    assert_eq!(config.upstream.backoff_base_ms, 1000);
    assert_eq!(config.chat.default_bot_name, "Assistant");
    assert_eq!(config.chat.default_user_name, "User");
    assert_eq!(config.chat.memory, "");
    assert_eq!(config.chat.history_limit, 0);
    assert_eq!(config.rate_limit.max_requests, 5);
    assert_eq!(config.rate_limit.window_secs, 60);
    assert_eq!(config.session.cookie_name, "session_id");
}

/// Unknown field in [upstream] is rejected.
#[test]
fn unknown_field_in_upstream_produces_error() {
    let toml = r#"
[upstream]
api_tokn = "abc"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("api_tokn"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[telemetry]
enabled = true
"#;

    let err = load_config_from_str(toml).expect_err("unknown section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("telemetry"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Unknown key diagnostics carry a suggestion, the valid keys, and a span.
#[test]
fn diagnostic_unknown_key_has_suggestion_and_span() {
    let toml = r#"
[rate_limit]
max_requets = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key,
                suggestion,
                valid_keys,
                span,
                ..
            } => Some((key, suggestion, valid_keys, span)),
            _ => None,
        })
        .expect("should have an UnknownKey error");

    assert_eq!(unknown.0, "max_requets");
    assert_eq!(unknown.1.as_deref(), Some("max_requests"));
    assert!(unknown.2.contains("window_secs"));
    assert!(unknown.3.is_some(), "inline source should yield a span");
}

/// Invalid type (string where number expected) produces clear message.
#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[server]
port = "eighty"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("port"))),
        "got: {errors:?}"
    );
}

/// Validation errors surface through load_and_validate_str.
#[test]
fn validation_catches_zero_quota() {
    let toml = r#"
[rate_limit]
max_requests = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero quota should fail");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("max_requests"))
    ));
}

/// ConfigError renders with miette's graphical handler.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "max_requets".to_string(),
        suggestion: Some("max_requests".to_string()),
        valid_keys: "max_requests, window_secs".to_string(),
        span: None,
        src: None,
    };

    let help = error.help().expect("should have help text").to_string();
    assert!(help.contains("did you mean `max_requests`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("max_requets"));
}

/// The TOML file and `CHATRELAY_*` env vars are layered in order.
#[test]
fn env_vars_override_local_toml() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "chatrelay.toml",
            r#"
[upstream]
api_token = "from-file"
max_attempts = 2

[rate_limit]
window_secs = 30
"#,
        )?;
        jail.set_env("CHATRELAY_UPSTREAM_API_TOKEN", "from-env");
        jail.set_env("CHATRELAY_RATE_LIMIT_MAX_REQUESTS", "7");

        let config: RelayConfig = load_config()?;
        assert_eq!(config.upstream.api_token.as_deref(), Some("from-env"));
        assert_eq!(config.upstream.max_attempts, 2);
        assert_eq!(config.rate_limit.window_secs, 30);
        assert_eq!(config.rate_limit.max_requests, 7);
        Ok(())
    });
}

/// Missing config files are silently skipped.
#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: RelayConfig = Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::file("/nonexistent/path/chatrelay.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.server.port, 5000);
}

/// Serialized config round-trips through the TOML format users edit.
#[test]
fn default_config_serializes_to_loadable_toml() {
    let rendered = toml::to_string_pretty(&RelayConfig::default()).expect("should serialize");
    assert!(rendered.contains("[rate_limit]"));
    let config = load_and_validate_str(&rendered).expect("rendered defaults should load");
    assert_eq!(config.chat.default_bot_name, "Assistant");
}
