// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Parley configuration system.

use parley_config::diagnostic::ConfigError;
use parley_config::model::ParleyConfig;
use parley_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 9000
log_level = "debug"

[storage]
database_path = "/tmp/parley.db"
wal_mode = false

[upstream]
api_base = "http://localhost:4000/v1"
api_key = "sk-up"
timeout_secs = 60
max_retries = 0

[secondary]
api_key = "sk-second"
naming_model = "namer"
vision_model = "looker"

[engine]
workers = 4
queue_high_water = 8
replay_cap = 16

[[models]]
name = "Chat"
id = "chat-1"
points = 3
reasoning = "chat-1-r"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/parley.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.upstream.api_base, "http://localhost:4000/v1");
    assert_eq!(config.upstream.api_key.as_deref(), Some("sk-up"));
    assert_eq!(config.upstream.timeout_secs, 60);
    assert_eq!(config.upstream.max_retries, 0);
    assert!(config.secondary.api_base.is_none());
    assert_eq!(config.secondary.naming_model, "namer");
    assert_eq!(config.secondary.vision_model, "looker");
    assert_eq!(config.engine.workers, 4);
    assert_eq!(config.engine.queue_high_water, 8);
    assert_eq!(config.engine.replay_cap, 16);
    assert_eq!(config.models[0].reasoning, "chat-1-r");
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.log_level, "info");
    assert!(config.storage.wal_mode);
    assert!(config.storage.database_path.ends_with("parley.db"));
    assert_eq!(config.upstream.api_base, "https://api.openai.com/v1");
    assert_eq!(config.upstream.timeout_secs, 300);
    assert_eq!(config.engine.workers, 100);
    assert!(config.models.is_empty());
}

#[test]
fn unknown_key_in_engine_produces_suggestion() {
    let toml = r#"
[engine]
workres = 4
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("should produce an UnknownKey error");
    assert_eq!(unknown.0, "workres");
    assert_eq!(unknown.1.as_deref(), Some("workers"));
}

#[test]
fn wrong_type_produces_invalid_type() {
    let toml = r#"
[server]
port = "eighty"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject bad type");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("port"))));
}

#[test]
fn model_missing_id_produces_missing_key() {
    let toml = r#"
[[models]]
name = "Chat"
points = 1
"#;

    let errors = load_and_validate_str(toml).expect_err("id is required");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::MissingKey { key } if key == "id")));
}

#[test]
fn validation_runs_after_successful_parse() {
    let toml = r#"
[engine]
workers = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero workers is invalid");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("workers"))));
}

#[test]
fn dotted_override_reaches_nested_key() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    // Mirrors what the PARLEY_UPSTREAM_API_KEY env mapping produces.
    let config: ParleyConfig = Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::string("[upstream]\napi_key = \"from-file\"\n"))
        .merge(("upstream.api_key", "from-env"))
        .extract()
        .expect("should merge override");

    assert_eq!(config.upstream.api_key.as_deref(), Some("from-env"));
}

#[test]
fn missing_config_files_are_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: ParleyConfig = Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::file("/nonexistent/path/parley.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.server.port, 8080);
}
