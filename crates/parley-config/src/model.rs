// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of silently ignored.

use parley_core::types::ModelEntry;
use serde::{Deserialize, Serialize};

/// Top-level Parley configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Primary chat-completion endpoint used for generation.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Secondary endpoint used for conversation naming and image description.
    #[serde(default)]
    pub secondary: SecondaryConfig,

    /// Worker pool and replay sizing.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Model catalog, in `[[models]]` tables.
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

impl ParleyConfig {
    /// Finds a catalog entry by display name, falling back to upstream id.
    pub fn find_model(&self, selector: &str) -> Option<&ModelEntry> {
        ModelEntry::lookup(&self.models, selector)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journaling.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// An OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL up to and including the version segment.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bearer key. `None` falls back to the `OPENAI_API_KEY` env var.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Whole-request timeout, including the streamed body.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries on 429/500/503 before a stream is established.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecondaryConfig {
    /// Base URL; `None` reuses `upstream.api_base`.
    #[serde(default)]
    pub api_base: Option<String>,

    /// Bearer key; `None` reuses the upstream key.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model that writes conversation titles.
    #[serde(default = "default_naming_model")]
    pub naming_model: String,

    /// Model that describes images for catalog entries without vision.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: None,
            naming_model: default_naming_model(),
            vision_model: default_vision_model(),
        }
    }
}

fn default_naming_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Generations allowed to run at once.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Generations (running plus waiting) above which new ones are rejected.
    #[serde(default = "default_queue_high_water")]
    pub queue_high_water: usize,

    /// Events retained per generation for late observers.
    #[serde(default = "default_replay_cap")]
    pub replay_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_high_water: default_queue_high_water(),
            replay_cap: default_replay_cap(),
        }
    }
}

fn default_workers() -> usize {
    100
}

fn default_queue_high_water() -> usize {
    1000
}

fn default_replay_cap() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::ImageCapability;

    #[test]
    fn models_deserialize_with_defaults() {
        let config: ParleyConfig = toml::from_str(
            r#"
[[models]]
name = "Fast"
id = "fast-1"
points = 1

[[models]]
name = "Deep"
id = "deep-1"
points = 4
reasoning = "deep-1-thinking"
image = "input_output"
tools = true
"#,
        )
        .unwrap();

        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[0].reasoning, "");
        assert_eq!(config.models[0].image, ImageCapability::None);
        assert!(!config.models[0].tools);
        assert_eq!(config.models[1].reasoning, "deep-1-thinking");
        assert_eq!(config.models[1].image, ImageCapability::InputOutput);
        assert!(config.models[1].tools);
    }

    #[test]
    fn model_tables_deny_unknown_fields() {
        let result = toml::from_str::<ParleyConfig>(
            r#"
[[models]]
name = "Fast"
id = "fast-1"
points = 1
price = 3
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn find_model_prefers_name_then_id() {
        let config: ParleyConfig = toml::from_str(
            r#"
[[models]]
name = "alpha"
id = "beta"
points = 1

[[models]]
name = "beta"
id = "gamma"
points = 2
"#,
        )
        .unwrap();

        assert_eq!(config.find_model("beta").unwrap().points, 2);
        assert_eq!(config.find_model("gamma").unwrap().name, "beta");
        assert!(config.find_model("delta").is_none());
    }

    #[test]
    fn engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.workers, 100);
        assert_eq!(engine.queue_high_water, 1000);
        assert_eq!(engine.replay_cap, 1024);
    }
}
