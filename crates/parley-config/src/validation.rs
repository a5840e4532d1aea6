// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.upstream.api_base.trim().is_empty() {
        errors.push(ConfigError::validation("upstream.api_base must not be empty"));
    }

    let engine = &config.engine;
    if engine.workers < 1 {
        errors.push(ConfigError::validation(format!(
            "engine.workers must be at least 1, got {}",
            engine.workers
        )));
    }
    if engine.replay_cap < 1 {
        errors.push(ConfigError::validation(format!(
            "engine.replay_cap must be at least 1, got {}",
            engine.replay_cap
        )));
    }
    if engine.queue_high_water < engine.workers {
        errors.push(ConfigError::validation(format!(
            "engine.queue_high_water ({}) must not be below engine.workers ({})",
            engine.queue_high_water, engine.workers
        )));
    }

    let mut seen = HashSet::new();
    for (i, model) in config.models.iter().enumerate() {
        if model.name.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "models[{i}].name must not be empty"
            )));
        } else if !seen.insert(model.name.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate model name `{}` in [[models]] array",
                model.name
            )));
        }
        if model.id.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "models[{i}].id must not be empty"
            )));
        }
        if model.points < 0 {
            errors.push(ConfigError::validation(format!(
                "models[{i}].points must be non-negative, got {}",
                model.points
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
