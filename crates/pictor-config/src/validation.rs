// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::PictorConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of stopping at the first.
pub fn validate_config(config: &PictorConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "agent.log_level `{}` must be one of: {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.collector.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "collector.timeout_secs must be greater than 0",
        ));
    }

    if config.collector.max_images == 0 {
        errors.push(ConfigError::validation(
            "collector.max_images must be at least 1",
        ));
    }

    if config.provider.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "provider.request_timeout_secs must be greater than 0",
        ));
    }

    for (key, template) in [
        ("reply.balance_template", &config.reply.balance_template),
        ("reply.cost_template", &config.reply.cost_template),
        (
            "reply.insufficient_balance_template",
            &config.reply.insufficient_balance_template,
        ),
    ] {
        if template.trim().is_empty() {
            errors.push(ConfigError::validation(format!("{key} must not be empty")));
        }
    }

    if config.presets.sync_enabled {
        let url = config.presets.feed_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "presets.feed_url `{url}` must be an http(s) URL"
            )));
        }
        if config.presets.refresh_interval_secs == 0 {
            errors.push(ConfigError::validation(
                "presets.refresh_interval_secs must be greater than 0",
            ));
        }
    }

    if let Some(user_id) = &config.admin.user_id
        && user_id.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "admin.user_id must not be blank; remove it to run direct generations uncharged",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
