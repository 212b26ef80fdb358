// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Pictor configuration system.

use std::path::Path;

use pictor_config::diagnostic::ConfigError;
use pictor_config::model::PictorConfig;
use pictor_config::{
    load_and_validate_str, load_config_from_path, load_config_from_str, to_toml_string,
};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[agent]
name = "studio"
log_level = "debug"

[storage]
database_path = "/tmp/pictor-test.db"
wal_mode = false

[collector]
timeout_secs = 30
max_images = 5

[reply]
show_balance = false
cost_template = "spent {cost} {currency}"

[provider]
request_timeout_secs = 90
max_retries = 1

[presets]
sync_enabled = false
feed_url = "https://presets.example/api/list"
refresh_interval_secs = 600

[routing]
reload_debounce_ms = 100

[admin]
user_id = "operator"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "studio");
    assert_eq!(config.agent.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/pictor-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.collector.timeout_secs, 30);
    assert_eq!(config.collector.max_images, 5);
    assert!(!config.reply.show_balance);
    assert!(config.reply.show_cost);
    assert_eq!(config.reply.cost_template, "spent {cost} {currency}");
    assert_eq!(config.provider.request_timeout_secs, 90);
    assert_eq!(config.provider.max_retries, 1);
    assert!(!config.presets.sync_enabled);
    assert_eq!(config.presets.refresh_interval_secs, 600);
    assert_eq!(config.routing.reload_debounce_ms, 100);
    assert_eq!(config.routing.refresh_interval_secs, 30);
    assert_eq!(config.admin.user_id.as_deref(), Some("operator"));
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.agent.name, "pictor");
    assert_eq!(config.collector.timeout_secs, 60);
    assert_eq!(config.collector.max_images, 3);
    assert_eq!(config.provider.max_retries, 3);
    assert_eq!(config.presets.feed_url, "https://prompt.vioaki.xyz/api/list");
    assert_eq!(config.presets.refresh_interval_secs, 3600);
    assert_eq!(config.routing.reload_debounce_ms, 300);
    assert!(config.admin.user_id.is_none());
    assert!(config.reply.insufficient_balance_template.contains("{balance}"));
}

#[test]
fn unknown_key_gets_suggestion() {
    let errors = load_and_validate_str("[collector]\nmax_imgaes = 4\n").unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "max_imgaes");
            assert_eq!(suggestion.as_deref(), Some("max_images"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[collector]\ntimeout_secs = \"soon\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn semantic_validation_runs_after_parse() {
    let errors = load_and_validate_str("[collector]\nmax_images = 0\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "pictor.toml",
            "[collector]\nmax_images = 2\n\n[admin]\nuser_id = \"file-user\"\n",
        )?;
        jail.set_env("PICTOR_COLLECTOR_MAX_IMAGES", "6");
        jail.set_env("PICTOR_ADMIN_USER_ID", "env-user");

        let config = load_config_from_path(Path::new("pictor.toml")).expect("config loads");
        assert_eq!(config.collector.max_images, 6);
        assert_eq!(config.admin.user_id.as_deref(), Some("env-user"));
        Ok(())
    });
}

#[test]
fn effective_config_renders_as_toml() {
    let rendered = to_toml_string(&PictorConfig::default()).unwrap();
    assert!(rendered.contains("[collector]"));
    assert!(rendered.contains("timeout_secs = 60"));
    let reparsed = load_config_from_str(&rendered).unwrap();
    assert_eq!(reparsed.collector.max_images, 3);
}
