// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./pictor.toml` > `~/.config/pictor/pictor.toml` > `/etc/pictor/pictor.toml`
//! with environment variable overrides via `PICTOR_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PictorConfig;

/// Top-level sections that environment variables may address.
const SECTIONS: &[&str] = &[
    "agent",
    "storage",
    "collector",
    "reply",
    "provider",
    "presets",
    "routing",
    "admin",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pictor/pictor.toml` (system-wide)
/// 3. `~/.config/pictor/pictor.toml` (user XDG config)
/// 4. `./pictor.toml` (local directory)
/// 5. `PICTOR_*` environment variables
pub fn load_config() -> Result<PictorConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PictorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PictorConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PictorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PictorConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PictorConfig::default()))
        .merge(Toml::file("/etc/pictor/pictor.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("pictor/pictor.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("pictor.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `PICTOR_COLLECTOR_MAX_IMAGES` must map to
/// `collector.max_images`, not `collector.max.images`.
fn env_provider() -> Env {
    Env::prefixed("PICTOR_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}
