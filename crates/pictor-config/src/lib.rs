// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Pictor image generation service.
//!
//! TOML configuration with strict key checking (`deny_unknown_fields`),
//! XDG file lookup, `PICTOR_*` environment overrides, and miette
//! diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use pictor_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("collector timeout: {}s", config.collector.timeout_secs);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::PictorConfig;

/// Load configuration from the XDG hierarchy and validate it.
pub fn load_and_validate() -> Result<PictorConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<PictorConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<PictorConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Serialize the effective configuration back to TOML.
pub fn to_toml_string(config: &PictorConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::Other(e.to_string()))
}

#[allow(clippy::result_large_err)]
fn finish(
    loaded: Result<PictorConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<PictorConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Read the TOML files of the XDG hierarchy for error span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = vec![std::path::PathBuf::from("/etc/pictor/pictor.toml")];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("pictor/pictor.toml"));
    }
    candidates.push(
        std::env::current_dir()
            .map(|d| d.join("pictor.toml"))
            .unwrap_or_else(|_| "pictor.toml".into()),
    );

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
