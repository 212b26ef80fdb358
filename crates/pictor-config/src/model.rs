// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Pictor service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Pictor configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PictorConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Interactive collection settings.
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Reply rendering settings.
    #[serde(default)]
    pub reply: ReplyConfig,

    /// HTTP provider settings shared by every channel.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Remote preset feed settings.
    #[serde(default)]
    pub presets: PresetsConfig,

    /// Command routing table settings.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Direct (non-chat) generation settings.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the service.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "pictor".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
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
        .map(|p| p.join("pictor").join("pictor.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("pictor.db"))
        .to_string_lossy()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Interactive collection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    /// How long to wait for the next message before giving up.
    #[serde(default = "default_collector_timeout_secs")]
    pub timeout_secs: u64,

    /// Default cap on images collected per interaction.
    #[serde(default = "default_max_images")]
    pub max_images: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_collector_timeout_secs(),
            max_images: default_max_images(),
        }
    }
}

fn default_collector_timeout_secs() -> u64 {
    60
}

fn default_max_images() -> usize {
    3
}

/// Reply rendering configuration.
///
/// Templates support `{cost}`, `{balance}`, and `{currency}` placeholders.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyConfig {
    /// Append the balance after a successful generation.
    #[serde(default = "default_true")]
    pub show_balance: bool,

    /// Append the amount charged after a successful generation.
    #[serde(default = "default_true")]
    pub show_cost: bool,

    #[serde(default = "default_balance_template")]
    pub balance_template: String,

    #[serde(default = "default_cost_template")]
    pub cost_template: String,

    #[serde(default = "default_insufficient_balance_template")]
    pub insufficient_balance_template: String,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            show_balance: true,
            show_cost: true,
            balance_template: default_balance_template(),
            cost_template: default_cost_template(),
            insufficient_balance_template: default_insufficient_balance_template(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_balance_template() -> String {
    "💰 Balance: {balance} {currency}".to_string()
}

fn default_cost_template() -> String {
    "💸 Cost: {cost} {currency}".to_string()
}

fn default_insufficient_balance_template() -> String {
    "❌ Insufficient balance! Need {cost} {currency}, current balance: {balance} {currency}"
        .to_string()
}

/// HTTP provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Per-request timeout for provider HTTP calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries on transient HTTP statuses (429, 500, 502, 503).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

/// Remote preset feed configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresetsConfig {
    /// Pull presets from the remote feed.
    #[serde(default = "default_true")]
    pub sync_enabled: bool,

    /// Feed URL returning `{ "data": [{ "title", "prompt" }] }`.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            sync_enabled: true,
            feed_url: default_feed_url(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

fn default_feed_url() -> String {
    "https://prompt.vioaki.xyz/api/list".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    3600
}

/// Command routing table configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Quiet period before a requested table rebuild runs.
    #[serde(default = "default_reload_debounce_ms")]
    pub reload_debounce_ms: u64,

    /// Periodic rebuild interval, picking up catalog edits made elsewhere.
    #[serde(default = "default_routing_refresh_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            reload_debounce_ms: default_reload_debounce_ms(),
            refresh_interval_secs: default_routing_refresh_secs(),
        }
    }
}

fn default_reload_debounce_ms() -> u64 {
    300
}

fn default_routing_refresh_secs() -> u64 {
    30
}

/// Direct generation configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
    /// Ledger account charged for generations started from the CLI.
    /// `None` runs them uncharged.
    #[serde(default)]
    pub user_id: Option<String>,
}
