// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Pictor service.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter in the plugin architecture.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Provider,
    Storage,
    Ledger,
}

// --- Identity ---

/// Who a collection or generation call is scoped to: a user in a chat
/// channel, optionally inside a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: Option<String>,
    pub channel_id: String,
    pub guild_id: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            channel_id: channel_id.into(),
            guild_id: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    /// The (user, channel, guild) triple used to key outstanding waits.
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            user_id: self.user_id.clone(),
            channel_id: self.channel_id.clone(),
            guild_id: self.guild_id.clone(),
        }
    }

    /// Whether this identity maps to a ledger account. Anonymous callers
    /// (empty user id) are never charged.
    pub fn has_account(&self) -> bool {
        !self.user_id.trim().is_empty()
    }
}

/// Hashable key form of an [`Identity`]; the username is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub user_id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.guild_id {
            Some(guild) => write!(f, "{}@{}/{}", self.user_id, self.channel_id, guild),
            None => write!(f, "{}@{}", self.user_id, self.channel_id),
        }
    }
}

// --- Images ---

/// A binary image supplied by a user.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

impl ImageFile {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            filename: filename.into(),
        }
    }
}

// Keep raw bytes out of logs.
impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// --- Chat transport types ---

/// One chat turn received from a transport.
#[derive(Debug, Clone)]
pub struct InboundTurn {
    pub identity: Identity,
    pub text: String,
    pub images: Vec<ImageFile>,
}

/// A reply sent back to an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    /// Image URLs (or data URLs) to attach.
    pub images: Vec<String>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }
}

// --- Channels ---

/// Discriminator for the provider backend bound to a channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    ImageApi,
    ChatRender,
}

/// Backend parameters for a channel, one variant per provider kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ProviderSpec {
    /// DALL·E-style JSON image generation endpoint.
    ImageApi {
        api_url: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_image_model")]
        model: String,
        #[serde(default)]
        n: Option<u32>,
        #[serde(default)]
        size: Option<String>,
        #[serde(default)]
        quality: Option<String>,
        #[serde(default)]
        style: Option<String>,
    },
    /// Chat-completions model whose reply embeds image URLs.
    ChatRender {
        api_url: String,
        #[serde(default)]
        api_key: Option<String>,
        model: String,
    },
}

fn default_image_model() -> String {
    "nano-banana".to_string()
}

impl ProviderSpec {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderSpec::ImageApi { .. } => ProviderKind::ImageApi,
            ProviderSpec::ChatRender { .. } => ProviderKind::ChatRender,
        }
    }

    pub fn api_url(&self) -> &str {
        match self {
            ProviderSpec::ImageApi { api_url, .. } | ProviderSpec::ChatRender { api_url, .. } => {
                api_url
            }
        }
    }
}

/// A named, priced binding of a provider backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub description: Option<String>,
    pub provider: ProviderSpec,
    /// Price per generation; `0` means free.
    pub cost: f64,
    pub currency: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields supplied when creating or replacing a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDraft {
    pub name: String,
    pub enabled: bool,
    pub description: Option<String>,
    pub provider: ProviderSpec,
    pub cost: f64,
    pub currency: String,
}

// --- Presets ---

/// Where a preset came from. Remote sync only ever touches `Api` presets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PresetSource {
    Api,
    User,
}

/// Placeholder replaced by the user's text inside a preset template.
pub const USER_TEXT_PLACEHOLDER: &str = "{{userText}}";

/// A reusable prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetTemplate {
    pub id: i64,
    pub name: String,
    pub prompt_template: String,
    pub source: PresetSource,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields supplied when creating or editing a preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetDraft {
    pub name: String,
    pub prompt_template: String,
    pub enabled: bool,
}

/// A preset as published by the remote feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePreset {
    pub title: String,
    pub prompt: String,
}

/// Counts reported by a remote preset sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

// --- Tasks ---

/// Lifecycle of a persisted generation attempt.
///
/// `pending -> processing -> {success, failed}`, and `failed -> refunded`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Refunded,
}

impl TaskStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Success)
                | (Processing, Failed)
                | (Failed, Refunded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Refunded
        )
    }
}

/// One persisted generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: i64,
    pub identity: Identity,
    pub channel_ref: i64,
    pub channel_name: String,
    pub preset_ref: Option<i64>,
    pub preset_name: Option<String>,
    pub user_input: String,
    pub final_prompt: String,
    /// Filenames of the input images.
    pub input_images: Vec<String>,
    /// Output URLs, empty until success.
    pub output_images: Vec<String>,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub cost: f64,
    pub currency: String,
    pub charged: bool,
    pub refunded: bool,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_ms: i64,
}

/// Row contents for a new task; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub identity: Identity,
    pub channel_ref: i64,
    pub channel_name: String,
    pub preset_ref: Option<i64>,
    pub preset_name: Option<String>,
    pub user_input: String,
    pub final_prompt: String,
    pub input_images: Vec<String>,
    pub status: TaskStatus,
    pub cost: f64,
    pub currency: String,
    pub charged: bool,
    pub start_time: String,
}

/// Partial update applied to a task row. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub output_images: Option<Vec<String>>,
    pub error: Option<String>,
    pub refunded: Option<bool>,
    pub end_time: Option<String>,
    pub duration_ms: Option<i64>,
}

/// Filter for task listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub user_id: Option<String>,
}

/// One page of a task listing.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    pub tasks: Vec<GenerationTask>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

/// Current time in the ISO 8601 form used for every persisted timestamp.
///
/// Matches SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
