// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog, task and balance administration subcommands, plus direct
//! generation that bypasses the chat collector.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use colored::Colorize;
use pictor_agent::{GenerationRequest, PresetFeed, ReplyTemplates};
use pictor_config::PictorConfig;
use pictor_core::types::{
    ChannelConfig, ChannelDraft, GenerationTask, PresetDraft, PresetTemplate, ProviderKind,
    ProviderSpec, TaskFilter, TaskStatus,
};
use pictor_core::{CatalogStore, Identity, Ledger, PictorError, TaskStore};
use pictor_provider::image::truncate_for_log;

use crate::console::load_image;
use crate::services::Services;

const DEFAULT_IMAGE_MODEL: &str = "nano-banana";

/// Provider backend selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    ImageApi,
    ChatRender,
}

impl From<KindArg> for ProviderKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::ImageApi => ProviderKind::ImageApi,
            KindArg::ChatRender => ProviderKind::ChatRender,
        }
    }
}

/// Channel fields; on update, omitted fields keep their stored value.
#[derive(Args, Debug, Clone, Default)]
pub struct ChannelFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,
    #[arg(long)]
    pub api_url: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    /// Images per request (image-api only).
    #[arg(long)]
    pub n: Option<u32>,
    #[arg(long)]
    pub size: Option<String>,
    #[arg(long)]
    pub quality: Option<String>,
    #[arg(long)]
    pub style: Option<String>,
    /// Price per generation; 0 is free.
    #[arg(long)]
    pub cost: Option<f64>,
    #[arg(long)]
    pub currency: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

impl ChannelFields {
    /// Merges these fields over `base` into a complete draft.
    ///
    /// Switching the provider kind drops the old kind's parameters except
    /// the URL and key.
    pub fn into_draft(self, base: Option<&ChannelConfig>) -> Result<ChannelDraft, PictorError> {
        let prev = base.map(|c| &c.provider);
        let kind = self
            .kind
            .map(ProviderKind::from)
            .or_else(|| prev.map(ProviderSpec::kind))
            .ok_or_else(|| PictorError::Validation("--kind is required".into()))?;
        let api_url = self
            .api_url
            .or_else(|| prev.map(|p| p.api_url().to_string()))
            .ok_or_else(|| PictorError::Validation("--api-url is required".into()))?;
        let prev_key = match prev {
            Some(ProviderSpec::ImageApi { api_key, .. })
            | Some(ProviderSpec::ChatRender { api_key, .. }) => api_key.clone(),
            None => None,
        };
        let api_key = self.api_key.or(prev_key);

        let provider = match kind {
            ProviderKind::ImageApi => {
                let (model, n, size, quality, style) = match prev {
                    Some(ProviderSpec::ImageApi {
                        model,
                        n,
                        size,
                        quality,
                        style,
                        ..
                    }) => (
                        Some(model.clone()),
                        *n,
                        size.clone(),
                        quality.clone(),
                        style.clone(),
                    ),
                    _ => Default::default(),
                };
                ProviderSpec::ImageApi {
                    api_url,
                    api_key,
                    model: self
                        .model
                        .or(model)
                        .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
                    n: self.n.or(n),
                    size: self.size.or(size),
                    quality: self.quality.or(quality),
                    style: self.style.or(style),
                }
            }
            ProviderKind::ChatRender => {
                let model = match prev {
                    Some(ProviderSpec::ChatRender { model, .. }) => Some(model.clone()),
                    _ => None,
                };
                ProviderSpec::ChatRender {
                    api_url,
                    api_key,
                    model: self.model.or(model).ok_or_else(|| {
                        PictorError::Validation(
                            "--model is required for chat-render channels".into(),
                        )
                    })?,
                }
            }
        };

        Ok(ChannelDraft {
            name: self
                .name
                .or_else(|| base.map(|c| c.name.clone()))
                .ok_or_else(|| PictorError::Validation("--name is required".into()))?,
            enabled: base.map(|c| c.enabled).unwrap_or(true),
            description: self
                .description
                .or_else(|| base.and_then(|c| c.description.clone())),
            provider,
            cost: self.cost.or(base.map(|c| c.cost)).unwrap_or(0.0),
            currency: self
                .currency
                .or_else(|| base.map(|c| c.currency.clone()))
                .unwrap_or_default(),
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum ChannelCommand {
    /// List channels.
    List {
        /// Only enabled channels.
        #[arg(long)]
        enabled: bool,
    },
    /// Show one channel.
    Show { id: i64 },
    /// Create an enabled channel.
    Add(ChannelFields),
    /// Edit a channel.
    Update {
        id: i64,
        #[command(flatten)]
        fields: ChannelFields,
    },
    Enable { id: i64 },
    Disable { id: i64 },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum PresetCommand {
    /// List presets.
    List {
        #[arg(long)]
        enabled: bool,
    },
    Show { id: i64 },
    /// Create a user preset. `{{userText}}` marks where chat text goes.
    Add {
        name: String,
        template: String,
        #[arg(long)]
        disabled: bool,
    },
    /// Edit a preset; an api preset becomes a user preset.
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        template: Option<String>,
    },
    Enable { id: i64 },
    Disable { id: i64 },
    /// Duplicate a preset as a user preset.
    Copy { id: i64 },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// List tasks, newest first.
    List {
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Print the page as JSON.
        #[arg(long)]
        json: bool,
    },
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    Delete { id: i64 },
    /// Refund a failed, charged task whose automatic refund did not go through.
    Refund { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum BalanceCommand {
    Show {
        user: String,
        #[arg(long, default_value = "default")]
        currency: String,
    },
    /// Credit an account.
    Grant {
        user: String,
        amount: f64,
        #[arg(long, default_value = "default")]
        currency: String,
    },
    /// Recent charges and credits.
    History {
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

/// Arguments of `pictor generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[arg(long)]
    pub channel: i64,
    #[arg(long)]
    pub preset: Option<i64>,
    /// Input image file; repeatable.
    #[arg(long = "image")]
    pub images: Vec<PathBuf>,
    pub text: Vec<String>,
}

pub async fn run_channel(services: &Services, cmd: ChannelCommand) -> Result<(), PictorError> {
    let storage = &services.storage;
    match cmd {
        ChannelCommand::List { enabled } => {
            let channels = storage.list_channels(enabled).await?;
            if channels.is_empty() {
                println!("No channels.");
            }
            for channel in &channels {
                println!("{}", channel_line(channel));
            }
        }
        ChannelCommand::Show { id } => {
            let channel = require_channel(services, id).await?;
            println!("{}", channel_line(&channel));
            if let Some(description) = &channel.description {
                println!("  description: {description}");
            }
            println!("  provider:    {}", channel.provider.kind());
            println!("  api url:     {}", channel.provider.api_url());
            match &channel.provider {
                ProviderSpec::ImageApi { model, size, .. } => {
                    println!("  model:       {model}");
                    if let Some(size) = size {
                        println!("  size:        {size}");
                    }
                }
                ProviderSpec::ChatRender { model, .. } => println!("  model:       {model}"),
            }
            println!("  updated:     {}", channel.updated_at);
        }
        ChannelCommand::Add(fields) => {
            let draft = fields.into_draft(None)?;
            let id = storage.create_channel(&draft).await?;
            println!("{} channel #{id} {}", "created".green(), draft.name);
        }
        ChannelCommand::Update { id, fields } => {
            let current = require_channel(services, id).await?;
            let draft = fields.into_draft(Some(&current))?;
            storage.update_channel(id, &draft).await?;
            println!("{} channel #{id}", "updated".green());
        }
        ChannelCommand::Enable { id } => {
            storage.set_channel_enabled(id, true).await?;
            println!("{} channel #{id}", "enabled".green());
        }
        ChannelCommand::Disable { id } => {
            storage.set_channel_enabled(id, false).await?;
            println!("{} channel #{id}", "disabled".yellow());
        }
        ChannelCommand::Delete { id } => {
            if !storage.delete_channel(id).await? {
                return Err(PictorError::ChannelNotFound { id });
            }
            println!("{} channel #{id}", "deleted".red());
        }
    }
    Ok(())
}

pub async fn run_preset(services: &Services, cmd: PresetCommand) -> Result<(), PictorError> {
    let storage = &services.storage;
    match cmd {
        PresetCommand::List { enabled } => {
            let presets = storage.list_presets(enabled).await?;
            if presets.is_empty() {
                println!("No presets.");
            }
            for preset in &presets {
                println!("{}", preset_line(preset));
            }
        }
        PresetCommand::Show { id } => {
            let preset = require_preset(services, id).await?;
            println!("{}", preset_line(&preset));
            println!("  template: {}", preset.prompt_template);
            println!("  updated:  {}", preset.updated_at);
        }
        PresetCommand::Add {
            name,
            template,
            disabled,
        } => {
            let id = storage
                .create_preset(&PresetDraft {
                    name: name.clone(),
                    prompt_template: template,
                    enabled: !disabled,
                })
                .await?;
            println!("{} preset #{id} {name}", "created".green());
        }
        PresetCommand::Update { id, name, template } => {
            let current = require_preset(services, id).await?;
            storage
                .update_preset(
                    id,
                    &PresetDraft {
                        name: name.unwrap_or(current.name),
                        prompt_template: template.unwrap_or(current.prompt_template),
                        enabled: current.enabled,
                    },
                )
                .await?;
            println!("{} preset #{id}", "updated".green());
        }
        PresetCommand::Enable { id } => {
            storage.set_preset_enabled(id, true).await?;
            println!("{} preset #{id}", "enabled".green());
        }
        PresetCommand::Disable { id } => {
            storage.set_preset_enabled(id, false).await?;
            println!("{} preset #{id}", "disabled".yellow());
        }
        PresetCommand::Copy { id } => {
            let copy = storage.copy_preset(id).await?;
            println!("{} preset #{id} as #{copy}", "copied".green());
        }
        PresetCommand::Delete { id } => {
            if !storage.delete_preset(id).await? {
                return Err(PictorError::PresetNotFound { id });
            }
            println!("{} preset #{id}", "deleted".red());
        }
    }
    Ok(())
}

pub async fn run_task(services: &Services, cmd: TaskCommand) -> Result<(), PictorError> {
    let storage = &services.storage;
    match cmd {
        TaskCommand::List {
            status,
            user,
            page,
            limit,
            json,
        } => {
            let filter = TaskFilter {
                status,
                user_id: user,
            };
            let page = storage.list_tasks(&filter, page, limit).await?;
            if json {
                println!("{}", to_json(&page)?);
                return Ok(());
            }
            for task in &page.tasks {
                println!("{}", task_line(task));
            }
            println!(
                "page {}/{} ({} tasks)",
                page.page,
                page.total_pages.max(1),
                page.total
            );
        }
        TaskCommand::Show { id, json } => {
            let task = storage
                .get_task(id)
                .await?
                .ok_or_else(|| PictorError::Validation(format!("task #{id} not found")))?;
            if json {
                println!("{}", to_json(&task)?);
                return Ok(());
            }
            println!("{}", task_line(&task));
            println!("  user:    {}", task.identity.key());
            println!("  prompt:  {}", task.final_prompt);
            if !task.input_images.is_empty() {
                println!("  inputs:  {}", task.input_images.join(", "));
            }
            for url in &task.output_images {
                println!("  output:  {}", truncate_for_log(url, 120));
            }
            if let Some(error) = &task.error {
                println!("  error:   {}", error.red());
            }
            println!(
                "  charged: {}  refunded: {}  duration: {}ms",
                task.charged, task.refunded, task.duration_ms
            );
        }
        TaskCommand::Delete { id } => {
            if !storage.delete_task(id).await? {
                return Err(PictorError::Validation(format!("task #{id} not found")));
            }
            println!("{} task #{id}", "deleted".red());
        }
        TaskCommand::Refund { id } => {
            let task = services.orchestrator.settle_refund(id).await?;
            println!(
                "{} task #{id}: {} {} returned to {}",
                "refunded".green(),
                task.cost,
                task.currency,
                task.identity.user_id
            );
        }
    }
    Ok(())
}

pub async fn run_balance(services: &Services, cmd: BalanceCommand) -> Result<(), PictorError> {
    let ledger = &services.ledger;
    match cmd {
        BalanceCommand::Show { user, currency } => {
            let balance = ledger.balance(&user, &currency).await?;
            println!("{user}: {balance} {currency}");
        }
        BalanceCommand::Grant {
            user,
            amount,
            currency,
        } => {
            ledger.gain(&user, amount, &currency).await?;
            let balance = ledger.balance(&user, &currency).await?;
            println!(
                "{} {amount} {currency} to {user}, balance {balance}",
                "granted".green()
            );
        }
        BalanceCommand::History { user, limit } => {
            let entries = ledger.entries(&user, limit).await?;
            if entries.is_empty() {
                println!("No ledger entries for {user}.");
            }
            for entry in &entries {
                println!(
                    "{}  {:<6} {:>10} {}  -> {}",
                    entry.created_at,
                    entry.kind.to_string(),
                    entry.delta, entry.currency, entry.balance_after
                );
            }
        }
    }
    Ok(())
}

pub async fn run_sync_presets(services: &Services, config: &PictorConfig) -> Result<(), PictorError> {
    let feed = PresetFeed::new(
        config.presets.feed_url.clone(),
        Duration::from_secs(config.provider.request_timeout_secs),
    )?;
    let summary = feed.sync(&services.storage).await?;
    println!(
        "{} {} created, {} updated, {} deleted",
        "synced".green(),
        summary.created,
        summary.updated,
        summary.deleted
    );
    Ok(())
}

/// Runs one generation outside the chat loop.
pub async fn run_generate(
    services: &Services,
    config: &PictorConfig,
    args: GenerateArgs,
) -> Result<(), PictorError> {
    let mut images = Vec::with_capacity(args.images.len());
    for path in &args.images {
        images.push(load_image(path).await?);
    }
    let identity = cli_identity(config.admin.user_id.as_deref());

    let report = services
        .orchestrator
        .generate(GenerationRequest {
            channel_id: args.channel,
            preset_id: args.preset,
            user_input: args.text.join(" "),
            images,
            identity,
        })
        .await;

    if let Some(task_id) = report.task_id {
        println!("task #{task_id} ({} ms)", report.duration.as_millis());
    }
    let message = ReplyTemplates::new(&config.reply).render_report(&report);
    match report.outcome {
        Ok(_) => {
            for url in &message.images {
                println!("{}", truncate_for_log(url, 200));
            }
            if !message.text.is_empty() {
                println!("{}", message.text);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Identity used for CLI generation: the configured admin account, or an
/// anonymous caller that is never charged.
pub fn cli_identity(user_id: Option<&str>) -> Identity {
    Identity::new(user_id.unwrap_or_default(), "cli")
}

async fn require_channel(services: &Services, id: i64) -> Result<ChannelConfig, PictorError> {
    services
        .storage
        .get_channel(id)
        .await?
        .ok_or(PictorError::ChannelNotFound { id })
}

async fn require_preset(services: &Services, id: i64) -> Result<PresetTemplate, PictorError> {
    services
        .storage
        .get_preset(id)
        .await?
        .ok_or(PictorError::PresetNotFound { id })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, PictorError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| PictorError::Internal(format!("failed to encode JSON: {e}")))
}

fn enabled_label(enabled: bool) -> String {
    if enabled {
        "enabled".green().to_string()
    } else {
        "disabled".dimmed().to_string()
    }
}

fn channel_line(channel: &ChannelConfig) -> String {
    let price = if channel.cost > 0.0 {
        format!("{} {}", channel.cost, channel.currency)
    } else {
        "free".to_string()
    };
    format!(
        "#{:<4} {} {:<12} {:<14} {}",
        channel.id,
        format!("{:<20}", channel.name).bold(),
        channel.provider.kind().to_string(),
        price,
        enabled_label(channel.enabled)
    )
}

fn preset_line(preset: &PresetTemplate) -> String {
    format!(
        "#{:<4} {} {:<5} {}",
        preset.id,
        format!("{:<24}", preset.name).bold(),
        preset.source.to_string(),
        enabled_label(preset.enabled)
    )
}

fn task_line(task: &GenerationTask) -> String {
    let label = format!("{:<10}", task.status.to_string());
    let status = match task.status {
        TaskStatus::Success => label.green(),
        TaskStatus::Failed => label.red(),
        TaskStatus::Refunded => label.yellow(),
        TaskStatus::Pending | TaskStatus::Processing => label.cyan(),
    };
    let preset = task.preset_name.as_deref().unwrap_or("-");
    format!(
        "#{:<5} {} {:<16} {} / {}  {}",
        task.id, status, task.identity.user_id, task.channel_name, preset, task.start_time
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(provider: ProviderSpec) -> ChannelConfig {
        ChannelConfig {
            id: 7,
            name: "banana".into(),
            enabled: false,
            description: Some("nano".into()),
            provider,
            cost: 10.0,
            currency: "gold".into(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn new_image_api_channel_gets_default_model() {
        let draft = ChannelFields {
            name: Some("banana".into()),
            kind: Some(KindArg::ImageApi),
            api_url: Some("https://api.test/v1/images/generations".into()),
            cost: Some(5.0),
            ..Default::default()
        }
        .into_draft(None)
        .unwrap();

        assert!(draft.enabled);
        assert_eq!(draft.cost, 5.0);
        assert_eq!(draft.currency, "");
        match draft.provider {
            ProviderSpec::ImageApi { model, api_key, .. } => {
                assert_eq!(model, DEFAULT_IMAGE_MODEL);
                assert!(api_key.is_none());
            }
            other => panic!("unexpected provider {other:?}"),
        }
    }

    #[test]
    fn new_channel_requires_name_kind_and_url() {
        let missing_kind = ChannelFields {
            name: Some("x".into()),
            api_url: Some("https://x".into()),
            ..Default::default()
        };
        assert!(missing_kind.into_draft(None).unwrap_err().is_validation());

        let chat_without_model = ChannelFields {
            name: Some("x".into()),
            kind: Some(KindArg::ChatRender),
            api_url: Some("https://x".into()),
            ..Default::default()
        };
        let err = chat_without_model.into_draft(None).unwrap_err();
        assert!(err.to_string().contains("--model"));
    }

    #[test]
    fn update_keeps_unspecified_fields() {
        let base = stored(ProviderSpec::ImageApi {
            api_url: "https://old".into(),
            api_key: Some("sk-old".into()),
            model: "m1".into(),
            n: Some(2),
            size: Some("1024x1024".into()),
            quality: None,
            style: None,
        });
        let draft = ChannelFields {
            cost: Some(0.0),
            style: Some("vivid".into()),
            ..Default::default()
        }
        .into_draft(Some(&base))
        .unwrap();

        assert_eq!(draft.name, "banana");
        assert!(!draft.enabled);
        assert_eq!(draft.cost, 0.0);
        assert_eq!(draft.currency, "gold");
        assert_eq!(draft.description.as_deref(), Some("nano"));
        assert_eq!(
            draft.provider,
            ProviderSpec::ImageApi {
                api_url: "https://old".into(),
                api_key: Some("sk-old".into()),
                model: "m1".into(),
                n: Some(2),
                size: Some("1024x1024".into()),
                quality: None,
                style: Some("vivid".into()),
            }
        );
    }

    #[test]
    fn switching_kind_keeps_url_and_key_only() {
        let base = stored(ProviderSpec::ImageApi {
            api_url: "https://old".into(),
            api_key: Some("sk-old".into()),
            model: "m1".into(),
            n: Some(2),
            size: None,
            quality: None,
            style: None,
        });
        let draft = ChannelFields {
            kind: Some(KindArg::ChatRender),
            model: Some("gemini-image".into()),
            ..Default::default()
        }
        .into_draft(Some(&base))
        .unwrap();

        assert_eq!(
            draft.provider,
            ProviderSpec::ChatRender {
                api_url: "https://old".into(),
                api_key: Some("sk-old".into()),
                model: "gemini-image".into(),
            }
        );
    }

    #[test]
    fn cli_identity_is_anonymous_without_admin_account() {
        assert!(!cli_identity(None).has_account());
        let admin = cli_identity(Some("ops"));
        assert!(admin.has_account());
        assert_eq!(admin.channel_id, "cli");
    }
}
