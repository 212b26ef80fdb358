// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat command routing built from the channel and preset catalog.
//!
//! `<channel>` shows that channel's preset menu and
//! `<channel>.<preset> [-i <n>] [text...]` starts an interaction. The
//! table is rebuilt from a catalog snapshot and swapped in whole, so a
//! lookup never observes a half-built table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use pictor_config::model::RoutingConfig;
use pictor_core::types::{ChannelConfig, PresetTemplate};
use pictor_core::{CatalogStore, PictorError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::providers::ProviderRegistry;

/// Where a command leads.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Menu {
        channel_id: i64,
        text: String,
    },
    Generate {
        channel_id: i64,
        channel_name: String,
        preset_id: i64,
        preset_name: String,
    },
}

/// A resolved command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub route: Route,
    pub max_images: usize,
    /// Arguments after the command, options removed.
    pub text: String,
}

/// Immutable command table.
#[derive(Debug, Default)]
pub struct CommandTable {
    routes: HashMap<String, Route>,
}

impl CommandTable {
    /// Builds the table from enabled channels and enabled presets.
    pub fn build(channels: &[ChannelConfig], presets: &[PresetTemplate]) -> Self {
        let presets: Vec<&PresetTemplate> = presets.iter().filter(|p| p.enabled).collect();
        let mut routes = HashMap::new();

        for channel in channels.iter().filter(|c| c.enabled) {
            let menu = Route::Menu {
                channel_id: channel.id,
                text: menu_text(channel, &presets),
            };
            if routes.insert(channel.name.clone(), menu).is_some() {
                debug!(command = %channel.name, "duplicate channel command replaced");
            }
            for preset in &presets {
                let command = format!("{}.{}", channel.name, preset.name);
                if routes.contains_key(&command) {
                    debug!(%command, "duplicate preset command skipped");
                    continue;
                }
                routes.insert(
                    command,
                    Route::Generate {
                        channel_id: channel.id,
                        channel_name: channel.name.clone(),
                        preset_id: preset.id,
                        preset_name: preset.name.clone(),
                    },
                );
            }
        }
        Self { routes }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves a chat line. A leading `/` is optional.
    pub fn resolve(&self, line: &str, default_max_images: usize) -> Option<Invocation> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest),
            None => (line, ""),
        };
        let route = self.routes.get(command)?.clone();
        let (max_images, text) = parse_args(rest, default_max_images);
        Some(Invocation {
            route,
            max_images,
            text,
        })
    }
}

/// Splits `-i <n>` / `--images <n>` out of the argument list.
fn parse_args(rest: &str, default_max_images: usize) -> (usize, String) {
    let mut max_images = default_max_images;
    let mut words = Vec::new();
    let mut tokens = rest.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if matches!(token, "-i" | "--images") {
            let count = tokens
                .peek()
                .and_then(|next| next.parse::<usize>().ok())
                .filter(|n| *n >= 1);
            if let Some(count) = count {
                max_images = count;
                tokens.next();
                continue;
            }
        }
        words.push(token);
    }
    (max_images, words.join(" "))
}

fn menu_text(channel: &ChannelConfig, presets: &[&PresetTemplate]) -> String {
    let mut lines = vec![
        format!("📋 {} - available presets", channel.name),
        format!("💰 Base price: {} {}", channel.cost, channel.currency),
        String::new(),
    ];
    if presets.is_empty() {
        lines.push("No presets available".to_string());
    } else {
        lines.push(format!("Usage: /{}.<preset> <description>", channel.name));
        lines.push(String::new());
        lines.extend(presets.iter().map(|p| format!("  • {}", p.name)));
    }
    lines.join("\n")
}

/// Reload timing, from `[routing]`.
#[derive(Debug, Clone, Copy)]
pub struct ReloadSettings {
    pub debounce: Duration,
    pub refresh_interval: Duration,
}

impl From<&RoutingConfig> for ReloadSettings {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.reload_debounce_ms),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs.max(1)),
        }
    }
}

/// Live command table with debounced reloads.
pub struct CommandRouter {
    catalog: Arc<dyn CatalogStore>,
    table: ArcSwap<CommandTable>,
    reload: Notify,
    default_max_images: usize,
    providers: Option<Arc<ProviderRegistry>>,
}

impl CommandRouter {
    pub fn new(catalog: Arc<dyn CatalogStore>, default_max_images: usize) -> Self {
        Self {
            catalog,
            table: ArcSwap::from_pointee(CommandTable::default()),
            reload: Notify::new(),
            default_max_images,
            providers: None,
        }
    }

    /// Prune `providers` to the enabled channels on every reload.
    pub fn with_providers(mut self, providers: Arc<ProviderRegistry>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn table(&self) -> Arc<CommandTable> {
        self.table.load_full()
    }

    pub fn resolve(&self, line: &str) -> Option<Invocation> {
        self.table.load().resolve(line, self.default_max_images)
    }

    /// Rebuilds the table from the catalog now. Returns the command count.
    pub async fn reload(&self) -> Result<usize, PictorError> {
        let channels = self.catalog.list_channels(true).await?;
        let presets = self.catalog.list_presets(true).await?;
        let table = CommandTable::build(&channels, &presets);
        let count = table.len();
        self.table.store(Arc::new(table));
        if let Some(providers) = &self.providers {
            let live: Vec<i64> = channels.iter().map(|channel| channel.id).collect();
            providers.retain_channels(&live);
        }
        info!(
            commands = count,
            channels = channels.len(),
            presets = presets.len(),
            "command table reloaded"
        );
        Ok(count)
    }

    /// Schedules a reload; bursts within the debounce window coalesce.
    pub fn request_reload(&self) {
        self.reload.notify_one();
    }

    /// Runs reloads on request and on a fixed interval until `cancel`.
    pub fn spawn_reloader(
        self: Arc<Self>,
        settings: ReloadSettings,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(settings.refresh_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = self.reload.notified() => {
                        // Settle until no request arrives for a full window.
                        loop {
                            tokio::select! {
                                _ = self.reload.notified() => continue,
                                _ = tokio::time::sleep(settings.debounce) => break,
                                _ = cancel.cancelled() => return,
                            }
                        }
                    }
                    _ = ticker.tick() => {}
                    _ = cancel.cancelled() => break,
                }
                if let Err(e) = self.reload().await {
                    error!(error = %e, "command table reload failed");
                }
            }
            debug!("command reloader stopped");
        })
    }
}
