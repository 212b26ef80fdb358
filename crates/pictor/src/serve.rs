// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pictor serve` command implementation.
//!
//! Opens storage and the ledger, builds the command table, starts the
//! background reloader and preset sync, and serves chat turns read from
//! the console until stdin closes or a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use pictor_agent::shutdown;
use pictor_agent::{
    ChatLoop, CollectorSettings, CommandRouter, InteractionCollector, PresetFeed, ReloadSettings,
    ReplyTemplates, spawn_preset_sync,
};
use pictor_config::PictorConfig;
use pictor_core::{Identity, PictorError};
use tracing::{info, warn};

use crate::console::ConsoleTransport;
use crate::services::Services;

/// Runs the `pictor serve` command.
pub async fn run_serve(
    config: PictorConfig,
    user: String,
    guild: Option<String>,
) -> Result<(), PictorError> {
    init_tracing(&config.agent.log_level);
    info!(name = %config.agent.name, "starting pictor serve");

    let services = Services::open(&config).await?;
    let cancel = shutdown::install_signal_handler();

    let settings = CollectorSettings::from(&config.collector);
    let router = Arc::new(
        CommandRouter::new(services.storage.clone(), settings.max_images)
            .with_providers(services.orchestrator.providers().clone()),
    );
    router.reload().await?;
    let reloader = router
        .clone()
        .spawn_reloader(ReloadSettings::from(&config.routing), cancel.clone());

    let sync = if config.presets.sync_enabled {
        let feed = PresetFeed::new(
            config.presets.feed_url.clone(),
            Duration::from_secs(config.provider.request_timeout_secs),
        )?;
        Some(spawn_preset_sync(
            feed,
            &config.presets,
            services.storage.clone(),
            router.clone(),
            cancel.clone(),
        ))
    } else {
        info!("preset sync disabled by configuration");
        None
    };

    let mut identity = Identity::new(user, "console");
    if let Some(guild) = guild {
        identity = identity.with_guild(guild);
    }
    let transport = Arc::new(ConsoleTransport::new(identity));
    let collector = Arc::new(InteractionCollector::new(settings));

    let commands = router.table().commands().join(", ");
    if commands.is_empty() {
        println!("No commands available. Add a channel with `pictor channel add`.");
    } else {
        println!("Commands: {commands}");
    }

    let chat = ChatLoop::new(
        transport,
        collector,
        router,
        services.orchestrator.clone(),
        ReplyTemplates::new(&config.reply),
    );
    let result = chat.run(cancel.clone()).await;

    // Stop background tasks even when the loop ended on closed input.
    cancel.cancel();
    if let Err(e) = reloader.await {
        warn!(error = %e, "reloader task ended abnormally");
    }
    if let Some(sync) = sync {
        if let Err(e) = sync.await {
            warn!(error = %e, "preset sync task ended abnormally");
        }
    }
    services.close().await?;

    info!("pictor serve shutdown complete");
    result
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so chat replies on stdout stay readable.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pictor={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
