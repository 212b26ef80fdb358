// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pictor - chat-driven AI image generation with per-channel billing.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod console;
mod serve;
mod services;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use pictor_config::PictorConfig;
use pictor_core::PictorError;

use crate::admin::{BalanceCommand, ChannelCommand, GenerateArgs, PresetCommand, TaskCommand};
use crate::services::Services;

/// Pictor - chat-driven AI image generation with per-channel billing.
#[derive(Parser, Debug)]
#[command(name = "pictor", version, about, long_about = None)]
struct Cli {
    /// Configuration file, instead of the standard search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve chat turns read from the console.
    Serve {
        /// User id the console speaks as.
        #[arg(long, default_value = "console")]
        user: String,
        #[arg(long)]
        guild: Option<String>,
    },
    /// Generate once, bypassing the chat collector.
    Generate(GenerateArgs),
    /// Manage channels.
    #[command(subcommand)]
    Channel(ChannelCommand),
    /// Manage prompt presets.
    #[command(subcommand)]
    Preset(PresetCommand),
    /// Inspect generation tasks.
    #[command(subcommand)]
    Task(TaskCommand),
    /// Read and credit balances.
    #[command(subcommand)]
    Balance(BalanceCommand),
    /// Pull presets from the remote feed once.
    SyncPresets,
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => pictor_config::load_and_validate_path(path),
        None => pictor_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            pictor_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let Some(command) = cli.command else {
        println!("pictor: use --help for available commands");
        return;
    };

    if let Err(e) = run(command, config).await {
        eprintln!("{}: {e}", "error".red().bold());
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: PictorConfig) -> Result<(), PictorError> {
    let command = match command {
        Commands::Serve { user, guild } => return serve::run_serve(config, user, guild).await,
        Commands::Config => {
            let rendered = pictor_config::to_toml_string(&config).map_err(|e| {
                pictor_config::render_errors(std::slice::from_ref(&e));
                PictorError::Config(e.to_string())
            })?;
            print!("{rendered}");
            return Ok(());
        }
        other => other,
    };

    // One-shot commands only log warnings unless RUST_LOG says otherwise.
    serve::init_tracing("warn");
    let services = Services::open(&config).await?;
    let result = match command {
        Commands::Generate(args) => admin::run_generate(&services, &config, args).await,
        Commands::Channel(cmd) => admin::run_channel(&services, cmd).await,
        Commands::Preset(cmd) => admin::run_preset(&services, cmd).await,
        Commands::Task(cmd) => admin::run_task(&services, cmd).await,
        Commands::Balance(cmd) => admin::run_balance(&services, cmd).await,
        Commands::SyncPresets => admin::run_sync_presets(&services, &config).await,
        Commands::Serve { .. } | Commands::Config => Ok(()),
    };
    services.close().await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    #[serial_test::serial]
    fn binary_loads_config_defaults() {
        let config = pictor_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.agent.name, "pictor");
        assert_eq!(config.collector.timeout_secs, 60);
    }

    #[test]
    fn cli_parses_channel_add() {
        let cli = Cli::try_parse_from([
            "pictor",
            "channel",
            "add",
            "--name",
            "banana",
            "--kind",
            "chat-render",
            "--api-url",
            "https://api.test/v1/chat/completions",
            "--model",
            "gemini-image",
            "--cost",
            "10",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Channel(ChannelCommand::Add(fields))) => {
                assert_eq!(fields.name.as_deref(), Some("banana"));
                assert_eq!(fields.cost, Some(10.0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_generate_with_images() {
        let cli = Cli::try_parse_from([
            "pictor", "generate", "--channel", "1", "--image", "a.png", "--image", "b.jpg", "a",
            "red", "cat",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Generate(args)) => {
                assert_eq!(args.channel, 1);
                assert_eq!(args.images.len(), 2);
                assert_eq!(args.text.join(" "), "a red cat");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_task_status_filter() {
        let cli = Cli::try_parse_from(["pictor", "task", "list", "--status", "failed"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Task(TaskCommand::List {
                status: Some(pictor_core::TaskStatus::Failed),
                page: 1,
                limit: 20,
                ..
            }))
        ));
        assert!(Cli::try_parse_from(["pictor", "task", "list", "--status", "done"]).is_err());
    }
}
