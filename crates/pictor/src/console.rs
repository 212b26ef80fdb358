// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line-based chat transport over stdin and stdout.
//!
//! Every input line is one turn from a fixed identity. Tokens of the form
//! `@path` attach the image file at `path`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use colored::Colorize;
use pictor_core::types::{AdapterType, HealthStatus, InboundTurn, OutboundMessage};
use pictor_core::{ChatTransport, Identity, ImageFile, PictorError, PluginAdapter};
use pictor_provider::image::{mime_for_path, truncate_for_log};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Console transport for a single identity.
pub struct ConsoleTransport {
    identity: Identity,
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleTransport {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

/// Splits a line into its text and the `@path` attachments.
pub fn split_attachments(line: &str) -> (String, Vec<PathBuf>) {
    let mut words = Vec::new();
    let mut paths = Vec::new();
    for token in line.split_whitespace() {
        match token.strip_prefix('@') {
            Some(path) if !path.is_empty() => paths.push(PathBuf::from(path)),
            _ => words.push(token),
        }
    }
    (words.join(" "), paths)
}

/// Reads an image file from disk; unknown extensions are rejected.
pub async fn load_image(path: &Path) -> Result<ImageFile, PictorError> {
    let mime = mime_for_path(path).ok_or_else(|| {
        PictorError::Validation(format!("{} is not a supported image", path.display()))
    })?;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        PictorError::Validation(format!("cannot read {}: {e}", path.display()))
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(ImageFile::new(bytes, mime, filename))
}

#[async_trait]
impl PluginAdapter for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, PictorError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PictorError> {
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send(&self, _to: &Identity, msg: OutboundMessage) -> Result<(), PictorError> {
        if !msg.text.is_empty() {
            println!("{} {}", "pictor>".green().bold(), msg.text);
        }
        for url in &msg.images {
            println!("  {} {}", "image:".cyan(), truncate_for_log(url, 120));
        }
        Ok(())
    }

    async fn receive(&self) -> Result<InboundTurn, PictorError> {
        let mut lines = self.lines.lock().await;
        loop {
            let line = lines.next_line().await.map_err(|e| PictorError::Transport {
                message: format!("failed to read stdin: {e}"),
                source: Some(Box::new(e)),
            })?;
            let Some(line) = line else {
                return Err(PictorError::Transport {
                    message: "console input closed".into(),
                    source: None,
                });
            };

            let (text, paths) = split_attachments(&line);
            let mut images = Vec::with_capacity(paths.len());
            for path in paths {
                match load_image(&path).await {
                    Ok(image) => images.push(image),
                    Err(e) => {
                        warn!(error = %e, "attachment skipped");
                        eprintln!("{}: {e}", "warning".yellow());
                    }
                }
            }
            if text.is_empty() && images.is_empty() {
                continue;
            }
            debug!(chars = text.len(), images = images.len(), "console turn");
            return Ok(InboundTurn {
                identity: self.identity.clone(),
                text,
                images,
            });
        }
    }
}
