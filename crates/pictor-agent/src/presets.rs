// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote preset feed and its periodic sync into the catalog.

use std::sync::Arc;
use std::time::Duration;

use pictor_config::model::PresetsConfig;
use pictor_core::PictorError;
use pictor_core::types::{RemotePreset, SyncSummary};
use pictor_storage::SqliteStorage;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::routing::CommandRouter;

#[derive(Debug, Deserialize)]
struct FeedBody {
    #[serde(default)]
    data: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

/// HTTP client for the `{data: [{title, prompt}]}` preset feed.
#[derive(Debug, Clone)]
pub struct PresetFeed {
    client: reqwest::Client,
    url: String,
}

impl PresetFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PictorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PictorError::Transport {
                message: format!("failed to build preset feed client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches the feed. A body that is not the expected shape yields an
    /// empty list; entries without both fields are skipped.
    pub async fn fetch(&self) -> Result<Vec<RemotePreset>, PictorError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| feed_error(format!("preset feed request failed: {e}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PictorError::Transport {
                message: format!("preset feed returned HTTP {}", status.as_u16()),
                source: None,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| feed_error(format!("failed to read preset feed: {e}"), e))?;
        let body: FeedBody = match serde_json::from_slice(&bytes) {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %self.url, error = %e, "malformed preset feed ignored");
                return Ok(Vec::new());
            }
        };

        let presets: Vec<RemotePreset> = body
            .data
            .into_iter()
            .filter_map(|item| match (item.title, item.prompt) {
                (Some(title), Some(prompt)) => Some(RemotePreset { title, prompt }),
                _ => None,
            })
            .collect();
        debug!(url = %self.url, count = presets.len(), "preset feed fetched");
        Ok(presets)
    }

    /// Fetches and applies the feed to the catalog's api presets.
    pub async fn sync(&self, storage: &SqliteStorage) -> Result<SyncSummary, PictorError> {
        let presets = self.fetch().await?;
        if presets.is_empty() {
            info!(url = %self.url, "preset feed empty, nothing synced");
            return Ok(SyncSummary::default());
        }
        let summary = storage.sync_api_presets(presets).await?;
        info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            "api presets synced"
        );
        Ok(summary)
    }
}

fn feed_error(message: String, e: reqwest::Error) -> PictorError {
    PictorError::Transport {
        message,
        source: Some(Box::new(e)),
    }
}

/// Syncs at start and then every `refresh_interval_secs`, asking the
/// router to reload whenever the catalog changed.
pub fn spawn_preset_sync(
    feed: PresetFeed,
    config: &PresetsConfig,
    storage: Arc<SqliteStorage>,
    router: Arc<CommandRouter>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(config.refresh_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => break,
            }
            match feed.sync(&storage).await {
                Ok(summary) if summary != SyncSummary::default() => router.request_reload(),
                Ok(_) => {}
                Err(e) => error!(url = %feed.url(), error = %e, "preset sync failed"),
            }
        }
        debug!("preset sync stopped");
    })
}
