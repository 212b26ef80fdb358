// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel provider cache.

use std::sync::Arc;

use dashmap::DashMap;
use pictor_core::types::ChannelConfig;
use pictor_core::{ImageProvider, PictorError, ProviderFactory};
use tracing::debug;

struct Cached {
    updated_at: String,
    provider: Arc<dyn ImageProvider>,
}

/// Builds each channel's provider once and reuses it until the channel
/// row changes.
pub struct ProviderRegistry {
    factory: Arc<dyn ProviderFactory>,
    cache: DashMap<i64, Cached>,
}

impl ProviderRegistry {
    pub fn new(factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            factory,
            cache: DashMap::new(),
        }
    }

    /// Provider for `channel`, rebuilt when its `updated_at` moved.
    pub fn get(&self, channel: &ChannelConfig) -> Result<Arc<dyn ImageProvider>, PictorError> {
        let cached = self
            .cache
            .get(&channel.id)
            .filter(|cached| cached.updated_at == channel.updated_at)
            .map(|cached| Arc::clone(&cached.provider));
        if let Some(provider) = cached {
            return Ok(provider);
        }
        let provider = self.factory.build(channel)?;
        debug!(channel_id = channel.id, channel = %channel.name, "provider built");
        self.cache.insert(
            channel.id,
            Cached {
                updated_at: channel.updated_at.clone(),
                provider: Arc::clone(&provider),
            },
        );
        Ok(provider)
    }

    /// Drops cached providers of channels not in `live_ids`.
    pub fn retain_channels(&self, live_ids: &[i64]) {
        self.cache.retain(|id, _| live_ids.contains(id));
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
