// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image provider traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PictorError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelConfig, ImageFile};

/// An image generation backend.
#[async_trait]
pub trait ImageProvider: PluginAdapter {
    /// Generates images for `prompt`, optionally guided by reference images.
    ///
    /// Returns at least one URL on success. An empty result is a protocol
    /// violation and must be reported as [`PictorError::Provider`].
    async fn generate(&self, prompt: &str, images: &[ImageFile])
    -> Result<Vec<String>, PictorError>;
}

/// Builds the provider variant a channel is configured for.
pub trait ProviderFactory: Send + Sync + 'static {
    fn build(&self, channel: &ChannelConfig) -> Result<Arc<dyn ImageProvider>, PictorError>;
}
