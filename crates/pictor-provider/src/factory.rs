// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the provider variant a channel is configured for.

use std::sync::Arc;
use std::time::Duration;

use pictor_config::model::ProviderConfig;
use pictor_core::types::{ChannelConfig, ProviderSpec};
use pictor_core::{ImageProvider, PictorError, ProviderFactory};
use tracing::debug;

use crate::chat_render::ChatRenderProvider;
use crate::http::JsonEndpoint;
use crate::image_api::{ImageApiParams, ImageApiProvider};

/// Factory for the HTTP-backed providers.
#[derive(Debug, Clone)]
pub struct HttpProviderFactory {
    timeout: Duration,
    max_retries: u32,
}

impl HttpProviderFactory {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: config.max_retries,
        }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn build(&self, channel: &ChannelConfig) -> Result<Arc<dyn ImageProvider>, PictorError> {
        debug!(channel = %channel.name, kind = %channel.provider.kind(), "building provider");
        match &channel.provider {
            ProviderSpec::ImageApi {
                api_url,
                api_key,
                model,
                n,
                size,
                quality,
                style,
            } => {
                let endpoint =
                    JsonEndpoint::new(api_url, api_key.as_deref(), self.timeout, self.max_retries)?;
                let params = ImageApiParams {
                    model: model.clone(),
                    n: *n,
                    size: size.clone(),
                    quality: quality.clone(),
                    style: style.clone(),
                };
                Ok(Arc::new(ImageApiProvider::new(
                    channel.name.clone(),
                    endpoint,
                    params,
                )))
            }
            ProviderSpec::ChatRender {
                api_url,
                api_key,
                model,
            } => {
                let endpoint =
                    JsonEndpoint::new(api_url, api_key.as_deref(), self.timeout, self.max_retries)?;
                Ok(Arc::new(ChatRenderProvider::new(
                    channel.name.clone(),
                    endpoint,
                    model.clone(),
                )))
            }
        }
    }
}
