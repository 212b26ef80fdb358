// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock image provider for deterministic testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pictor_core::types::{AdapterType, ChannelConfig, HealthStatus};
use pictor_core::{ImageFile, ImageProvider, PictorError, PluginAdapter, ProviderFactory};

#[derive(Debug, Clone)]
enum Script {
    Succeed(Vec<String>),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Call {
    prompt: String,
    images: usize,
}

/// An image provider that returns a fixed result and records every call.
#[derive(Debug)]
pub struct MockProvider {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
}

impl MockProvider {
    /// Returns `urls` on every call.
    pub fn succeeding(urls: Vec<String>) -> Self {
        Self {
            script: Mutex::new(Script::Succeed(urls)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with a provider error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(Script::Fail(message.into())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Switch to returning `urls`.
    pub fn succeed_with(&self, urls: Vec<String>) {
        *lock(&self.script) = Script::Succeed(urls);
    }

    /// Switch to failing with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.script) = Script::Fail(message.into());
    }

    pub fn calls(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|c| c.prompt.clone()).collect()
    }

    /// Number of reference images received per call.
    pub fn image_counts(&self) -> Vec<usize> {
        lock(&self.calls).iter().map(|c| c.images).collect()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, PictorError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PictorError> {
        Ok(())
    }
}

#[async_trait]
impl ImageProvider for MockProvider {
    async fn generate(
        &self,
        prompt: &str,
        images: &[ImageFile],
    ) -> Result<Vec<String>, PictorError> {
        lock(&self.calls).push(Call {
            prompt: prompt.to_string(),
            images: images.len(),
        });
        match lock(&self.script).clone() {
            Script::Succeed(urls) => Ok(urls),
            Script::Fail(message) => Err(PictorError::provider(message)),
        }
    }
}

/// Factory that hands the same [`MockProvider`] to every channel.
#[derive(Debug)]
pub struct MockProviderFactory {
    provider: Arc<MockProvider>,
    builds: AtomicUsize,
}

impl MockProviderFactory {
    pub fn new(provider: Arc<MockProvider>) -> Self {
        Self {
            provider,
            builds: AtomicUsize::new(0),
        }
    }

    /// How many times `build` ran.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ProviderFactory for MockProviderFactory {
    fn build(&self, _channel: &ChannelConfig) -> Result<Arc<dyn ImageProvider>, PictorError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.provider.clone())
    }
}
