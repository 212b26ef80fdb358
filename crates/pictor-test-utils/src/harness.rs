// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full service with a temp SQLite database,
//! the SQLite ledger, a [`MockProvider`] and a [`MockTransport`]. Tests
//! drive it either through the orchestrator directly or by pushing chat
//! turns into the running [`ChatLoop`].

use std::sync::Arc;
use std::time::Duration;

use pictor_agent::{
    ChatLoop, CollectorSettings, CommandRouter, GenerationReport, GenerationRequest,
    InteractionCollector, ProviderRegistry, ReplyTemplates, TaskOrchestrator,
};
use pictor_config::model::{ReplyConfig, StorageConfig};
use pictor_core::types::{ChannelDraft, InboundTurn, OutboundMessage, PresetDraft, ProviderSpec};
use pictor_core::{Identity, Ledger, PictorError};
use pictor_ledger::SqliteLedger;
use pictor_storage::SqliteStorage;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mock_provider::{MockProvider, MockProviderFactory};
use crate::mock_transport::MockTransport;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    provider: MockProvider,
    collector_timeout: Duration,
    max_images: usize,
    reply: ReplyConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            provider: MockProvider::succeeding(vec!["https://img.test/out.png".to_string()]),
            collector_timeout: Duration::from_secs(30),
            max_images: 3,
            reply: ReplyConfig::default(),
        }
    }

    /// Use a specific mock provider.
    pub fn with_provider(mut self, provider: MockProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Set the collector's wait window.
    pub fn with_collector_timeout(mut self, timeout: Duration) -> Self {
        self.collector_timeout = timeout;
        self
    }

    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }

    pub fn with_reply_config(mut self, reply: ReplyConfig) -> Self {
        self.reply = reply;
        self
    }

    /// Build the harness, creating the database and all subsystems.
    pub async fn build(self) -> Result<TestHarness, PictorError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| PictorError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();

        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: db_path.clone(),
            wal_mode: true,
        }));
        storage.initialize().await?;
        let ledger = Arc::new(SqliteLedger::open(&db_path).await?);

        let provider = Arc::new(self.provider);
        let providers = Arc::new(ProviderRegistry::new(Arc::new(MockProviderFactory::new(
            provider.clone(),
        ))));
        let orchestrator = Arc::new(TaskOrchestrator::new(
            storage.clone(),
            storage.clone(),
            ledger.clone(),
            providers.clone(),
        ));
        let router = Arc::new(
            CommandRouter::new(storage.clone(), self.max_images).with_providers(providers),
        );
        let collector = Arc::new(InteractionCollector::new(CollectorSettings {
            timeout: self.collector_timeout,
            max_images: self.max_images,
        }));
        let transport = Arc::new(MockTransport::new());
        let chat = Arc::new(
            ChatLoop::new(
                transport.clone(),
                collector.clone(),
                router.clone(),
                orchestrator.clone(),
                ReplyTemplates::new(&self.reply),
            )
            .with_drain_timeout(Duration::from_secs(5)),
        );

        Ok(TestHarness {
            storage,
            ledger,
            provider,
            orchestrator,
            router,
            collector,
            transport,
            chat,
            _temp_dir: temp_dir,
        })
    }
}

/// A fully assembled test environment.
pub struct TestHarness {
    pub storage: Arc<SqliteStorage>,
    pub ledger: Arc<SqliteLedger>,
    pub provider: Arc<MockProvider>,
    pub orchestrator: Arc<TaskOrchestrator>,
    pub router: Arc<CommandRouter>,
    pub collector: Arc<InteractionCollector>,
    pub transport: Arc<MockTransport>,
    pub chat: Arc<ChatLoop>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Adds an enabled chat-render channel and reloads the command table.
    pub async fn add_channel(&self, name: &str, cost: f64, currency: &str) -> Result<i64, PictorError> {
        let id = self
            .storage
            .create_channel(&ChannelDraft {
                name: name.to_string(),
                enabled: true,
                description: None,
                provider: ProviderSpec::ChatRender {
                    api_url: "http://provider.test/v1/chat/completions".to_string(),
                    api_key: None,
                    model: "mock".to_string(),
                },
                cost,
                currency: currency.to_string(),
            })
            .await?;
        self.router.reload().await?;
        Ok(id)
    }

    /// Adds an enabled user preset and reloads the command table.
    pub async fn add_preset(&self, name: &str, template: &str) -> Result<i64, PictorError> {
        let id = self
            .storage
            .create_preset(&PresetDraft {
                name: name.to_string(),
                prompt_template: template.to_string(),
                enabled: true,
            })
            .await?;
        self.router.reload().await?;
        Ok(id)
    }

    pub async fn grant(&self, user_id: &str, amount: f64, currency: &str) -> Result<(), PictorError> {
        self.ledger.gain(user_id, amount, currency).await
    }

    pub async fn balance(&self, user_id: &str, currency: &str) -> Result<f64, PictorError> {
        self.ledger.balance(user_id, currency).await
    }

    /// Calls the orchestrator directly, bypassing the collector.
    pub async fn generate(
        &self,
        user_id: &str,
        channel_id: i64,
        preset_id: Option<i64>,
        text: &str,
    ) -> GenerationReport {
        self.orchestrator
            .generate(GenerationRequest {
                channel_id,
                preset_id,
                user_input: text.to_string(),
                images: Vec::new(),
                identity: Identity::new(user_id, "test"),
            })
            .await
    }

    /// Starts the chat loop; cancel the returned token to stop it.
    pub fn start(&self) -> (CancellationToken, JoinHandle<Result<(), PictorError>>) {
        let cancel = CancellationToken::new();
        let chat = Arc::clone(&self.chat);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { chat.run(token).await });
        (cancel, handle)
    }

    /// Pushes a text turn from `user_id` in the test room.
    pub fn say(&self, user_id: &str, text: &str) {
        self.transport.push(InboundTurn {
            identity: Identity::new(user_id, "test"),
            text: text.to_string(),
            images: Vec::new(),
        });
    }

    /// Waits until `user_id` has received at least `count` replies.
    pub async fn replies_for(
        &self,
        user_id: &str,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<OutboundMessage>, PictorError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let replies = self.transport.sent_to(user_id);
            if replies.len() >= count {
                return Ok(replies);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PictorError::Timeout { duration: timeout });
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
