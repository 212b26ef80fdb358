// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the task and catalog store traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use pictor_config::model::StorageConfig;
use pictor_core::types::{
    ChannelConfig, ChannelDraft, GenerationTask, NewTask, PresetDraft, PresetTemplate,
    RemotePreset, SyncSummary, TaskFilter, TaskPage, TaskUpdate,
};
use pictor_core::{AdapterType, CatalogStore, HealthStatus, PictorError, PluginAdapter, TaskStore};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store.
///
/// The database is opened by [`SqliteStorage::initialize`]; every other
/// call fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a store for the configured path without opening it.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already opened database.
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig::default(),
            db: OnceCell::new_with(Some(db)),
        }
    }

    fn db(&self) -> Result<&Database, PictorError> {
        self.db.get().ok_or_else(|| PictorError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Open the database and run migrations.
    pub async fn initialize(&self) -> Result<(), PictorError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| PictorError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Checkpoint the WAL. The connection itself closes on drop.
    pub async fn close(&self) -> Result<(), PictorError> {
        self.db()?.checkpoint().await
    }

    // --- Channel admin ---

    pub async fn create_channel(&self, draft: &ChannelDraft) -> Result<i64, PictorError> {
        queries::channels::create_channel(self.db()?, draft).await
    }

    pub async fn update_channel(&self, id: i64, draft: &ChannelDraft) -> Result<(), PictorError> {
        queries::channels::update_channel(self.db()?, id, draft).await
    }

    pub async fn set_channel_enabled(&self, id: i64, enabled: bool) -> Result<(), PictorError> {
        queries::channels::set_channel_enabled(self.db()?, id, enabled).await
    }

    pub async fn delete_channel(&self, id: i64) -> Result<bool, PictorError> {
        queries::channels::delete_channel(self.db()?, id).await
    }

    // --- Preset admin ---

    pub async fn create_preset(&self, draft: &PresetDraft) -> Result<i64, PictorError> {
        queries::presets::create_preset(self.db()?, draft).await
    }

    pub async fn update_preset(&self, id: i64, draft: &PresetDraft) -> Result<(), PictorError> {
        queries::presets::update_preset(self.db()?, id, draft).await
    }

    pub async fn set_preset_enabled(&self, id: i64, enabled: bool) -> Result<(), PictorError> {
        queries::presets::set_preset_enabled(self.db()?, id, enabled).await
    }

    pub async fn copy_preset(&self, id: i64) -> Result<i64, PictorError> {
        queries::presets::copy_preset(self.db()?, id).await
    }

    pub async fn delete_preset(&self, id: i64) -> Result<bool, PictorError> {
        queries::presets::delete_preset(self.db()?, id).await
    }

    /// Mirror a remote preset feed onto the `api` presets.
    pub async fn sync_api_presets(
        &self,
        remote: Vec<RemotePreset>,
    ) -> Result<SyncSummary, PictorError> {
        queries::presets::sync_api_presets(self.db()?, remote).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PictorError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PictorError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteStorage {
    async fn create_task(&self, task: &NewTask) -> Result<i64, PictorError> {
        queries::tasks::create_task(self.db()?, task).await
    }

    async fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<(), PictorError> {
        queries::tasks::update_task(self.db()?, id, update).await
    }

    async fn get_task(&self, id: i64) -> Result<Option<GenerationTask>, PictorError> {
        queries::tasks::get_task(self.db()?, id).await
    }

    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: u32,
        limit: u32,
    ) -> Result<TaskPage, PictorError> {
        queries::tasks::list_tasks(self.db()?, filter, page, limit).await
    }

    async fn delete_task(&self, id: i64) -> Result<bool, PictorError> {
        queries::tasks::delete_task(self.db()?, id).await
    }
}

#[async_trait]
impl CatalogStore for SqliteStorage {
    async fn get_channel(&self, id: i64) -> Result<Option<ChannelConfig>, PictorError> {
        queries::channels::get_channel(self.db()?, id).await
    }

    async fn list_channels(&self, enabled_only: bool) -> Result<Vec<ChannelConfig>, PictorError> {
        queries::channels::list_channels(self.db()?, enabled_only).await
    }

    async fn get_preset(&self, id: i64) -> Result<Option<PresetTemplate>, PictorError> {
        queries::presets::get_preset(self.db()?, id).await
    }

    async fn list_presets(&self, enabled_only: bool) -> Result<Vec<PresetTemplate>, PictorError> {
        queries::presets::list_presets(self.db()?, enabled_only).await
    }
}
