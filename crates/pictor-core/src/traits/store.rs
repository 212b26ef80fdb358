// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits for generation tasks and the channel/preset catalog.

use async_trait::async_trait;

use crate::error::PictorError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChannelConfig, GenerationTask, NewTask, PresetTemplate, TaskFilter, TaskPage, TaskUpdate,
};

/// Durable record of one row per generation attempt.
#[async_trait]
pub trait TaskStore: PluginAdapter {
    /// Inserts a task row and returns its id.
    async fn create_task(&self, task: &NewTask) -> Result<i64, PictorError>;

    /// Applies a partial update. A status change the task state machine
    /// forbids fails with [`PictorError::InvalidTransition`].
    async fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<(), PictorError>;

    async fn get_task(&self, id: i64) -> Result<Option<GenerationTask>, PictorError>;

    /// Lists tasks newest first. `page` is 1-based.
    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: u32,
        limit: u32,
    ) -> Result<TaskPage, PictorError>;

    /// Deletes a task row; returns whether a row was removed.
    async fn delete_task(&self, id: i64) -> Result<bool, PictorError>;
}

/// Read access to channels and presets.
#[async_trait]
pub trait CatalogStore: PluginAdapter {
    async fn get_channel(&self, id: i64) -> Result<Option<ChannelConfig>, PictorError>;

    async fn list_channels(&self, enabled_only: bool) -> Result<Vec<ChannelConfig>, PictorError>;

    async fn get_preset(&self, id: i64) -> Result<Option<PresetTemplate>, PictorError>;

    async fn list_presets(&self, enabled_only: bool) -> Result<Vec<PresetTemplate>, PictorError>;
}
