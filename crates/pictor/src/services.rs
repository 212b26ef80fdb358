// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembly of the persistent services shared by every subcommand.

use std::sync::Arc;

use pictor_agent::{ProviderRegistry, TaskOrchestrator};
use pictor_config::PictorConfig;
use pictor_core::PictorError;
use pictor_ledger::SqliteLedger;
use pictor_provider::HttpProviderFactory;
use pictor_storage::SqliteStorage;
use tracing::debug;

/// Storage, ledger and orchestrator over the configured database.
pub struct Services {
    pub storage: Arc<SqliteStorage>,
    pub ledger: Arc<SqliteLedger>,
    pub orchestrator: Arc<TaskOrchestrator>,
}

impl Services {
    pub async fn open(config: &PictorConfig) -> Result<Self, PictorError> {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let storage = Arc::new(storage);

        // The ledger opens its own connection to the migrated database.
        let ledger = Arc::new(SqliteLedger::open(&config.storage.database_path).await?);

        let providers = Arc::new(ProviderRegistry::new(Arc::new(HttpProviderFactory::new(
            &config.provider,
        ))));
        let orchestrator = Arc::new(TaskOrchestrator::new(
            storage.clone(),
            storage.clone(),
            ledger.clone(),
            providers,
        ));
        debug!(path = %config.storage.database_path, "services opened");

        Ok(Self {
            storage,
            ledger,
            orchestrator,
        })
    }

    pub async fn close(&self) -> Result<(), PictorError> {
        self.storage.close().await
    }
}
