// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One billed generation attempt, start to finish.
//!
//! [`TaskOrchestrator::generate`] runs the pipeline strictly in order:
//! resolve channel, pre-check balance, resolve preset, build prompt,
//! charge, persist the task row, call the provider, then record success
//! or refund and record failure. Every failure ends up in the returned
//! [`GenerationReport`]; nothing propagates past `generate`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pictor_core::types::{
    ChannelConfig, GenerationTask, NewTask, PresetTemplate, TaskStatus, TaskUpdate, now_timestamp,
};
use pictor_core::{CatalogStore, Identity, ImageFile, Ledger, PictorError, TaskStore};
use tracing::{error, info, warn};

use crate::prompt::build_prompt;
use crate::providers::ProviderRegistry;

/// Input of one generation, from the collector or a direct caller.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub channel_id: i64,
    pub preset_id: Option<i64>,
    pub user_input: String,
    pub images: Vec<ImageFile>,
    pub identity: Identity,
}

/// Structured result of [`TaskOrchestrator::generate`].
#[derive(Debug)]
pub struct GenerationReport {
    /// `None` when the pipeline stopped before a row was written, or the
    /// write failed.
    pub task_id: Option<i64>,
    pub outcome: Result<Vec<String>, PictorError>,
    pub duration: Duration,
    pub cost: f64,
    pub currency: String,
    pub channel_name: Option<String>,
    pub balance_before: Option<f64>,
    pub balance_after: Option<f64>,
    pub charged: bool,
    pub refunded: bool,
}

impl GenerationReport {
    fn rejected(err: PictorError, started: Instant) -> Self {
        Self {
            task_id: None,
            outcome: Err(err),
            duration: started.elapsed(),
            cost: 0.0,
            currency: String::new(),
            channel_name: None,
            balance_before: None,
            balance_after: None,
            charged: false,
            refunded: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn images(&self) -> &[String] {
        self.outcome.as_deref().unwrap_or(&[])
    }

    pub fn error(&self) -> Option<&PictorError> {
        self.outcome.as_ref().err()
    }
}

/// Drives a request through ledger, task store and provider.
pub struct TaskOrchestrator {
    catalog: Arc<dyn CatalogStore>,
    tasks: Arc<dyn TaskStore>,
    ledger: Arc<dyn Ledger>,
    providers: Arc<ProviderRegistry>,
}

impl TaskOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        tasks: Arc<dyn TaskStore>,
        ledger: Arc<dyn Ledger>,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            catalog,
            tasks,
            ledger,
            providers,
        }
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    /// Runs one generation attempt. Never fails; see [`GenerationReport`].
    pub async fn generate(&self, request: GenerationRequest) -> GenerationReport {
        let started = Instant::now();

        let channel = match self.resolve_channel(request.channel_id).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(channel_id = request.channel_id, error = %e, "generation rejected");
                return GenerationReport::rejected(e, started);
            }
        };

        let mut report = GenerationReport {
            cost: channel.cost,
            currency: channel.currency.clone(),
            channel_name: Some(channel.name.clone()),
            ..GenerationReport::rejected(PictorError::PromptBuildFailed, started)
        };
        let user_id = request.identity.user_id.as_str();
        let billable = channel.cost > 0.0 && request.identity.has_account();

        if billable {
            match self.ledger.balance(user_id, &channel.currency).await {
                Ok(balance) if balance < channel.cost => {
                    info!(user_id, balance, cost = channel.cost, "balance below channel cost");
                    report.balance_before = Some(balance);
                    return finish(report, Err(insufficient(&channel, Some(balance))), started);
                }
                Ok(balance) => report.balance_before = Some(balance),
                Err(e) => warn!(user_id, error = %e, "balance pre-check failed, continuing"),
            }
        }

        let preset = match self.resolve_preset(request.preset_id).await {
            Ok(preset) => preset,
            Err(e) => return finish(report, Err(e), started),
        };
        let prompt = match build_prompt(preset.as_ref(), &request.user_input) {
            Ok(prompt) => prompt,
            Err(e) => return finish(report, Err(e), started),
        };

        let new_task = NewTask {
            identity: request.identity.clone(),
            channel_ref: channel.id,
            channel_name: channel.name.clone(),
            preset_ref: preset.as_ref().map(|p| p.id),
            preset_name: preset.as_ref().map(|p| p.name.clone()),
            user_input: request.user_input.clone(),
            final_prompt: prompt.clone(),
            input_images: request.images.iter().map(|i| i.filename.clone()).collect(),
            status: TaskStatus::Processing,
            cost: channel.cost,
            currency: channel.currency.clone(),
            charged: false,
            start_time: now_timestamp(),
        };

        if billable {
            if let Err(e) = self
                .ledger
                .charge(user_id, channel.cost, &channel.currency)
                .await
            {
                warn!(user_id, cost = channel.cost, error = %e, "charge failed");
                let current = self.ledger.balance(user_id, &channel.currency).await.ok();
                let err = insufficient(&channel, current.or(report.balance_before));
                // The pre-check passed, so record the lost race.
                if report.balance_before.is_some() {
                    report.task_id = self.persist_rejected(&new_task, &err, started).await;
                }
                return finish(report, Err(err), started);
            }
            report.charged = true;
            info!(user_id, cost = channel.cost, currency = %channel.currency, "charged");
        }

        let new_task = NewTask {
            charged: report.charged,
            ..new_task
        };
        report.task_id = match self.tasks.create_task(&new_task).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(channel = %channel.name, error = %e, "failed to persist task row");
                None
            }
        };

        let generated = match self.providers.get(&channel) {
            Ok(provider) => provider.generate(&prompt, &request.images).await,
            Err(e) => Err(e),
        };
        let generated = generated.and_then(|urls| {
            if urls.is_empty() {
                Err(PictorError::provider("provider returned no images"))
            } else {
                Ok(urls)
            }
        });

        match generated {
            Ok(urls) => {
                if report.charged {
                    report.balance_after =
                        self.ledger.balance(user_id, &channel.currency).await.ok();
                } else {
                    report.balance_after = report.balance_before;
                }
                self.record(
                    report.task_id,
                    TaskUpdate {
                        status: Some(TaskStatus::Success),
                        output_images: Some(urls.clone()),
                        ..finished(started)
                    },
                )
                .await;
                info!(
                    task_id = ?report.task_id,
                    channel = %channel.name,
                    images = urls.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "generation succeeded"
                );
                finish(report, Ok(urls), started)
            }
            Err(e) => {
                warn!(task_id = ?report.task_id, channel = %channel.name, error = %e, "generation failed");
                if report.charged {
                    report.refunded = self.refund(user_id, &channel).await;
                }
                self.record(
                    report.task_id,
                    TaskUpdate {
                        status: Some(TaskStatus::Failed),
                        error: Some(e.to_string()),
                        refunded: Some(report.refunded),
                        ..finished(started)
                    },
                )
                .await;
                finish(report, Err(e), started)
            }
        }
    }

    /// Refunds a failed task whose automatic refund did not go through and
    /// moves it to `refunded`.
    pub async fn settle_refund(&self, task_id: i64) -> Result<GenerationTask, PictorError> {
        let task = self
            .tasks
            .get_task(task_id)
            .await?
            .ok_or_else(|| PictorError::Validation(format!("task {task_id} not found")))?;

        if task.status != TaskStatus::Failed || !task.charged || task.refunded {
            return Err(PictorError::Validation(format!(
                "task {task_id} is not awaiting a refund (status {}, charged {}, refunded {})",
                task.status, task.charged, task.refunded
            )));
        }
        if !task.identity.has_account() {
            return Err(PictorError::Validation(format!(
                "task {task_id} has no account to refund"
            )));
        }

        self.ledger
            .gain(&task.identity.user_id, task.cost, &task.currency)
            .await?;
        self.tasks
            .update_task(
                task_id,
                &TaskUpdate {
                    status: Some(TaskStatus::Refunded),
                    refunded: Some(true),
                    ..TaskUpdate::default()
                },
            )
            .await?;
        info!(task_id, user_id = %task.identity.user_id, cost = task.cost, "refund settled");

        self.tasks
            .get_task(task_id)
            .await?
            .ok_or_else(|| PictorError::Internal(format!("task {task_id} vanished")))
    }

    async fn resolve_channel(&self, id: i64) -> Result<ChannelConfig, PictorError> {
        let channel = self
            .catalog
            .get_channel(id)
            .await?
            .ok_or(PictorError::ChannelNotFound { id })?;
        if !channel.enabled {
            return Err(PictorError::ChannelDisabled { name: channel.name });
        }
        Ok(channel)
    }

    async fn resolve_preset(&self, id: Option<i64>) -> Result<Option<PresetTemplate>, PictorError> {
        let Some(id) = id else {
            return Ok(None);
        };
        self.catalog
            .get_preset(id)
            .await?
            .map(Some)
            .ok_or(PictorError::PresetNotFound { id })
    }

    /// One refund attempt, no retry.
    async fn refund(&self, user_id: &str, channel: &ChannelConfig) -> bool {
        match self.ledger.gain(user_id, channel.cost, &channel.currency).await {
            Ok(()) => {
                info!(user_id, amount = channel.cost, currency = %channel.currency, "refunded");
                true
            }
            Err(e) => {
                error!(
                    user_id,
                    amount = channel.cost,
                    currency = %channel.currency,
                    error = %e,
                    "refund failed, task left unrefunded"
                );
                false
            }
        }
    }

    async fn persist_rejected(
        &self,
        task: &NewTask,
        err: &PictorError,
        started: Instant,
    ) -> Option<i64> {
        let id = match self.tasks.create_task(task).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "failed to persist task row");
                return None;
            }
        };
        self.record(
            Some(id),
            TaskUpdate {
                status: Some(TaskStatus::Failed),
                error: Some(err.to_string()),
                refunded: Some(false),
                ..finished(started)
            },
        )
        .await;
        Some(id)
    }

    async fn record(&self, task_id: Option<i64>, update: TaskUpdate) {
        let Some(id) = task_id else {
            return;
        };
        if let Err(e) = self.tasks.update_task(id, &update).await {
            error!(task_id = id, error = %e, "failed to update task row");
        }
    }
}

fn insufficient(channel: &ChannelConfig, current_balance: Option<f64>) -> PictorError {
    PictorError::InsufficientBalance {
        needed: channel.cost,
        current_balance,
        currency: channel.currency.clone(),
    }
}

fn finished(started: Instant) -> TaskUpdate {
    TaskUpdate {
        end_time: Some(now_timestamp()),
        duration_ms: Some(started.elapsed().as_millis() as i64),
        ..TaskUpdate::default()
    }
}

fn finish(
    mut report: GenerationReport,
    outcome: Result<Vec<String>, PictorError>,
    started: Instant,
) -> GenerationReport {
    report.outcome = outcome;
    report.duration = started.elapsed();
    report
}

#[cfg(test)]
mod tests {
    use pictor_core::types::{ChannelDraft, PresetDraft, ProviderSpec, TaskFilter};
    use pictor_storage::SqliteStorage;
    use pictor_test_utils::{MockLedger, MockProvider, MockProviderFactory};

    use super::*;

    struct Fixture {
        storage: Arc<SqliteStorage>,
        ledger: Arc<MockLedger>,
        provider: Arc<MockProvider>,
        orchestrator: TaskOrchestrator,
    }

    async fn fixture(provider: MockProvider) -> Fixture {
        let storage = Arc::new(
            SqliteStorage::from_database(pictor_storage::Database::open_in_memory().await.unwrap()),
        );
        let ledger = Arc::new(MockLedger::new());
        let provider = Arc::new(provider);
        let registry = Arc::new(ProviderRegistry::new(Arc::new(MockProviderFactory::new(
            provider.clone(),
        ))));
        let orchestrator =
            TaskOrchestrator::new(storage.clone(), storage.clone(), ledger.clone(), registry);
        Fixture {
            storage,
            ledger,
            provider,
            orchestrator,
        }
    }

    async fn channel(storage: &SqliteStorage, cost: f64, enabled: bool) -> i64 {
        storage
            .create_channel(&ChannelDraft {
                name: format!("ch-{cost}-{enabled}"),
                enabled,
                description: None,
                provider: ProviderSpec::ChatRender {
                    api_url: "http://provider".into(),
                    api_key: None,
                    model: "m".into(),
                },
                cost,
                currency: "gold".into(),
            })
            .await
            .unwrap()
    }

    fn request(channel_id: i64, text: &str) -> GenerationRequest {
        GenerationRequest {
            channel_id,
            preset_id: None,
            user_input: text.into(),
            images: Vec::new(),
            identity: Identity::new("u1", "c1"),
        }
    }

    async fn all_tasks(storage: &SqliteStorage) -> Vec<GenerationTask> {
        storage
            .list_tasks(&TaskFilter::default(), 1, 100)
            .await
            .unwrap()
            .tasks
    }

    #[tokio::test]
    async fn insufficient_balance_charges_nothing_and_writes_no_row() {
        let f = fixture(MockProvider::succeeding(vec!["https://x/1.png".into()])).await;
        let ch = channel(&f.storage, 100.0, true).await;
        f.ledger.set_balance("u1", "gold", 80.0);

        let report = f.orchestrator.generate(request(ch, "a cat")).await;
        match report.error() {
            Some(PictorError::InsufficientBalance {
                needed,
                current_balance,
                currency,
            }) => {
                assert_eq!(*needed, 100.0);
                assert_eq!(*current_balance, Some(80.0));
                assert_eq!(currency, "gold");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.ledger.balance_of("u1", "gold"), 80.0);
        assert_eq!(f.ledger.charges(), 0);
        assert_eq!(f.provider.calls(), 0);
        assert!(all_tasks(&f.storage).await.is_empty());
    }

    #[tokio::test]
    async fn free_channel_with_template_skips_the_ledger() {
        let f = fixture(MockProvider::succeeding(vec!["https://x/1.png".into()])).await;
        let ch = channel(&f.storage, 0.0, true).await;
        let preset = f
            .storage
            .create_preset(&PresetDraft {
                name: "draw".into(),
                prompt_template: "draw: {{userText}}".into(),
                enabled: true,
            })
            .await
            .unwrap();

        let report = f
            .orchestrator
            .generate(GenerationRequest {
                preset_id: Some(preset),
                ..request(ch, "a cat")
            })
            .await;

        assert!(report.is_success());
        assert_eq!(f.provider.prompts(), vec!["draw: a cat"]);
        assert_eq!(f.ledger.calls(), 0);
        let task = f.storage.get_task(report.task_id.unwrap()).await.unwrap().unwrap();
        assert!(!task.charged);
        assert_eq!(task.final_prompt, "draw: a cat");
        assert_eq!(task.preset_name.as_deref(), Some("draw"));
    }

    #[tokio::test]
    async fn success_charges_once_and_records_outputs() {
        let f = fixture(MockProvider::succeeding(vec!["https://x/1.png".into()])).await;
        let ch = channel(&f.storage, 10.0, true).await;
        f.ledger.set_balance("u1", "gold", 50.0);

        let report = f
            .orchestrator
            .generate(GenerationRequest {
                images: vec![ImageFile::new(vec![1], "image/png", "ref.png")],
                ..request(ch, "a cat")
            })
            .await;

        assert_eq!(report.images(), ["https://x/1.png"]);
        assert!(report.charged);
        assert!(!report.refunded);
        assert_eq!(report.balance_before, Some(50.0));
        assert_eq!(report.balance_after, Some(40.0));
        assert_eq!(f.ledger.charges(), 1);
        assert_eq!(f.ledger.gains(), 0);

        let task = f.storage.get_task(report.task_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert_eq!(task.output_images, vec!["https://x/1.png"]);
        assert_eq!(task.input_images, vec!["ref.png"]);
        assert!(task.charged);
        assert!(task.end_time.is_some());
    }

    #[tokio::test]
    async fn provider_failure_refunds_and_marks_failed() {
        let f = fixture(MockProvider::failing("upstream exploded")).await;
        let ch = channel(&f.storage, 10.0, true).await;
        f.ledger.set_balance("u1", "gold", 50.0);

        let report = f.orchestrator.generate(request(ch, "a cat")).await;

        assert!(report.error().unwrap().to_string().contains("upstream exploded"));
        assert!(report.charged);
        assert!(report.refunded);
        assert_eq!(f.ledger.balance_of("u1", "gold"), 50.0);
        assert_eq!(f.ledger.charges(), 1);
        assert_eq!(f.ledger.gains(), 1);

        let task = f.storage.get_task(report.task_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.refunded);
        assert!(task.error.unwrap().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn failed_refund_leaves_row_unrefunded_until_settled() {
        let f = fixture(MockProvider::failing("boom")).await;
        let ch = channel(&f.storage, 10.0, true).await;
        f.ledger.set_balance("u1", "gold", 50.0);
        f.ledger.fail_gains(true);

        let report = f.orchestrator.generate(request(ch, "a cat")).await;
        assert!(report.charged);
        assert!(!report.refunded);
        let id = report.task_id.unwrap();
        let task = f.storage.get_task(id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(!task.refunded);
        assert_eq!(f.ledger.balance_of("u1", "gold"), 40.0);

        f.ledger.fail_gains(false);
        let settled = f.orchestrator.settle_refund(id).await.unwrap();
        assert_eq!(settled.status, TaskStatus::Refunded);
        assert!(settled.refunded);
        assert_eq!(f.ledger.balance_of("u1", "gold"), 50.0);

        let again = f.orchestrator.settle_refund(id).await.unwrap_err();
        assert!(matches!(again, PictorError::Validation(_)));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failed_refund_is_logged() {
        let f = fixture(MockProvider::failing("boom")).await;
        let ch = channel(&f.storage, 10.0, true).await;
        f.ledger.set_balance("u1", "gold", 50.0);
        f.ledger.fail_gains(true);

        f.orchestrator.generate(request(ch, "a cat")).await;

        assert!(logs_contain("refund failed, task left unrefunded"));
        assert!(logs_contain("generation failed"));
    }

    #[tokio::test]
    async fn lost_charge_race_is_insufficient_balance() {
        let f = fixture(MockProvider::succeeding(vec!["u".into()])).await;
        let ch = channel(&f.storage, 10.0, true).await;
        f.ledger.set_balance("u1", "gold", 50.0);
        f.ledger.fail_charges(true);

        let report = f.orchestrator.generate(request(ch, "a cat")).await;
        assert!(matches!(
            report.error(),
            Some(PictorError::InsufficientBalance { .. })
        ));
        assert!(!report.charged);
        assert_eq!(f.provider.calls(), 0);

        let task = f.storage.get_task(report.task_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(!task.charged);
    }

    #[tokio::test]
    async fn validation_failures_touch_nothing() {
        let f = fixture(MockProvider::succeeding(vec!["u".into()])).await;
        let disabled = channel(&f.storage, 10.0, false).await;
        let enabled = channel(&f.storage, 0.0, true).await;

        let missing = f.orchestrator.generate(request(999, "x")).await;
        assert!(matches!(
            missing.error(),
            Some(PictorError::ChannelNotFound { id: 999 })
        ));

        let off = f.orchestrator.generate(request(disabled, "x")).await;
        assert!(matches!(off.error(), Some(PictorError::ChannelDisabled { .. })));

        let no_preset = f
            .orchestrator
            .generate(GenerationRequest {
                preset_id: Some(42),
                ..request(enabled, "x")
            })
            .await;
        assert!(matches!(
            no_preset.error(),
            Some(PictorError::PresetNotFound { id: 42 })
        ));

        let empty = f.orchestrator.generate(request(enabled, "  ")).await;
        assert!(matches!(empty.error(), Some(PictorError::PromptBuildFailed)));

        assert_eq!(f.ledger.calls(), 0);
        assert_eq!(f.provider.calls(), 0);
        assert!(all_tasks(&f.storage).await.is_empty());
    }

    #[tokio::test]
    async fn anonymous_identity_is_never_charged() {
        let f = fixture(MockProvider::succeeding(vec!["u".into()])).await;
        let ch = channel(&f.storage, 10.0, true).await;
        let report = f
            .orchestrator
            .generate(GenerationRequest {
                identity: Identity::new("", "console"),
                ..request(ch, "a cat")
            })
            .await;
        assert!(report.is_success());
        assert!(!report.charged);
        assert_eq!(f.ledger.calls(), 0);
    }

    #[tokio::test]
    async fn balance_read_error_does_not_block_generation() {
        let f = fixture(MockProvider::succeeding(vec!["u".into()])).await;
        let ch = channel(&f.storage, 10.0, true).await;
        f.ledger.set_balance("u1", "gold", 50.0);
        f.ledger.fail_balance_reads(true);

        let report = f.orchestrator.generate(request(ch, "a cat")).await;
        assert!(report.is_success());
        assert!(report.charged);
        assert_eq!(report.balance_before, None);
        assert_eq!(f.ledger.balance_of("u1", "gold"), 40.0);
    }
}
