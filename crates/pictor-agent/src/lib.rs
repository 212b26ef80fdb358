// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat loop, interaction collection and billed generation for Pictor.
//!
//! [`ChatLoop`] reads turns from a [`ChatTransport`]. Each turn is first
//! offered to the [`InteractionCollector`]; turns no interaction claims
//! are routed through the [`CommandRouter`]. A matched generation command
//! opens an interaction whose collected input is handed to the
//! [`TaskOrchestrator`], and the [`GenerationReport`] is rendered back to
//! the user.

pub mod collector;
pub mod orchestrator;
pub mod presets;
pub mod prompt;
pub mod providers;
pub mod reply;
pub mod routing;
pub mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use pictor_core::types::{InboundTurn, OutboundMessage};
use pictor_core::{ChatTransport, Identity, PictorError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

pub use collector::{
    CancelReason, CollectOutcome, CollectedInput, CollectorSettings, Interaction,
    InteractionCollector,
};
pub use orchestrator::{GenerationReport, GenerationRequest, TaskOrchestrator};
pub use presets::{PresetFeed, spawn_preset_sync};
pub use prompt::build_prompt;
pub use providers::ProviderRegistry;
pub use reply::ReplyTemplates;
pub use routing::{CommandRouter, CommandTable, Invocation, ReloadSettings, Route};

/// Default time granted to in-flight interactions at shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads turns from one transport and serves them until cancelled or the
/// transport closes.
pub struct ChatLoop {
    transport: Arc<dyn ChatTransport>,
    collector: Arc<InteractionCollector>,
    router: Arc<CommandRouter>,
    orchestrator: Arc<TaskOrchestrator>,
    replies: Arc<ReplyTemplates>,
    tracker: TaskTracker,
    drain_timeout: Duration,
}

impl ChatLoop {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        collector: Arc<InteractionCollector>,
        router: Arc<CommandRouter>,
        orchestrator: Arc<TaskOrchestrator>,
        replies: ReplyTemplates,
    ) -> Self {
        Self {
            transport,
            collector,
            router,
            orchestrator,
            replies: Arc::new(replies),
            tracker: TaskTracker::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Number of interactions currently running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Runs until `cancel` fires or the transport reports it is closed,
    /// then cancels open waits and drains in-flight generations.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), PictorError> {
        info!(transport = self.transport.name(), "chat loop running");

        loop {
            tokio::select! {
                turn = self.transport.receive() => {
                    match turn {
                        Ok(turn) => self.handle_turn(turn).await,
                        Err(e) => {
                            if e.to_string().contains("closed") {
                                info!("transport closed, stopping chat loop");
                                break;
                            }
                            error!(error = %e, "transport receive error");
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping chat loop");
                    break;
                }
            }
        }

        self.collector.cancel_all();
        shutdown::drain(&self.tracker, self.drain_timeout).await;
        info!("chat loop stopped");
        Ok(())
    }

    /// Dispatches one inbound turn.
    pub async fn handle_turn(&self, turn: InboundTurn) {
        let Some(turn) = self.collector.offer(turn) else {
            debug!("turn consumed by open interaction");
            return;
        };
        let Some(invocation) = self.router.resolve(&turn.text) else {
            debug!(user_id = %turn.identity.user_id, "no command matched");
            return;
        };

        match invocation.route {
            Route::Menu { channel_id, text } => {
                debug!(channel_id, "showing preset menu");
                send(self.transport.as_ref(), &turn.identity, OutboundMessage::text(text)).await;
            }
            Route::Generate {
                channel_id,
                channel_name,
                preset_id,
                preset_name,
            } => {
                info!(
                    user_id = %turn.identity.user_id,
                    channel = %channel_name,
                    preset = %preset_name,
                    max_images = invocation.max_images,
                    "generation command"
                );
                let first = InboundTurn {
                    text: invocation.text,
                    ..turn
                };
                let interaction = self.collector.begin(first, invocation.max_images);
                let transport = Arc::clone(&self.transport);
                let orchestrator = Arc::clone(&self.orchestrator);
                let replies = Arc::clone(&self.replies);
                self.tracker.spawn(async move {
                    let identity = interaction.identity().clone();
                    let outcome = interaction.run(transport.as_ref()).await;
                    let reply = match outcome {
                        CollectOutcome::Ready(input) => {
                            let report = orchestrator
                                .generate(GenerationRequest {
                                    channel_id,
                                    preset_id: Some(preset_id),
                                    user_input: input.text,
                                    images: input.images,
                                    identity: identity.clone(),
                                })
                                .await;
                            replies.render_report(&report)
                        }
                        other => match reply::outcome_notice(&other) {
                            Some(notice) => OutboundMessage::text(notice),
                            None => return,
                        },
                    };
                    send(transport.as_ref(), &identity, reply).await;
                });
            }
        }
    }
}

async fn send(transport: &dyn ChatTransport, to: &Identity, msg: OutboundMessage) {
    if let Err(e) = transport.send(to, msg).await {
        warn!(user_id = %to.user_id, error = %e, "failed to send reply");
    }
}
