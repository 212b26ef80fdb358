// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing text: generation replies, collector notices and status.

use std::time::Duration;

use pictor_config::model::ReplyConfig;
use pictor_core::PictorError;
use pictor_core::types::OutboundMessage;

use crate::collector::{CANCEL_TOKEN, CancelReason, CollectOutcome, CollectedInput, START_TOKEN};
use crate::orchestrator::GenerationReport;

pub const NOTHING_COLLECTED: &str =
    "❌ Nothing collected yet. Send images or a description first.";
pub const USER_CANCELLED: &str = "✅ Generation cancelled.";
pub const SHUTDOWN_CANCELLED: &str = "⚠️ Service is shutting down, generation cancelled.";
pub const TIMED_OUT: &str = "⏱️ Timed out waiting for input, automatically cancelled.";
pub const ALREADY_WAITING: &str =
    "⏳ Already collecting input from you here. Send \"start\" or \"cancel\" first.";

/// Reply templates and switches taken from `[reply]`.
#[derive(Debug, Clone)]
pub struct ReplyTemplates {
    show_balance: bool,
    show_cost: bool,
    balance_template: String,
    cost_template: String,
    insufficient_balance_template: String,
}

impl ReplyTemplates {
    pub fn new(config: &ReplyConfig) -> Self {
        Self {
            show_balance: config.show_balance,
            show_cost: config.show_cost,
            balance_template: config.balance_template.clone(),
            cost_template: config.cost_template.clone(),
            insufficient_balance_template: config.insufficient_balance_template.clone(),
        }
    }

    /// Renders the final message for one generation attempt.
    pub fn render_report(&self, report: &GenerationReport) -> OutboundMessage {
        match &report.outcome {
            Ok(urls) => {
                let mut lines = Vec::new();
                if self.show_cost && report.cost > 0.0 && report.charged {
                    lines.push(fill(
                        &self.cost_template,
                        &[("cost", &report.cost.to_string()), ("currency", &report.currency)],
                    ));
                }
                if let (true, Some(balance)) = (self.show_balance, report.balance_after) {
                    lines.push(fill(
                        &self.balance_template,
                        &[
                            ("balance", &balance.to_string()),
                            ("currency", &report.currency),
                        ],
                    ));
                }
                OutboundMessage {
                    text: lines.join("\n"),
                    images: urls.clone(),
                }
            }
            Err(err) => OutboundMessage::text(self.render_error(err)),
        }
    }

    /// Text for a failed generation.
    pub fn render_error(&self, err: &PictorError) -> String {
        match err {
            PictorError::InsufficientBalance {
                needed,
                current_balance,
                currency,
            } => {
                let balance = current_balance
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                fill(
                    &self.insufficient_balance_template,
                    &[
                        ("cost", &needed.to_string()),
                        ("balance", &balance),
                        ("currency", currency),
                    ],
                )
            }
            other => format!("generation failed: {}", failure_reason(other)),
        }
    }
}

impl Default for ReplyTemplates {
    fn default() -> Self {
        Self::new(&ReplyConfig::default())
    }
}

/// Provider errors are shown by their message alone.
fn failure_reason(err: &PictorError) -> String {
    match err {
        PictorError::Provider { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{key}}}"), value)
    })
}

/// Progress summary sent while an interaction is collecting.
pub fn collecting_status(input: &CollectedInput, window: Duration) -> String {
    let mut text = String::from("📝 Collected so far:\n");
    if !input.text.is_empty() {
        text.push_str(&format!("  Text: {}\n", input.text));
    }
    text.push_str(&format!("  Images: {}\n\n", input.images.len()));
    text.push_str("💡 Keep sending images or text, or:\n");
    text.push_str(&format!("  • send \"{START_TOKEN}\" to generate now\n"));
    text.push_str(&format!("  • send \"{CANCEL_TOKEN}\" to abort\n"));
    text.push_str(&format!("  (valid for {} seconds)", window.as_secs()));
    text
}

/// Notice for a collection that did not produce input, `None` for `Ready`.
pub fn outcome_notice(outcome: &CollectOutcome) -> Option<&'static str> {
    match outcome {
        CollectOutcome::Ready(_) => None,
        CollectOutcome::Cancelled(CancelReason::NothingCollected) => Some(NOTHING_COLLECTED),
        CollectOutcome::Cancelled(CancelReason::UserCancelled) => Some(USER_CANCELLED),
        CollectOutcome::Cancelled(CancelReason::Shutdown) => Some(SHUTDOWN_CANCELLED),
        CollectOutcome::TimedOut => Some(TIMED_OUT),
        CollectOutcome::Busy => Some(ALREADY_WAITING),
    }
}
