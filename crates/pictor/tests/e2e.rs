// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete Pictor pipeline.
//!
//! Each test creates an isolated TestHarness with temp SQLite, the SQLite
//! ledger and mock provider/transport. Tests are independent and
//! order-insensitive.

use std::time::Duration;

use pictor_agent::reply::{SHUTDOWN_CANCELLED, TIMED_OUT, USER_CANCELLED};
use pictor_core::types::{InboundTurn, NewTask, TaskFilter, TaskStatus, TaskUpdate, now_timestamp};
use pictor_core::{Identity, ImageFile, PictorError, TaskStore};
use pictor_test_utils::{MockProvider, TestHarness};

const WAIT: Duration = Duration::from_secs(5);

async fn tasks_of(harness: &TestHarness, user: &str) -> Vec<pictor_core::types::GenerationTask> {
    harness
        .storage
        .list_tasks(
            &TaskFilter {
                status: None,
                user_id: Some(user.to_string()),
            },
            1,
            20,
        )
        .await
        .unwrap()
        .tasks
}

// ---- Chat flow ----

#[tokio::test]
async fn test_collected_chat_turns_generate_and_bill() {
    let harness = TestHarness::builder().build().await.unwrap();
    let channel = harness.add_channel("banana", 10.0, "gold").await.unwrap();
    harness
        .add_preset("figure", "figure of {{userText}}")
        .await
        .unwrap();
    harness.grant("alice", 50.0, "gold").await.unwrap();
    let (cancel, running) = harness.start();

    harness.say("alice", "/banana.figure a cat");
    harness.say("alice", "with a hat");
    harness.say("alice", "start");
    let replies = harness.replies_for("alice", 3, WAIT).await.unwrap();

    assert!(replies[0].text.contains("📝 Collected so far:"));
    assert!(replies[1].text.contains("a cat with a hat"));
    let last = &replies[2];
    assert_eq!(last.images, vec!["https://img.test/out.png"]);
    assert_eq!(last.text, "💸 Cost: 10 gold\n💰 Balance: 40 gold");
    assert_eq!(harness.provider.prompts(), vec!["figure of a cat with a hat"]);
    assert_eq!(harness.balance("alice", "gold").await.unwrap(), 40.0);

    let tasks = tasks_of(&harness, "alice").await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Success);
    assert_eq!(tasks[0].channel_ref, channel);
    assert_eq!(tasks[0].preset_name.as_deref(), Some("figure"));
    assert!(tasks[0].charged);
    assert_eq!(tasks[0].output_images, vec!["https://img.test/out.png"]);

    cancel.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_front_loaded_image_skips_collection() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.add_channel("banana", 0.0, "gold").await.unwrap();
    harness.add_preset("blue", "make it blue").await.unwrap();
    let (cancel, running) = harness.start();

    harness.transport.push(InboundTurn {
        identity: Identity::new("carol", "test"),
        text: "/banana.blue -i 1".to_string(),
        images: vec![
            ImageFile::new(vec![1, 2, 3], "image/png", "a.png"),
            ImageFile::new(vec![4, 5, 6], "image/png", "b.png"),
        ],
    });
    let replies = harness.replies_for("carol", 1, WAIT).await.unwrap();

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].images, vec!["https://img.test/out.png"]);
    assert_eq!(harness.provider.image_counts(), vec![1]);
    assert_eq!(harness.provider.prompts(), vec!["make it blue"]);

    let tasks = tasks_of(&harness, "carol").await;
    assert_eq!(tasks[0].input_images, vec!["a.png"]);
    assert!(!tasks[0].charged);

    cancel.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_channel_menu_lists_presets() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.add_channel("banana", 10.0, "gold").await.unwrap();
    harness.add_preset("figure", "figure of {{userText}}").await.unwrap();
    let (cancel, running) = harness.start();

    harness.say("dave", "banana");
    let replies = harness.replies_for("dave", 1, WAIT).await.unwrap();
    assert!(replies[0].text.contains("📋 banana - available presets"));
    assert!(replies[0].text.contains("💰 Base price: 10 gold"));
    assert!(replies[0].text.contains("  • figure"));
    assert_eq!(harness.provider.calls(), 0);

    cancel.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_user_cancel_charges_nothing() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.add_channel("banana", 10.0, "gold").await.unwrap();
    harness.add_preset("figure", "figure of {{userText}}").await.unwrap();
    harness.grant("erin", 20.0, "gold").await.unwrap();
    let (cancel, running) = harness.start();

    harness.say("erin", "/banana.figure a dog");
    harness.say("erin", "取消");
    let replies = harness.replies_for("erin", 2, WAIT).await.unwrap();

    assert_eq!(replies[1].text, USER_CANCELLED);
    assert_eq!(harness.provider.calls(), 0);
    assert_eq!(harness.balance("erin", "gold").await.unwrap(), 20.0);
    assert!(tasks_of(&harness, "erin").await.is_empty());

    cancel.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_collection_times_out() {
    let harness = TestHarness::builder()
        .with_collector_timeout(Duration::from_millis(100))
        .build()
        .await
        .unwrap();
    harness.add_channel("banana", 10.0, "gold").await.unwrap();
    harness.add_preset("figure", "figure of {{userText}}").await.unwrap();
    let (cancel, running) = harness.start();

    harness.say("frank", "/banana.figure a fox");
    let replies = harness.replies_for("frank", 2, WAIT).await.unwrap();
    assert_eq!(replies[1].text, TIMED_OUT);
    assert_eq!(harness.provider.calls(), 0);
    assert_eq!(harness.collector.open_interactions(), 0);

    // The identity is free again after the timeout.
    harness.say("frank", "/banana.figure again");
    harness.say("frank", "cancel");
    let replies = harness.replies_for("frank", 4, WAIT).await.unwrap();
    assert_eq!(replies[3].text, USER_CANCELLED);

    cancel.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_cancels_open_waits() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.add_channel("banana", 10.0, "gold").await.unwrap();
    harness.add_preset("figure", "figure of {{userText}}").await.unwrap();
    let (cancel, running) = harness.start();

    harness.say("gina", "/banana.figure a bird");
    harness.replies_for("gina", 1, WAIT).await.unwrap();

    cancel.cancel();
    running.await.unwrap().unwrap();

    let replies = harness.replies_for("gina", 2, WAIT).await.unwrap();
    assert_eq!(replies[1].text, SHUTDOWN_CANCELLED);
    assert_eq!(harness.provider.calls(), 0);
    assert_eq!(harness.chat.in_flight(), 0);
}

#[tokio::test]
async fn test_identities_collect_independently() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.add_channel("banana", 0.0, "gold").await.unwrap();
    harness.add_preset("figure", "figure of {{userText}}").await.unwrap();
    let (cancel, running) = harness.start();

    harness.say("hana", "/banana.figure a cat");
    harness.say("ivan", "/banana.figure a dog");
    harness.say("ivan", "start");
    harness.say("hana", "start");
    harness.replies_for("hana", 2, WAIT).await.unwrap();
    harness.replies_for("ivan", 2, WAIT).await.unwrap();

    let mut prompts = harness.provider.prompts();
    prompts.sort();
    assert_eq!(prompts, vec!["figure of a cat", "figure of a dog"]);

    cancel.cancel();
    running.await.unwrap().unwrap();
}

// ---- Billing ----

#[tokio::test]
async fn test_insufficient_balance_is_reported_without_charge() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.add_channel("banana", 10.0, "gold").await.unwrap();
    harness.add_preset("figure", "figure of {{userText}}").await.unwrap();
    harness.grant("judy", 5.0, "gold").await.unwrap();
    let (cancel, running) = harness.start();

    harness.say("judy", "/banana.figure a cat");
    harness.say("judy", "start");
    let replies = harness.replies_for("judy", 2, WAIT).await.unwrap();

    assert_eq!(
        replies[1].text,
        "❌ Insufficient balance! Need 10 gold, current balance: 5 gold"
    );
    assert_eq!(harness.provider.calls(), 0);
    assert_eq!(harness.balance("judy", "gold").await.unwrap(), 5.0);
    assert!(tasks_of(&harness, "judy").await.is_empty());

    cancel.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_provider_failure_is_refunded() {
    let harness = TestHarness::builder()
        .with_provider(MockProvider::failing("upstream exploded"))
        .build()
        .await
        .unwrap();
    let channel = harness.add_channel("banana", 10.0, "gold").await.unwrap();
    harness.grant("kim", 50.0, "gold").await.unwrap();

    let report = harness.generate("kim", channel, None, "a cat").await;

    assert!(!report.is_success());
    assert!(report.charged);
    assert!(report.refunded);
    assert!(matches!(report.error(), Some(PictorError::Provider { .. })));
    assert_eq!(harness.balance("kim", "gold").await.unwrap(), 50.0);

    let task = harness
        .storage
        .get_task(report.task_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.charged);
    assert!(task.refunded);
    assert!(task.error.unwrap().contains("upstream exploded"));

    let history = harness.ledger.entries("kim", 10).await.unwrap();
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn test_free_channel_never_touches_balance() {
    let harness = TestHarness::builder().build().await.unwrap();
    let channel = harness.add_channel("free", 0.0, "gold").await.unwrap();
    let preset = harness.add_preset("poster", "poster: {{userText}}").await.unwrap();

    let report = harness.generate("lee", channel, Some(preset), "  sunset ").await;

    assert!(report.is_success());
    assert!(!report.charged);
    assert_eq!(report.cost, 0.0);
    assert_eq!(harness.provider.prompts(), vec!["poster: sunset"]);
    assert!(harness.ledger.entries("lee", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_anonymous_caller_is_not_charged() {
    let harness = TestHarness::builder().build().await.unwrap();
    let channel = harness.add_channel("banana", 10.0, "gold").await.unwrap();

    let report = harness.generate("", channel, None, "a cat").await;

    assert!(report.is_success());
    assert!(!report.charged);
    assert_eq!(harness.provider.calls(), 1);
}

#[tokio::test]
async fn test_settle_refund_on_failed_charged_task() {
    let harness = TestHarness::builder().build().await.unwrap();
    let channel = harness.add_channel("banana", 10.0, "gold").await.unwrap();

    let id = harness
        .storage
        .create_task(&NewTask {
            identity: Identity::new("mia", "test"),
            channel_ref: channel,
            channel_name: "banana".to_string(),
            preset_ref: None,
            preset_name: None,
            user_input: "a cat".to_string(),
            final_prompt: "a cat".to_string(),
            input_images: Vec::new(),
            status: TaskStatus::Processing,
            cost: 10.0,
            currency: "gold".to_string(),
            charged: true,
            start_time: now_timestamp(),
        })
        .await
        .unwrap();
    harness
        .storage
        .update_task(
            id,
            &TaskUpdate {
                status: Some(TaskStatus::Failed),
                error: Some("refund failed earlier".to_string()),
                refunded: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let task = harness.orchestrator.settle_refund(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Refunded);
    assert!(task.refunded);
    assert_eq!(harness.balance("mia", "gold").await.unwrap(), 10.0);

    // A settled task cannot be refunded twice.
    let err = harness.orchestrator.settle_refund(id).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(harness.balance("mia", "gold").await.unwrap(), 10.0);
}

#[tokio::test]
async fn test_disabled_channel_is_rejected_before_billing() {
    let harness = TestHarness::builder().build().await.unwrap();
    let channel = harness.add_channel("banana", 10.0, "gold").await.unwrap();
    harness.grant("ned", 50.0, "gold").await.unwrap();
    harness
        .storage
        .set_channel_enabled(channel, false)
        .await
        .unwrap();

    let report = harness.generate("ned", channel, None, "a cat").await;

    assert!(matches!(
        report.error(),
        Some(PictorError::ChannelDisabled { .. })
    ));
    assert!(report.task_id.is_none());
    assert_eq!(harness.balance("ned", "gold").await.unwrap(), 50.0);
    assert_eq!(harness.provider.calls(), 0);
}
