// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-turn input collection, one interaction per identity.
//!
//! An [`Interaction`] merges text and images from consecutive turns of one
//! identity until the user sends the start token, the cancel token, or
//! stays silent for the configured window. Each open interaction owns one
//! slot in the collector's table, keyed by [`IdentityKey`]. The chat loop
//! hands every inbound turn to [`InteractionCollector::offer`] first; a turn
//! whose identity has a slot is consumed by that interaction.
//!
//! A slot stores at most one armed waiter. Delivery and timeout both take
//! the waiter out of the slot under the table's shard lock, so exactly one
//! of them resolves a given wait.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pictor_config::model::CollectorConfig;
use pictor_core::types::{InboundTurn, OutboundMessage};
use pictor_core::{ChatTransport, Identity, IdentityKey, ImageFile};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::reply;

pub const START_TOKEN: &str = "start";
pub const CANCEL_TOKEN: &str = "cancel";
const START_TOKENS: [&str; 2] = ["开始", START_TOKEN];
const CANCEL_TOKENS: [&str; 2] = ["取消", CANCEL_TOKEN];

/// Control words recognised in a turn's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Cancel,
}

impl Control {
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.trim().to_lowercase();
        if START_TOKENS.contains(&normalized.as_str()) {
            Some(Control::Start)
        } else if CANCEL_TOKENS.contains(&normalized.as_str()) {
            Some(Control::Cancel)
        } else {
            None
        }
    }
}

/// Merged input of one interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedInput {
    /// Non-empty turn texts joined by single spaces.
    pub text: String,
    /// Images in arrival order, capped at the interaction's limit.
    pub images: Vec<ImageFile>,
    pub turns_consumed: u32,
}

impl CollectedInput {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty()
    }

    pub fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    /// Appends images, keeping the earliest `max_images`.
    pub fn push_images(&mut self, images: Vec<ImageFile>, max_images: usize) {
        self.images.extend(images);
        self.images.truncate(max_images);
    }

    /// Absorbs one turn. Control words are not merged into the text.
    pub fn absorb(&mut self, turn: InboundTurn, max_images: usize) -> Option<Control> {
        let control = Control::parse(&turn.text);
        if control.is_none() {
            self.push_text(&turn.text);
        }
        self.push_images(turn.images, max_images);
        self.turns_consumed += 1;
        control
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The user sent the cancel token.
    UserCancelled,
    /// The start token arrived before any text or image.
    NothingCollected,
    /// The collector was shut down while waiting.
    Shutdown,
}

/// Terminal state of an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    Ready(CollectedInput),
    Cancelled(CancelReason),
    TimedOut,
    /// Another interaction already owns this identity.
    Busy,
}

/// Collector settings, from `[collector]`.
#[derive(Debug, Clone, Copy)]
pub struct CollectorSettings {
    pub timeout: Duration,
    pub max_images: usize,
}

impl From<&CollectorConfig> for CollectorSettings {
    fn from(config: &CollectorConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_images: config.max_images,
        }
    }
}

struct Slot {
    id: u64,
    waiter: Option<oneshot::Sender<InboundTurn>>,
    backlog: VecDeque<InboundTurn>,
}

/// Table of open interactions.
pub struct InteractionCollector {
    slots: DashMap<IdentityKey, Slot>,
    settings: CollectorSettings,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl InteractionCollector {
    pub fn new(settings: CollectorSettings) -> Self {
        Self {
            slots: DashMap::new(),
            settings,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> CollectorSettings {
        self.settings
    }

    /// Number of identities with an open interaction.
    pub fn open_interactions(&self) -> usize {
        self.slots.len()
    }

    /// Hands a turn to the interaction open for its identity.
    ///
    /// Returns the turn back when no interaction owns the identity.
    pub fn offer(&self, turn: InboundTurn) -> Option<InboundTurn> {
        let key = turn.identity.key();
        let Some(mut slot) = self.slots.get_mut(&key) else {
            return Some(turn);
        };
        match slot.waiter.take() {
            Some(waiter) => {
                if let Err(turn) = waiter.send(turn) {
                    // The waiting task went away without retracting; keep the turn.
                    slot.backlog.push_back(turn);
                }
            }
            None => slot.backlog.push_back(turn),
        }
        None
    }

    /// Opens an interaction from its first turn.
    ///
    /// The first turn is evaluated immediately. When the interaction needs
    /// more input its slot is registered before this returns, so turns that
    /// arrive later are never routed elsewhere.
    pub fn begin(self: &Arc<Self>, first: InboundTurn, max_images: usize) -> Interaction {
        let key = first.identity.key();
        let identity = first.identity.clone();
        let max_images = max_images.max(1);
        let mut interaction = Interaction {
            collector: Arc::clone(self),
            key,
            identity,
            id: 0,
            input: CollectedInput::default(),
            max_images,
            resolved: None,
        };

        if self.closed.load(Ordering::SeqCst) {
            interaction.resolved = Some(CollectOutcome::Cancelled(CancelReason::Shutdown));
            return interaction;
        }

        let vacant = match self.slots.entry(interaction.key.clone()) {
            Entry::Occupied(_) => {
                debug!(identity = %interaction.key, "interaction already open");
                interaction.resolved = Some(CollectOutcome::Busy);
                return interaction;
            }
            Entry::Vacant(vacant) => vacant,
        };

        let front_loaded = !first.images.is_empty();
        let control = interaction.input.absorb(first, max_images);
        if front_loaded {
            interaction.resolved = Some(CollectOutcome::Ready(interaction.input.clone()));
        } else if let Some(outcome) = interaction.decide(control) {
            interaction.resolved = Some(outcome);
        } else {
            interaction.id = self.next_id.fetch_add(1, Ordering::Relaxed);
            vacant.insert(Slot {
                id: interaction.id,
                waiter: None,
                backlog: VecDeque::new(),
            });
        }
        interaction
    }

    /// Opens an interaction and drives it to its outcome.
    pub async fn collect(
        self: &Arc<Self>,
        transport: &dyn ChatTransport,
        first: InboundTurn,
        max_images: usize,
    ) -> CollectOutcome {
        self.begin(first, max_images).run(transport).await
    }

    /// Stops accepting new waits. Interactions still work through turns
    /// they already received, then resolve as [`CancelReason::Shutdown`].
    pub fn cancel_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut woken = 0usize;
        for mut slot in self.slots.iter_mut() {
            if slot.waiter.take().is_some() {
                woken += 1;
            }
        }
        if !self.slots.is_empty() {
            info!(open = self.slots.len(), woken, "cancelling open interactions");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// One identity's interaction. Dropping it releases the identity's slot.
pub struct Interaction {
    collector: Arc<InteractionCollector>,
    key: IdentityKey,
    identity: Identity,
    id: u64,
    input: CollectedInput,
    max_images: usize,
    resolved: Option<CollectOutcome>,
}

impl Interaction {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Input merged so far.
    pub fn input(&self) -> &CollectedInput {
        &self.input
    }

    /// Outcome decided by the first turn, if any.
    pub fn resolved(&self) -> Option<&CollectOutcome> {
        self.resolved.as_ref()
    }

    fn decide(&self, control: Option<Control>) -> Option<CollectOutcome> {
        match control? {
            Control::Start if self.input.is_empty() => {
                Some(CollectOutcome::Cancelled(CancelReason::NothingCollected))
            }
            Control::Start => Some(CollectOutcome::Ready(self.input.clone())),
            Control::Cancel => Some(CollectOutcome::Cancelled(CancelReason::UserCancelled)),
        }
    }

    /// Collects turns until a terminal state, sending a status summary
    /// before each wait.
    pub async fn run(mut self, transport: &dyn ChatTransport) -> CollectOutcome {
        if let Some(outcome) = self.resolved.take() {
            return outcome;
        }

        let outcome = loop {
            let status = reply::collecting_status(&self.input, self.collector.settings.timeout);
            if let Err(e) = transport.send(&self.identity, OutboundMessage::text(status)).await {
                warn!(identity = %self.key, error = %e, "failed to send collection status");
            }

            let turn = match self.next_turn().await {
                Ok(turn) => turn,
                Err(outcome) => break outcome,
            };
            let control = self.input.absorb(turn, self.max_images);
            debug!(
                identity = %self.key,
                turns = self.input.turns_consumed,
                images = self.input.images.len(),
                "turn collected"
            );
            if let Some(outcome) = self.decide(control) {
                break outcome;
            }
        };

        match &outcome {
            CollectOutcome::Ready(input) => info!(
                identity = %self.key,
                turns = input.turns_consumed,
                images = input.images.len(),
                "input collected"
            ),
            other => info!(identity = %self.key, outcome = ?other, "interaction ended"),
        }
        outcome
    }

    /// Waits for the next turn of this identity or the window to close.
    async fn next_turn(&mut self) -> Result<InboundTurn, CollectOutcome> {
        let mut rx = {
            let Some(mut slot) = self
                .collector
                .slots
                .get_mut(&self.key)
                .filter(|slot| slot.id == self.id)
            else {
                return Err(CollectOutcome::Cancelled(CancelReason::Shutdown));
            };
            if let Some(turn) = slot.backlog.pop_front() {
                return Ok(turn);
            }
            if self.collector.is_closed() {
                return Err(CollectOutcome::Cancelled(CancelReason::Shutdown));
            }
            let (tx, rx) = oneshot::channel();
            slot.waiter = Some(tx);
            rx
        };

        match tokio::time::timeout(self.collector.settings.timeout, &mut rx).await {
            Ok(Ok(turn)) => Ok(turn),
            Ok(Err(_)) => Err(CollectOutcome::Cancelled(CancelReason::Shutdown)),
            Err(_) => {
                let retracted = self
                    .collector
                    .slots
                    .remove_if(&self.key, |_, slot| slot.id == self.id && slot.waiter.is_some());
                if retracted.is_some() {
                    return Err(CollectOutcome::TimedOut);
                }
                // A turn was delivered as the window closed.
                rx.await
                    .map_err(|_| CollectOutcome::Cancelled(CancelReason::Shutdown))
            }
        }
    }
}

impl Drop for Interaction {
    fn drop(&mut self) {
        if self.id == 0 {
            return;
        }
        let removed = self
            .collector
            .slots
            .remove_if(&self.key, |_, slot| slot.id == self.id);
        if let Some((_, slot)) = removed.filter(|(_, slot)| !slot.backlog.is_empty()) {
            debug!(identity = %self.key, dropped = slot.backlog.len(), "discarding unread turns");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pictor_test_utils::MockTransport;
    use proptest::prelude::*;

    use super::*;

    fn collector(timeout_ms: u64) -> Arc<InteractionCollector> {
        Arc::new(InteractionCollector::new(CollectorSettings {
            timeout: Duration::from_millis(timeout_ms),
            max_images: 3,
        }))
    }

    fn who() -> Identity {
        Identity::new("u1", "c1")
    }

    fn turn(text: &str) -> InboundTurn {
        InboundTurn {
            identity: who(),
            text: text.into(),
            images: Vec::new(),
        }
    }

    fn image(name: &str) -> ImageFile {
        ImageFile::new(vec![1, 2, 3], "image/png", name)
    }

    fn with_images(text: &str, names: &[&str]) -> InboundTurn {
        InboundTurn {
            images: names.iter().map(|n| image(n)).collect(),
            ..turn(text)
        }
    }

    #[test]
    fn control_tokens_are_case_insensitive() {
        assert_eq!(Control::parse(" START "), Some(Control::Start));
        assert_eq!(Control::parse("开始"), Some(Control::Start));
        assert_eq!(Control::parse("Cancel"), Some(Control::Cancel));
        assert_eq!(Control::parse("取消"), Some(Control::Cancel));
        assert_eq!(Control::parse("start now"), None);
    }

    #[tokio::test]
    async fn first_turn_with_images_is_ready_immediately() {
        let c = collector(50);
        let transport = MockTransport::new();
        let outcome = c
            .collect(&transport, with_images("cancel", &["a.png"]), 3)
            .await;
        match outcome {
            CollectOutcome::Ready(input) => {
                assert_eq!(input.images.len(), 1);
                assert_eq!(input.turns_consumed, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(transport.sent().is_empty(), "no status for a front-loaded turn");
        assert_eq!(c.open_interactions(), 0);
    }

    #[tokio::test]
    async fn start_with_nothing_collected_cancels() {
        let c = collector(50);
        let transport = MockTransport::new();
        let outcome = c.collect(&transport, turn("start"), 3).await;
        assert_eq!(
            outcome,
            CollectOutcome::Cancelled(CancelReason::NothingCollected)
        );
        assert_eq!(c.open_interactions(), 0);
    }

    #[tokio::test]
    async fn turns_merge_until_start() {
        let c = collector(1_000);
        let transport = MockTransport::new();
        let interaction = c.begin(turn("a cat"), 2);
        assert_eq!(c.open_interactions(), 1);

        assert!(c.offer(with_images("on a sofa", &["1.png", "2.png", "3.png"])).is_none());
        assert!(c.offer(turn("start")).is_none());

        match interaction.run(&transport).await {
            CollectOutcome::Ready(input) => {
                assert_eq!(input.text, "a cat on a sofa");
                assert_eq!(input.images.len(), 2);
                assert_eq!(input.images[0].filename, "1.png");
                assert_eq!(input.turns_consumed, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(c.open_interactions(), 0);
        assert!(transport.sent()[0].1.text.contains("Collected so far"));
    }

    #[tokio::test]
    async fn cancel_token_cancels() {
        let c = collector(1_000);
        let transport = MockTransport::new();
        let interaction = c.begin(turn("a cat"), 3);
        c.offer(turn("取消"));
        assert_eq!(
            interaction.run(&transport).await,
            CollectOutcome::Cancelled(CancelReason::UserCancelled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out_and_retracts_the_wait() {
        let c = collector(60_000);
        let transport = MockTransport::new();
        let outcome = c.collect(&transport, turn("a cat"), 3).await;
        assert_eq!(outcome, CollectOutcome::TimedOut);
        assert_eq!(c.open_interactions(), 0);

        // A late turn is no longer consumed.
        assert!(c.offer(turn("start")).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn turn_at_the_deadline_is_never_lost() {
        let transport = Arc::new(MockTransport::new());
        for offset_ms in 15..=25u64 {
            let c = collector(20);
            let interaction = c.begin(turn("a cat"), 3);
            let t = Arc::clone(&transport);
            let handle = tokio::spawn(async move { interaction.run(t.as_ref()).await });

            tokio::time::sleep(Duration::from_millis(offset_ms)).await;
            let returned = c.offer(turn("start"));
            let outcome = handle.await.unwrap();

            match (returned, outcome) {
                // Consumed by the interaction, so it must have been read.
                (None, CollectOutcome::Ready(input)) => {
                    assert_eq!(input.text, "a cat");
                    assert_eq!(input.turns_consumed, 2);
                }
                // Handed back to the caller after the window closed.
                (Some(back), CollectOutcome::TimedOut) => assert_eq!(back.text, "start"),
                (returned, outcome) => {
                    panic!("offset {offset_ms}ms: returned {returned:?}, outcome {outcome:?}")
                }
            }
            assert_eq!(c.open_interactions(), 0);
        }
    }

    #[tokio::test]
    async fn second_interaction_for_same_identity_is_busy() {
        let c = collector(1_000);
        let transport = MockTransport::new();
        let _open = c.begin(turn("a cat"), 3);
        let outcome = c.collect(&transport, turn("a dog"), 3).await;
        assert_eq!(outcome, CollectOutcome::Busy);
        assert_eq!(c.open_interactions(), 1);
    }

    #[tokio::test]
    async fn other_identities_are_independent() {
        let c = collector(1_000);
        let _open = c.begin(turn("a cat"), 3);
        let stranger = InboundTurn {
            identity: Identity::new("u2", "c1"),
            text: "start".into(),
            images: Vec::new(),
        };
        assert!(c.offer(stranger).is_some());
    }

    #[tokio::test]
    async fn cancel_all_resolves_waiters_as_shutdown() {
        let c = collector(60_000);
        let transport = Arc::new(MockTransport::new());
        let interaction = c.begin(turn("a cat"), 3);
        let t = Arc::clone(&transport);
        let handle = tokio::spawn(async move { interaction.run(t.as_ref()).await });

        while transport.sent().is_empty() {
            tokio::task::yield_now().await;
        }
        c.cancel_all();
        assert_eq!(
            handle.await.unwrap(),
            CollectOutcome::Cancelled(CancelReason::Shutdown)
        );
        assert_eq!(c.open_interactions(), 0);
        assert_eq!(
            c.collect(transport.as_ref(), turn("a dog"), 3).await,
            CollectOutcome::Cancelled(CancelReason::Shutdown)
        );
    }

    #[tokio::test]
    async fn turns_received_before_shutdown_are_still_processed() {
        let c = collector(60_000);
        let transport = MockTransport::new();
        let interaction = c.begin(turn("a cat"), 3);
        c.offer(turn("start"));
        c.cancel_all();
        assert!(matches!(
            interaction.run(&transport).await,
            CollectOutcome::Ready(_)
        ));
    }

    #[tokio::test]
    async fn dropping_an_interaction_frees_the_identity() {
        let c = collector(1_000);
        let interaction = c.begin(turn("a cat"), 3);
        drop(interaction);
        assert_eq!(c.open_interactions(), 0);
        assert!(c.offer(turn("start")).is_some());
    }

    proptest! {
        #[test]
        fn merge_joins_texts_and_caps_images(
            turns in proptest::collection::vec(("[a-z ]{0,8}", 0usize..3), 0..8),
            max_images in 1usize..5,
        ) {
            let mut input = CollectedInput::default();
            let mut all_images = Vec::new();
            for (i, (text, count)) in turns.iter().enumerate() {
                let images: Vec<ImageFile> =
                    (0..*count).map(|j| image(&format!("{i}-{j}.png"))).collect();
                all_images.extend(images.clone());
                input.absorb(
                    InboundTurn { identity: who(), text: text.clone(), images },
                    max_images,
                );
            }

            let expected_text = turns
                .iter()
                .map(|(t, _)| t.trim())
                .filter(|t| !t.is_empty() && Control::parse(t).is_none())
                .collect::<Vec<_>>()
                .join(" ");
            all_images.truncate(max_images);
            prop_assert_eq!(input.text, expected_text);
            prop_assert_eq!(input.images, all_images);
            prop_assert_eq!(input.turns_consumed as usize, turns.len());
        }
    }
}
