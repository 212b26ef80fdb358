// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat transport for deterministic testing.
//!
//! Turns pushed with [`MockTransport::push`] are returned by `receive()` in
//! order; replies passed to `send()` are captured for assertions.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use pictor_core::types::{AdapterType, HealthStatus, InboundTurn, OutboundMessage};
use pictor_core::{ChatTransport, Identity, PictorError, PluginAdapter};
use tokio::sync::Notify;

/// A chat transport backed by in-memory queues.
#[derive(Debug, Default)]
pub struct MockTransport {
    inbound: Mutex<VecDeque<InboundTurn>>,
    sent: Mutex<Vec<(Identity, OutboundMessage)>>,
    notify: Notify,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a turn for `receive()`.
    pub fn push(&self, turn: InboundTurn) {
        lock(&self.inbound).push_back(turn);
        self.notify.notify_one();
    }

    /// After the queue drains, `receive()` reports the transport closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Replies sent so far, in order.
    pub fn sent(&self) -> Vec<(Identity, OutboundMessage)> {
        lock(&self.sent).clone()
    }

    /// Replies sent to one user.
    pub fn sent_to(&self, user_id: &str) -> Vec<OutboundMessage> {
        lock(&self.sent)
            .iter()
            .filter(|(to, _)| to.user_id == user_id)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn clear_sent(&self) {
        lock(&self.sent).clear();
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, PictorError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PictorError> {
        self.close();
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(&self, to: &Identity, msg: OutboundMessage) -> Result<(), PictorError> {
        lock(&self.sent).push((to.clone(), msg));
        Ok(())
    }

    async fn receive(&self) -> Result<InboundTurn, PictorError> {
        loop {
            let next = lock(&self.inbound).pop_front();
            if let Some(turn) = next {
                return Ok(turn);
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(PictorError::Transport {
                    message: "mock transport closed".into(),
                    source: None,
                });
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn turns_come_back_in_order_then_closed() {
        let transport = MockTransport::new();
        for text in ["one", "two"] {
            transport.push(InboundTurn {
                identity: Identity::new("u", "c"),
                text: text.into(),
                images: Vec::new(),
            });
        }
        transport.close();

        assert_eq!(transport.receive().await.unwrap().text, "one");
        assert_eq!(transport.receive().await.unwrap().text, "two");
        let err = transport.receive().await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn sends_are_captured_per_user() {
        let transport = MockTransport::new();
        transport
            .send(&Identity::new("a", "c"), OutboundMessage::text("hi a"))
            .await
            .unwrap();
        transport
            .send(&Identity::new("b", "c"), OutboundMessage::text("hi b"))
            .await
            .unwrap();
        assert_eq!(transport.sent().len(), 2);
        assert_eq!(transport.sent_to("b")[0].text, "hi b");
    }
}
