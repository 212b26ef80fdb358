// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat transport trait for messaging integrations.

use async_trait::async_trait;

use crate::error::PictorError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Identity, InboundTurn, OutboundMessage};

/// Bidirectional chat transport.
///
/// The transport parses platform messages into [`InboundTurn`]s (text plus
/// extracted images) and delivers replies to an identity.
#[async_trait]
pub trait ChatTransport: PluginAdapter {
    /// Sends a reply to the given identity.
    async fn send(&self, to: &Identity, msg: OutboundMessage) -> Result<(), PictorError>;

    /// Receives the next inbound turn. Returns a [`PictorError::Transport`]
    /// whose message contains "closed" once no more input will arrive.
    async fn receive(&self) -> Result<InboundTurn, PictorError>;
}
