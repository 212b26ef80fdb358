// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Pictor image generation service.

use thiserror::Error;

use crate::types::TaskStatus;

/// The primary error type used across all Pictor adapter traits and core operations.
#[derive(Debug, Error)]
pub enum PictorError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Network transport errors (chat connection, closed input, remote feeds).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Image provider errors (HTTP failure, malformed response, empty output).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The referenced channel does not exist.
    #[error("channel not found: {id}")]
    ChannelNotFound { id: i64 },

    /// The referenced channel exists but is disabled.
    #[error("channel disabled: {name}")]
    ChannelDisabled { name: String },

    /// The referenced preset does not exist.
    #[error("preset not found: {id}")]
    PresetNotFound { id: i64 },

    /// The account cannot cover the requested amount.
    ///
    /// `current_balance` is `None` when the balance could not be read.
    #[error("insufficient balance: need {needed} {currency}")]
    InsufficientBalance {
        needed: f64,
        current_balance: Option<f64>,
        currency: String,
    },

    /// The final prompt came out empty.
    #[error("prompt build failed, please check the preset")]
    PromptBuildFailed,

    /// A task row was asked to make a status transition the state machine forbids.
    #[error("illegal task status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    /// Rejected input to an admin or ledger operation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PictorError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        PictorError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// True for the pre-charge validation failures that never touch the ledger or task store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PictorError::ChannelNotFound { .. }
                | PictorError::ChannelDisabled { .. }
                | PictorError::PresetNotFound { .. }
                | PictorError::PromptBuildFailed
                | PictorError::Validation(_)
        )
    }
}
