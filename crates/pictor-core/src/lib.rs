// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Pictor image generation service.
//!
//! This crate provides the trait definitions, error type, and domain types
//! shared by the whole workspace. Storage, ledger, provider, and transport
//! adapters implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::PictorError;
pub use types::{AdapterType, HealthStatus, Identity, IdentityKey, ImageFile, TaskStatus};

pub use traits::{
    CatalogStore, ChatTransport, ImageProvider, Ledger, PluginAdapter, ProviderFactory, TaskStore,
};
