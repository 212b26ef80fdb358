// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for Pictor's pluggable collaborators.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod ledger;
pub mod provider;
pub mod store;
pub mod transport;

pub use adapter::PluginAdapter;
pub use ledger::Ledger;
pub use provider::{ImageProvider, ProviderFactory};
pub use store::{CatalogStore, TaskStore};
pub use transport::ChatTransport;
