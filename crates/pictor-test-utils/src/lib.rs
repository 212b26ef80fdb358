// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Pictor integration tests.
//!
//! Provides mock adapters and a test harness for fast, deterministic
//! tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - image provider with a scripted result and call capture
//! - [`MockLedger`] - in-memory balances with call counters and failure switches
//! - [`MockTransport`] - chat transport with turn injection and reply capture
//! - [`TestHarness`] - full service stack over a temp SQLite database

pub mod harness;
pub mod mock_ledger;
pub mod mock_provider;
pub mod mock_transport;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_ledger::MockLedger;
pub use mock_provider::{MockProvider, MockProviderFactory};
pub use mock_transport::MockTransport;
