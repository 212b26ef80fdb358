// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user, per-currency balance ledger for the Pictor image generation service.
//!
//! - **Atomic charge**: a single conditional `UPDATE` so concurrent charges never overdraw
//! - **Audit trail**: every charge and credit appends a `ledger_entries` row

pub mod ledger;

pub use ledger::{EntryKind, LedgerEntry, SqliteLedger};
