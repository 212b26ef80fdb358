// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Pictor image generation service.
//!
//! WAL-mode SQLite with embedded refinery migrations, a single-writer
//! connection via `tokio-rusqlite`, and typed operations for channels,
//! presets and generation tasks.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
