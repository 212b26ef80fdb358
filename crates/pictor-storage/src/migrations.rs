// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations.
//!
//! The SQL files under `migrations/` are compiled in with `embed_migrations!`
//! and applied every time a [`Database`](crate::Database) is opened.

use pictor_core::PictorError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply pending migrations. Applied versions are tracked by refinery in
/// `refinery_schema_history`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), PictorError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| PictorError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        tracing::info!(version = migration.version(), name = migration.name(), "applied migration");
    }
    Ok(())
}
