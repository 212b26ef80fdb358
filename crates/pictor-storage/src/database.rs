// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use pictor_core::PictorError;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into PictorError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> PictorError {
    PictorError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the service database.
///
/// Wraps the single `tokio_rusqlite::Connection`; every query module goes
/// through [`Database::connection`].
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, PictorError> {
        Self::open_with(path, true).await
    }

    /// Open the database, choosing the journal mode explicitly.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, PictorError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| PictorError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| PictorError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, PictorError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| PictorError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), PictorError> {
        self.conn
            .call(move |conn| {
                if wal_mode {
                    let mode: String = conn.pragma_update_and_check(
                        None,
                        "journal_mode",
                        "WAL",
                        |row| row.get(0),
                    )?;
                    debug!(journal_mode = %mode, "journal mode set");
                }
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.busy_timeout(Duration::from_secs(5))?;
                Ok(migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)?
    }

    /// The shared connection. All queries are closures run on its thread.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), PictorError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(|e| PictorError::Storage {
            source: Box::new(e),
        })
    }

    /// Fold the WAL back into the main database file.
    pub async fn checkpoint(&self) -> Result<(), PictorError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
