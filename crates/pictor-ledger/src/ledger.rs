// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Balance ledger persisted to SQLite.
//!
//! Balances are kept per `(user_id, currency)` in the `balances` table and
//! every movement is appended to `ledger_entries`. Both tables are created by
//! the storage migrations. All operations go through the single
//! tokio-rusqlite background thread, so charges and gains for one account
//! are serialized.

use std::time::Duration;

use async_trait::async_trait;
use pictor_core::{AdapterType, HealthStatus, Ledger, PictorError, PluginAdapter};
use pictor_storage::database::map_tr_err;
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::info;

/// Direction of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Charge,
    Gain,
}

/// One audited balance movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// UUID v4.
    pub id: String,
    pub user_id: String,
    pub currency: String,
    pub kind: EntryKind,
    /// Signed change; negative for charges.
    pub delta: f64,
    pub balance_after: f64,
    pub created_at: String,
}

fn now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

fn check_amount(amount: f64) -> Result<(), PictorError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(PictorError::Validation(format!(
            "amount must be a non-negative number, got {amount}"
        )))
    }
}

fn read_balance(conn: &rusqlite::Connection, user_id: &str, currency: &str) -> rusqlite::Result<f64> {
    let amount: Option<f64> = conn
        .query_row(
            "SELECT amount FROM balances WHERE user_id = ?1 AND currency = ?2",
            params![user_id, currency],
            |row| row.get(0),
        )
        .optional()?;
    Ok(amount.unwrap_or(0.0))
}

fn append_entry(conn: &rusqlite::Connection, entry: &LedgerEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO ledger_entries (id, user_id, currency, kind, delta, balance_after, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.id,
            entry.user_id,
            entry.currency,
            entry.kind.to_string(),
            entry.delta,
            entry.balance_after,
            entry.created_at,
        ],
    )?;
    Ok(())
}

/// Persistent balance ledger backed by SQLite.
pub struct SqliteLedger {
    conn: tokio_rusqlite::Connection,
}

impl SqliteLedger {
    /// Create a ledger over an existing tokio-rusqlite connection.
    pub fn new(conn: tokio_rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Open a ledger on a database file.
    ///
    /// Creates its own connection. The tables must already exist, which
    /// opening the storage database first guarantees.
    pub async fn open(path: &str) -> Result<Self, PictorError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| PictorError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(Duration::from_secs(5))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        Ok(Self::new(conn))
    }

    /// Audit entries for a user, newest first.
    pub async fn entries(&self, user_id: &str, limit: u32) -> Result<Vec<LedgerEntry>, PictorError> {
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, currency, kind, delta, balance_after, created_at
                     FROM ledger_entries WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![user_id, limit], |row| {
                    let kind: String = row.get(3)?;
                    Ok(LedgerEntry {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        currency: row.get(2)?,
                        kind: kind.parse().map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                3,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?,
                        delta: row.get(4)?,
                        balance_after: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteLedger {
    fn name(&self) -> &str {
        "sqlite-ledger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Ledger
    }

    async fn health_check(&self) -> Result<HealthStatus, PictorError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1 FROM balances LIMIT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PictorError> {
        Ok(())
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn balance(&self, user_id: &str, currency: &str) -> Result<f64, PictorError> {
        let user_id = user_id.to_string();
        let currency = currency.to_string();
        self.conn
            .call(move |conn| read_balance(conn, &user_id, &currency))
            .await
            .map_err(map_tr_err)
    }

    /// Compare-and-decrement in one conditional UPDATE.
    async fn charge(&self, user_id: &str, amount: f64, currency: &str) -> Result<(), PictorError> {
        check_amount(amount)?;
        if amount == 0.0 {
            return Ok(());
        }
        let user = user_id.to_string();
        let cur = currency.to_string();
        let balance_after = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let updated = tx.execute(
                    "UPDATE balances SET amount = amount - ?3,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE user_id = ?1 AND currency = ?2 AND amount >= ?3",
                    params![user, cur, amount],
                )?;
                if updated == 0 {
                    let current = read_balance(&tx, &user, &cur)?;
                    return Ok(Err(PictorError::InsufficientBalance {
                        needed: amount,
                        current_balance: Some(current),
                        currency: cur,
                    }));
                }
                let balance_after = read_balance(&tx, &user, &cur)?;
                append_entry(
                    &tx,
                    &LedgerEntry {
                        id: uuid::Uuid::new_v4().to_string(),
                        user_id: user,
                        currency: cur,
                        kind: EntryKind::Charge,
                        delta: -amount,
                        balance_after,
                        created_at: now(),
                    },
                )?;
                tx.commit()?;
                Ok(Ok(balance_after))
            })
            .await
            .map_err(map_tr_err)??;

        info!(user_id, amount, currency, balance_after, "balance charged");
        Ok(())
    }

    async fn gain(&self, user_id: &str, amount: f64, currency: &str) -> Result<(), PictorError> {
        check_amount(amount)?;
        if amount == 0.0 {
            return Ok(());
        }
        let user = user_id.to_string();
        let cur = currency.to_string();
        let balance_after = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO balances (user_id, currency, amount) VALUES (?1, ?2, ?3)
                     ON CONFLICT (user_id, currency) DO UPDATE SET
                         amount = amount + excluded.amount,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    params![user, cur, amount],
                )?;
                let balance_after = read_balance(&tx, &user, &cur)?;
                append_entry(
                    &tx,
                    &LedgerEntry {
                        id: uuid::Uuid::new_v4().to_string(),
                        user_id: user,
                        currency: cur,
                        kind: EntryKind::Gain,
                        delta: amount,
                        balance_after,
                        created_at: now(),
                    },
                )?;
                tx.commit()?;
                Ok(balance_after)
            })
            .await
            .map_err(map_tr_err)?;

        info!(user_id, amount, currency, balance_after, "balance credited");
        Ok(())
    }
}
