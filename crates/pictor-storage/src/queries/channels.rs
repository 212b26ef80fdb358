// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel CRUD operations.

use pictor_core::PictorError;
use pictor_core::types::{ChannelConfig, ChannelDraft};
use rusqlite::{OptionalExtension, params};

use super::{json_column, to_json};
use crate::database::{Database, map_tr_err};

const SELECT_CHANNEL: &str = "SELECT id, name, enabled, description, provider_params, cost, currency, \
     created_at, updated_at FROM channels";

fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelConfig> {
    Ok(ChannelConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        enabled: row.get(2)?,
        description: row.get(3)?,
        provider: json_column(row, 4)?,
        cost: row.get(5)?,
        currency: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Check a draft and return it with its name and currency normalized.
fn normalize(draft: &ChannelDraft) -> Result<ChannelDraft, PictorError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(PictorError::Validation("channel name is required".into()));
    }
    if !draft.cost.is_finite() || draft.cost < 0.0 {
        return Err(PictorError::Validation(format!(
            "channel cost must be a non-negative number, got {}",
            draft.cost
        )));
    }
    if draft.provider.api_url().trim().is_empty() {
        return Err(PictorError::Validation(
            "channel provider api_url is required".into(),
        ));
    }
    let currency = match draft.currency.trim() {
        "" => "default",
        c => c,
    };
    Ok(ChannelDraft {
        name: name.to_string(),
        currency: currency.to_string(),
        ..draft.clone()
    })
}

fn name_taken(
    conn: &rusqlite::Connection,
    name: &str,
    except_id: Option<i64>,
) -> rusqlite::Result<bool> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM channels WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(matches!(existing, Some(id) if Some(id) != except_id))
}

/// Create a channel. Names are unique.
pub async fn create_channel(db: &Database, draft: &ChannelDraft) -> Result<i64, PictorError> {
    let draft = normalize(draft)?;
    db.connection()
        .call(move |conn| {
            if name_taken(conn, &draft.name, None)? {
                return Ok(Err(PictorError::Validation(format!(
                    "channel name `{}` already exists",
                    draft.name
                ))));
            }
            conn.execute(
                "INSERT INTO channels (name, enabled, description, provider_kind, provider_params, cost, currency)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    draft.name,
                    draft.enabled,
                    draft.description,
                    draft.provider.kind().to_string(),
                    to_json(&draft.provider)?,
                    draft.cost,
                    draft.currency,
                ],
            )?;
            Ok(Ok(conn.last_insert_rowid()))
        })
        .await
        .map_err(map_tr_err)?
}

/// Replace every editable field of a channel.
pub async fn update_channel(
    db: &Database,
    id: i64,
    draft: &ChannelDraft,
) -> Result<(), PictorError> {
    let draft = normalize(draft)?;
    db.connection()
        .call(move |conn| {
            if name_taken(conn, &draft.name, Some(id))? {
                return Ok(Err(PictorError::Validation(format!(
                    "channel name `{}` already exists",
                    draft.name
                ))));
            }
            let changed = conn.execute(
                "UPDATE channels SET name = ?2, enabled = ?3, description = ?4, provider_kind = ?5,
                     provider_params = ?6, cost = ?7, currency = ?8,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![
                    id,
                    draft.name,
                    draft.enabled,
                    draft.description,
                    draft.provider.kind().to_string(),
                    to_json(&draft.provider)?,
                    draft.cost,
                    draft.currency,
                ],
            )?;
            if changed == 0 {
                return Ok(Err(PictorError::ChannelNotFound { id }));
            }
            Ok(Ok(()))
        })
        .await
        .map_err(map_tr_err)?
}

/// Enable or disable a channel. Setting the current value is a no-op.
pub async fn set_channel_enabled(db: &Database, id: i64, enabled: bool) -> Result<(), PictorError> {
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE channels SET enabled = ?2,
                     updated_at = CASE WHEN enabled = ?2 THEN updated_at
                                  ELSE strftime('%Y-%m-%dT%H:%M:%fZ', 'now') END
                 WHERE id = ?1",
                params![id, enabled],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(PictorError::ChannelNotFound { id });
    }
    Ok(())
}

/// Delete a channel. Returns whether a row was removed.
pub async fn delete_channel(db: &Database, id: i64) -> Result<bool, PictorError> {
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute("DELETE FROM channels WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a channel by id.
pub async fn get_channel(db: &Database, id: i64) -> Result<Option<ChannelConfig>, PictorError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("{SELECT_CHANNEL} WHERE id = ?1");
            let result = conn.query_row(&sql, params![id], row_to_channel);
            match result {
                Ok(channel) => Ok(Some(channel)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List channels ordered by id, optionally only the enabled ones.
pub async fn list_channels(
    db: &Database,
    enabled_only: bool,
) -> Result<Vec<ChannelConfig>, PictorError> {
    db.connection()
        .call(move |conn| {
            let sql = if enabled_only {
                format!("{SELECT_CHANNEL} WHERE enabled = 1 ORDER BY id")
            } else {
                format!("{SELECT_CHANNEL} ORDER BY id")
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_channel)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
