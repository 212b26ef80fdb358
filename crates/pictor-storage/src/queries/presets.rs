// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Preset CRUD, copy, and remote feed sync.

use std::collections::{HashMap, HashSet};

use pictor_core::PictorError;
use pictor_core::types::{PresetDraft, PresetSource, PresetTemplate, RemotePreset, SyncSummary};
use rusqlite::{OptionalExtension, params};

use super::enum_column;
use crate::database::{Database, map_tr_err};

const SELECT_PRESET: &str =
    "SELECT id, name, prompt_template, source, enabled, created_at, updated_at FROM presets";

fn row_to_preset(row: &rusqlite::Row<'_>) -> rusqlite::Result<PresetTemplate> {
    Ok(PresetTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        prompt_template: row.get(2)?,
        source: enum_column(row, 3)?,
        enabled: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn normalize(draft: &PresetDraft) -> Result<PresetDraft, PictorError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(PictorError::Validation("preset name is required".into()));
    }
    if draft.prompt_template.trim().is_empty() {
        return Err(PictorError::Validation(
            "preset prompt template is required".into(),
        ));
    }
    Ok(PresetDraft {
        name: name.to_string(),
        ..draft.clone()
    })
}

/// Create a user preset.
pub async fn create_preset(db: &Database, draft: &PresetDraft) -> Result<i64, PictorError> {
    let draft = normalize(draft)?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO presets (name, prompt_template, source, enabled) VALUES (?1, ?2, ?3, ?4)",
                params![
                    draft.name,
                    draft.prompt_template,
                    PresetSource::User.to_string(),
                    draft.enabled,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Edit a preset. An edited `api` preset becomes a `user` preset so remote
/// sync no longer overwrites it.
pub async fn update_preset(db: &Database, id: i64, draft: &PresetDraft) -> Result<(), PictorError> {
    let draft = normalize(draft)?;
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE presets SET name = ?2, prompt_template = ?3, enabled = ?4, source = ?5,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![
                    id,
                    draft.name,
                    draft.prompt_template,
                    draft.enabled,
                    PresetSource::User.to_string(),
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(PictorError::PresetNotFound { id });
    }
    Ok(())
}

/// Enable or disable a preset. Setting the current value is a no-op.
pub async fn set_preset_enabled(db: &Database, id: i64, enabled: bool) -> Result<(), PictorError> {
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE presets SET enabled = ?2,
                     updated_at = CASE WHEN enabled = ?2 THEN updated_at
                                  ELSE strftime('%Y-%m-%dT%H:%M:%fZ', 'now') END
                 WHERE id = ?1",
                params![id, enabled],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(PictorError::PresetNotFound { id });
    }
    Ok(())
}

/// Delete a preset. Returns whether a row was removed.
pub async fn delete_preset(db: &Database, id: i64) -> Result<bool, PictorError> {
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute("DELETE FROM presets WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a preset by id.
pub async fn get_preset(db: &Database, id: i64) -> Result<Option<PresetTemplate>, PictorError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("{SELECT_PRESET} WHERE id = ?1");
            conn.query_row(&sql, params![id], row_to_preset).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List presets ordered by id, optionally only the enabled ones.
pub async fn list_presets(
    db: &Database,
    enabled_only: bool,
) -> Result<Vec<PresetTemplate>, PictorError> {
    db.connection()
        .call(move |conn| {
            let sql = if enabled_only {
                format!("{SELECT_PRESET} WHERE enabled = 1 ORDER BY id")
            } else {
                format!("{SELECT_PRESET} ORDER BY id")
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_preset)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Pick the first free name among `"<name> - copy"`, `"<name> - copy (2)"`, ...
pub fn copy_name(name: &str, taken: &HashSet<String>) -> String {
    let first = format!("{name} - copy");
    if !taken.contains(&first) {
        return first;
    }
    (2u32..)
        .map(|n| format!("{name} - copy ({n})"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(first)
}

/// Duplicate a preset as a new `user` preset and return the new id.
pub async fn copy_preset(db: &Database, id: i64) -> Result<i64, PictorError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let sql = format!("{SELECT_PRESET} WHERE id = ?1");
            let Some(original) = tx.query_row(&sql, params![id], row_to_preset).optional()? else {
                return Ok(Err(PictorError::PresetNotFound { id }));
            };
            let taken: HashSet<String> = {
                let mut stmt = tx.prepare("SELECT name FROM presets")?;
                let names = stmt.query_map([], |row| row.get(0))?;
                names.collect::<rusqlite::Result<_>>()?
            };
            let name = copy_name(&original.name, &taken);
            tx.execute(
                "INSERT INTO presets (name, prompt_template, source, enabled) VALUES (?1, ?2, ?3, ?4)",
                params![
                    name,
                    original.prompt_template,
                    PresetSource::User.to_string(),
                    original.enabled,
                ],
            )?;
            let new_id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(Ok(new_id))
        })
        .await
        .map_err(map_tr_err)?
}

/// Mirror the remote feed onto the `api` presets in one transaction.
///
/// Presets are matched by name. `user` presets are never touched. Entries
/// with a blank title or prompt are skipped, and for repeated titles the
/// first entry wins. An empty feed changes nothing.
pub async fn sync_api_presets(
    db: &Database,
    remote: Vec<RemotePreset>,
) -> Result<SyncSummary, PictorError> {
    let mut wanted: Vec<(String, String)> = Vec::with_capacity(remote.len());
    let mut seen = HashSet::new();
    for preset in remote {
        let title = preset.title.trim().to_string();
        if title.is_empty() || preset.prompt.trim().is_empty() || !seen.insert(title.clone()) {
            continue;
        }
        wanted.push((title, preset.prompt));
    }
    if wanted.is_empty() {
        return Ok(SyncSummary::default());
    }

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let existing: HashMap<String, (i64, String)> = {
                let mut stmt =
                    tx.prepare("SELECT id, name, prompt_template FROM presets WHERE source = 'api'")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(1)?, (row.get(0)?, row.get(2)?)))
                })?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            let mut summary = SyncSummary::default();
            for (name, (id, _)) in &existing {
                if !seen.contains(name) {
                    tx.execute("DELETE FROM presets WHERE id = ?1", params![id])?;
                    summary.deleted += 1;
                }
            }
            for (title, prompt) in &wanted {
                match existing.get(title) {
                    Some((_, current)) if current == prompt => {}
                    Some((id, _)) => {
                        tx.execute(
                            "UPDATE presets SET prompt_template = ?2,
                                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                             WHERE id = ?1",
                            params![id, prompt],
                        )?;
                        summary.updated += 1;
                    }
                    None => {
                        tx.execute(
                            "INSERT INTO presets (name, prompt_template, source, enabled)
                             VALUES (?1, ?2, 'api', 1)",
                            params![title, prompt],
                        )?;
                        summary.created += 1;
                    }
                }
            }
            tx.commit()?;
            Ok(summary)
        })
        .await
        .map_err(map_tr_err)
}
