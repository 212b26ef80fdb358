// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation task rows.

use pictor_core::PictorError;
use pictor_core::types::{
    GenerationTask, Identity, NewTask, TaskFilter, TaskPage, TaskStatus, TaskUpdate,
};
use rusqlite::{OptionalExtension, params};

use super::{enum_column, json_column, to_json};
use crate::database::{Database, map_tr_err};

/// Page size used when a caller passes `limit = 0`.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

const SELECT_TASK: &str = "SELECT id, user_id, username, chat_channel_id, guild_id, channel_ref, \
     channel_name, preset_ref, preset_name, user_input, final_prompt, input_images, output_images, \
     status, error, cost, currency, charged, refunded, start_time, end_time, duration_ms FROM tasks";

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<GenerationTask> {
    Ok(GenerationTask {
        id: row.get(0)?,
        identity: Identity {
            user_id: row.get(1)?,
            username: row.get(2)?,
            channel_id: row.get(3)?,
            guild_id: row.get(4)?,
        },
        channel_ref: row.get(5)?,
        channel_name: row.get(6)?,
        preset_ref: row.get(7)?,
        preset_name: row.get(8)?,
        user_input: row.get(9)?,
        final_prompt: row.get(10)?,
        input_images: json_column(row, 11)?,
        output_images: json_column(row, 12)?,
        status: enum_column(row, 13)?,
        error: row.get(14)?,
        cost: row.get(15)?,
        currency: row.get(16)?,
        charged: row.get(17)?,
        refunded: row.get(18)?,
        start_time: row.get(19)?,
        end_time: row.get(20)?,
        duration_ms: row.get(21)?,
    })
}

/// Insert a task row and return its id.
pub async fn create_task(db: &Database, task: &NewTask) -> Result<i64, PictorError> {
    let task = task.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tasks (user_id, username, chat_channel_id, guild_id, channel_ref,
                     channel_name, preset_ref, preset_name, user_input, final_prompt, input_images,
                     status, cost, currency, charged, start_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    task.identity.user_id,
                    task.identity.username,
                    task.identity.channel_id,
                    task.identity.guild_id,
                    task.channel_ref,
                    task.channel_name,
                    task.preset_ref,
                    task.preset_name,
                    task.user_input,
                    task.final_prompt,
                    to_json(&task.input_images)?,
                    task.status.to_string(),
                    task.cost,
                    task.currency,
                    task.charged,
                    task.start_time,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a partial update. Status changes must follow the task state
/// machine; re-asserting the current status is allowed.
pub async fn update_task(db: &Database, id: i64, update: &TaskUpdate) -> Result<(), PictorError> {
    let update = update.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<TaskStatus> = tx
                .query_row(
                    "SELECT status FROM tasks WHERE id = ?1",
                    params![id],
                    |row| enum_column(row, 0),
                )
                .optional()?;
            let Some(current) = current else {
                return Ok(Err(PictorError::Validation(format!("task {id} not found"))));
            };
            if let Some(next) = update.status
                && next != current
                && !current.can_transition_to(next)
            {
                return Ok(Err(PictorError::InvalidTransition {
                    from: current,
                    to: next,
                }));
            }

            let output_images = update.output_images.as_ref().map(to_json).transpose()?;
            tx.execute(
                "UPDATE tasks SET
                     status = COALESCE(?2, status),
                     output_images = COALESCE(?3, output_images),
                     error = COALESCE(?4, error),
                     refunded = COALESCE(?5, refunded),
                     end_time = COALESCE(?6, end_time),
                     duration_ms = COALESCE(?7, duration_ms)
                 WHERE id = ?1",
                params![
                    id,
                    update.status.map(|s| s.to_string()),
                    output_images,
                    update.error,
                    update.refunded,
                    update.end_time,
                    update.duration_ms,
                ],
            )?;
            tx.commit()?;
            Ok(Ok(()))
        })
        .await
        .map_err(map_tr_err)?
}

/// Get a task by id.
pub async fn get_task(db: &Database, id: i64) -> Result<Option<GenerationTask>, PictorError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("{SELECT_TASK} WHERE id = ?1");
            conn.query_row(&sql, params![id], row_to_task).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List tasks newest first. `page` is 1-based; `0` is treated as `1`.
pub async fn list_tasks(
    db: &Database,
    filter: &TaskFilter,
    page: u32,
    limit: u32,
) -> Result<TaskPage, PictorError> {
    let status = filter.status.map(|s| s.to_string());
    let user_id = filter.user_id.clone();
    let page = page.max(1);
    let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };
    let offset = i64::from(page - 1) * i64::from(limit);

    let (tasks, total) = db
        .connection()
        .call(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks
                 WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR user_id = ?2)",
                params![status, user_id],
                |row| row.get(0),
            )?;
            let sql = format!(
                "{SELECT_TASK} WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR user_id = ?2)
                 ORDER BY start_time DESC, id DESC LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status, user_id, limit, offset], row_to_task)?;
            let tasks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((tasks, total))
        })
        .await
        .map_err(map_tr_err)?;

    let total = u64::try_from(total).unwrap_or_default();
    let total_pages = u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX);
    Ok(TaskPage {
        tasks,
        total,
        page,
        total_pages,
    })
}

/// Delete a task row. Returns whether a row was removed.
pub async fn delete_task(db: &Database, id: i64) -> Result<bool, PictorError> {
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(user: &str, start: &str) -> NewTask {
        NewTask {
            identity: Identity::new(user, "chat-1").with_username("alice"),
            channel_ref: 1,
            channel_name: "banana".into(),
            preset_ref: Some(2),
            preset_name: Some("figure".into()),
            user_input: "a cat".into(),
            final_prompt: "draw: a cat".into(),
            input_images: vec!["cat.png".into()],
            status: TaskStatus::Processing,
            cost: 10.0,
            currency: "gold".into(),
            charged: true,
            start_time: start.into(),
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let db = Database::open_in_memory().await.unwrap();
        let id = create_task(&db, &new_task("u1", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        let task = get_task(&db, id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.identity.username.as_deref(), Some("alice"));
        assert_eq!(task.input_images, vec!["cat.png".to_string()]);
        assert!(task.output_images.is_empty());
        assert!(task.charged);
        assert!(!task.refunded);
        assert!(task.end_time.is_none());
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let db = Database::open_in_memory().await.unwrap();
        let id = create_task(&db, &new_task("u1", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        update_task(
            &db,
            id,
            &TaskUpdate {
                status: Some(TaskStatus::Success),
                output_images: Some(vec!["https://img/1.png".into()]),
                end_time: Some("2026-01-01T00:00:05.000Z".into()),
                duration_ms: Some(5000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let task = get_task(&db, id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert_eq!(task.output_images, vec!["https://img/1.png".to_string()]);
        assert_eq!(task.duration_ms, 5000);
        assert!(task.error.is_none());
        assert_eq!(task.final_prompt, "draw: a cat");
    }

    #[tokio::test]
    async fn illegal_transitions_are_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let id = create_task(&db, &new_task("u1", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        let to = |status| TaskUpdate {
            status: Some(status),
            ..Default::default()
        };

        let err = update_task(&db, id, &to(TaskStatus::Refunded))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PictorError::InvalidTransition {
                from: TaskStatus::Processing,
                to: TaskStatus::Refunded
            }
        ));

        update_task(&db, id, &to(TaskStatus::Failed)).await.unwrap();
        update_task(&db, id, &to(TaskStatus::Refunded)).await.unwrap();
        let err = update_task(&db, id, &to(TaskStatus::Success))
            .await
            .unwrap_err();
        assert!(matches!(err, PictorError::InvalidTransition { .. }));
        assert_eq!(
            get_task(&db, id).await.unwrap().unwrap().status,
            TaskStatus::Refunded
        );
    }

    #[tokio::test]
    async fn update_missing_task_fails() {
        let db = Database::open_in_memory().await.unwrap();
        let err = update_task(&db, 5, &TaskUpdate::default()).await.unwrap_err();
        assert!(matches!(err, PictorError::Validation(_)));
    }

    #[tokio::test]
    async fn list_filters_and_paginates_newest_first() {
        let db = Database::open_in_memory().await.unwrap();
        for i in 0..5 {
            let user = if i % 2 == 0 { "even" } else { "odd" };
            create_task(&db, &new_task(user, &format!("2026-01-01T00:00:0{i}.000Z")))
                .await
                .unwrap();
        }

        let page = list_tasks(&db, &TaskFilter::default(), 1, 2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.tasks.len(), 2);
        assert_eq!(page.tasks[0].start_time, "2026-01-01T00:00:04.000Z");

        let last = list_tasks(&db, &TaskFilter::default(), 3, 2).await.unwrap();
        assert_eq!(last.tasks.len(), 1);
        assert_eq!(last.tasks[0].start_time, "2026-01-01T00:00:00.000Z");

        let evens = TaskFilter {
            user_id: Some("even".into()),
            ..Default::default()
        };
        let page = list_tasks(&db, &evens, 1, 0).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 1);

        let failed = TaskFilter {
            status: Some(TaskStatus::Failed),
            ..Default::default()
        };
        let page = list_tasks(&db, &failed, 1, 20).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.tasks.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let db = Database::open_in_memory().await.unwrap();
        let id = create_task(&db, &new_task("u1", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        assert!(delete_task(&db, id).await.unwrap());
        assert!(get_task(&db, id).await.unwrap().is_none());
        assert!(!delete_task(&db, id).await.unwrap());
    }
}
