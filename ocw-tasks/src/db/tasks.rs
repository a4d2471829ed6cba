//! Task store operations
//!
//! Every transition out of `pending` is a conditional UPDATE; a return value
//! of `false` means the task was already terminal (or missing) and nothing
//! was written.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use super::{now_timestamp, parse_timestamp};
use crate::error::{TaskError, TaskResult};
use crate::models::{NewTask, TargetKey, Task, TaskStatus, TaskType};

const TASK_COLUMNS: &str = r#"
    id, type, status, stage, percent_complete, request_body, response_body,
    error_message, has_result, version, forced, workspace_id, transcript_id, created_at, updated_at
"#;

fn task_from_row(row: &SqliteRow) -> TaskResult<Task> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| TaskError::Internal(format!("Invalid task id '{}': {}", id, e)))?;

    let status: String = row.get("status");
    let status = status.parse::<TaskStatus>().map_err(TaskError::Internal)?;

    let task_type: String = row.get("type");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Task {
        id,
        task_type: TaskType::new(task_type),
        status,
        stage: row.get("stage"),
        percent_complete: row.get("percent_complete"),
        request_body: row.get("request_body"),
        response_body: row.get("response_body"),
        error_message: row.get("error_message"),
        has_result: row.get::<i64, _>("has_result") != 0,
        version: row.get("version"),
        forced: row.get::<i64, _>("forced") != 0,
        workspace_id: row.get("workspace_id"),
        transcript_id: row.get("transcript_id"),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

/// Insert a new `pending` task
///
/// A non-forced insert that collides with another non-forced pending task of
/// the same type on the same target trips `idx_tasks_single_pending` and is
/// reported as `Conflict`.
pub async fn insert_pending(pool: &SqlitePool, new_task: &NewTask) -> TaskResult<Task> {
    let now = now_timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO tasks (
            id, type, status, request_body, forced,
            workspace_id, transcript_id, created_at, updated_at
        ) VALUES (?, ?, 'pending', ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_task.id.to_string())
    .bind(new_task.task_type.as_str())
    .bind(&new_task.request_body)
    .bind(new_task.forced as i64)
    .bind(&new_task.target.workspace_id)
    .bind(&new_task.target.transcript_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {}
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(TaskError::Conflict(format!(
                "a {} task is already running for {}",
                new_task.task_type, new_task.target
            )));
        }
        Err(e) => return Err(e.into()),
    }

    get(pool, new_task.id)
        .await?
        .ok_or_else(|| TaskError::Internal(format!("Task {} vanished after insert", new_task.id)))
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> TaskResult<Option<Task>> {
    let row = sqlx::query(&format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(task_from_row).transpose()
}

/// Most recent non-terminal task of `task_type` for the target
pub async fn find_active(
    pool: &SqlitePool,
    target: &TargetKey,
    task_type: &TaskType,
) -> TaskResult<Option<Task>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {} FROM tasks
        WHERE workspace_id = ? AND transcript_id = ? AND type = ? AND status = 'pending'
        ORDER BY created_at DESC
        LIMIT 1
        "#,
        TASK_COLUMNS
    ))
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .bind(task_type.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(task_from_row).transpose()
}

/// All tasks of the target, newest first
pub async fn list_for_target(pool: &SqlitePool, target: &TargetKey) -> TaskResult<Vec<Task>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM tasks
        WHERE workspace_id = ? AND transcript_id = ?
        ORDER BY created_at DESC
        "#,
        TASK_COLUMNS
    ))
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(task_from_row).collect()
}

/// Replace the stored request body (used once the callback URL is attached)
pub async fn set_request_body(pool: &SqlitePool, id: Uuid, request_body: &str) -> TaskResult<()> {
    sqlx::query("UPDATE tasks SET request_body = ?, updated_at = ? WHERE id = ?")
        .bind(request_body)
        .bind(now_timestamp())
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Record a failed launch; the message goes to both `response_body` and `error_message`
pub async fn mark_launch_failed(pool: &SqlitePool, id: Uuid, message: &str) -> TaskResult<()> {
    sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'failed', response_body = ?, error_message = ?, updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(message)
    .bind(message)
    .bind(now_timestamp())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Progress report; fields the worker omitted keep their stored values
pub async fn record_progress(
    pool: &SqlitePool,
    id: Uuid,
    stage: Option<&str>,
    percent_complete: Option<f64>,
    version: Option<i64>,
) -> TaskResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET stage = COALESCE(?, stage),
            percent_complete = COALESCE(?, percent_complete),
            version = COALESCE(?, version),
            updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(stage)
    .bind(percent_complete)
    .bind(version)
    .bind(now_timestamp())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Worker-reported success; `has_result` is set only when a result body is stored
pub async fn mark_succeeded(
    pool: &SqlitePool,
    id: Uuid,
    response_body: Option<&str>,
    version: Option<i64>,
) -> TaskResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'succeeded',
            response_body = COALESCE(?1, response_body),
            has_result = (?1 IS NOT NULL),
            version = COALESCE(?2, version),
            updated_at = ?3
        WHERE id = ?4 AND status = 'pending'
        "#,
    )
    .bind(response_body)
    .bind(version)
    .bind(now_timestamp())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Worker-reported failure
pub async fn mark_failed(
    pool: &SqlitePool,
    id: Uuid,
    message: &str,
    version: Option<i64>,
) -> TaskResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'failed', response_body = ?, version = COALESCE(?, version), updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(message)
    .bind(version)
    .bind(now_timestamp())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Downgrade a task whose result could not be applied; `response_body` is kept
pub async fn mark_processing_failed(pool: &SqlitePool, id: Uuid, error: &str) -> TaskResult<()> {
    sqlx::query(
        "UPDATE tasks SET status = 'failed', error_message = ?, updated_at = ? WHERE id = ?",
    )
    .bind(error)
    .bind(now_timestamp())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Manual reprocessing applied the stored result
pub async fn mark_reprocessed(pool: &SqlitePool, id: Uuid) -> TaskResult<()> {
    sqlx::query(
        "UPDATE tasks SET status = 'succeeded', error_message = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(now_timestamp())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> TaskResult<bool> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Highest stored result version per type; types never seen map to `None`
pub async fn highest_versions(
    pool: &SqlitePool,
    types: &[String],
) -> TaskResult<HashMap<String, Option<i64>>> {
    let mut versions: HashMap<String, Option<i64>> =
        types.iter().map(|t| (t.clone(), None)).collect();

    if types.is_empty() {
        return Ok(versions);
    }

    let mut builder =
        QueryBuilder::new("SELECT type, MAX(version) AS version FROM tasks WHERE type IN (");
    let mut separated = builder.separated(", ");
    for task_type in types {
        separated.push_bind(task_type);
    }
    separated.push_unseparated(") GROUP BY type");

    let rows = builder.build().fetch_all(pool).await?;
    for row in rows {
        let task_type: String = row.get("type");
        let version: Option<i64> = row.get("version");
        versions.insert(task_type, version);
    }

    Ok(versions)
}
