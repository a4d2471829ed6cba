//! Agenda subject persistence

use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::now_timestamp;
use crate::error::TaskResult;
use crate::models::{AgendaSubject, PollSubject, TargetKey};

#[derive(Debug, Clone)]
pub struct StoredSubject {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub agenda_item_index: Option<i64>,
}

pub async fn insert_subject(
    conn: &mut SqliteConnection,
    target: &TargetKey,
    subject: &AgendaSubject,
) -> TaskResult<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO subjects (id, workspace_id, transcript_id, name, description, agenda_item_index, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .bind(&subject.name)
    .bind(&subject.description)
    .bind(subject.agenda_item_index)
    .bind(now_timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn count_subjects(pool: &SqlitePool, target: &TargetKey) -> TaskResult<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM subjects WHERE workspace_id = ? AND transcript_id = ?")
            .bind(&target.workspace_id)
            .bind(&target.transcript_id)
            .fetch_one(pool)
            .await?;

    Ok(count)
}

pub async fn clear_subjects(pool: &SqlitePool, target: &TargetKey) -> TaskResult<u64> {
    let result = sqlx::query("DELETE FROM subjects WHERE workspace_id = ? AND transcript_id = ?")
        .bind(&target.workspace_id)
        .bind(&target.transcript_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Subjects of the transcript in agenda order (unindexed subjects last)
pub async fn list_subjects(pool: &SqlitePool, target: &TargetKey) -> TaskResult<Vec<StoredSubject>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, description, agenda_item_index FROM subjects
        WHERE workspace_id = ? AND transcript_id = ?
        ORDER BY agenda_item_index IS NULL, agenda_item_index, rowid
        "#,
    )
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| StoredSubject {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            agenda_item_index: row.get("agenda_item_index"),
        })
        .collect())
}

/// Subjects that can be matched against published decisions
///
/// Only agenda items qualify; `only` restricts the result to the given ids.
pub async fn subjects_for_polling(
    pool: &SqlitePool,
    target: &TargetKey,
    only: Option<&[String]>,
) -> TaskResult<Vec<PollSubject>> {
    Ok(list_subjects(pool, target)
        .await?
        .into_iter()
        .filter(|s| s.agenda_item_index.is_some())
        .filter(|s| only.map_or(true, |ids| ids.contains(&s.id)))
        .map(|s| PollSubject {
            subject_id: s.id,
            name: s.name,
        })
        .collect())
}
