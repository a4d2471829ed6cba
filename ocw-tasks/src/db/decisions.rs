//! Decision persistence

use sqlx::{Row, SqlitePool};

use super::{format_timestamp, now_timestamp, parse_timestamp};
use crate::error::TaskResult;
use crate::models::Decision;

/// Create or overwrite the decision for `decision.subject_id`
///
/// Every field is replaced, including the ones the new match leaves empty.
pub async fn upsert_decision(pool: &SqlitePool, decision: &Decision) -> TaskResult<()> {
    let now = now_timestamp();
    let issue_date = decision.issue_date.map(format_timestamp);

    sqlx::query(
        r#"
        INSERT INTO decisions (
            subject_id, pdf_url, ada, protocol_number, title, issue_date,
            task_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(subject_id) DO UPDATE SET
            pdf_url = excluded.pdf_url,
            ada = excluded.ada,
            protocol_number = excluded.protocol_number,
            title = excluded.title,
            issue_date = excluded.issue_date,
            task_id = excluded.task_id,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&decision.subject_id)
    .bind(&decision.pdf_url)
    .bind(&decision.ada)
    .bind(&decision.protocol_number)
    .bind(&decision.title)
    .bind(issue_date)
    .bind(&decision.task_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_decision(pool: &SqlitePool, subject_id: &str) -> TaskResult<Option<Decision>> {
    let row = sqlx::query(
        r#"
        SELECT subject_id, pdf_url, ada, protocol_number, title, issue_date, task_id
        FROM decisions WHERE subject_id = ?
        "#,
    )
    .bind(subject_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let issue_date: Option<String> = row.get("issue_date");
    let issue_date = issue_date
        .map(|s| parse_timestamp("issue_date", &s))
        .transpose()?;

    Ok(Some(Decision {
        subject_id: row.get("subject_id"),
        pdf_url: row.get("pdf_url"),
        ada: row.get("ada"),
        protocol_number: row.get("protocol_number"),
        title: row.get("title"),
        issue_date,
        task_id: row.get("task_id"),
    }))
}

pub async fn count_decisions(pool: &SqlitePool) -> TaskResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM decisions")
        .fetch_one(pool)
        .await?;

    Ok(count)
}
