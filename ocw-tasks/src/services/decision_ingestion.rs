//! Decision ingestion
//!
//! Upserts every matched decision keyed by subject id. Items are written
//! one by one without a surrounding transaction; an upsert can be repeated
//! safely, so a task that fails halfway can be reprocessed as a whole.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;

use super::registry::{decode_result, ResultProcessor};
use crate::db::decisions;
use crate::error::{TaskError, TaskResult};
use crate::models::{Decision, DecisionMatch, PollDecisionsResult, Task};

pub struct DecisionIngestion {
    pool: SqlitePool,
}

impl DecisionIngestion {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the number of decisions written
    pub async fn ingest(&self, task: &Task, result: &PollDecisionsResult) -> TaskResult<usize> {
        for m in &result.matches {
            let decision = to_decision(task, m)?;
            decisions::upsert_decision(&self.pool, &decision).await?;
        }
        Ok(result.matches.len())
    }
}

fn to_decision(task: &Task, m: &DecisionMatch) -> TaskResult<Decision> {
    if m.subject_id.trim().is_empty() || m.pdf_url.trim().is_empty() {
        return Err(TaskError::Processing(
            "decision match is missing subjectId or pdfUrl".to_string(),
        ));
    }

    let issue_date = m.parsed_issue_date().map_err(TaskError::Processing)?;

    Ok(Decision {
        subject_id: m.subject_id.clone(),
        pdf_url: m.pdf_url.clone(),
        ada: m.ada.clone(),
        protocol_number: m.protocol_number.clone(),
        title: m.title.clone(),
        issue_date,
        task_id: Some(task.id.to_string()),
    })
}

#[async_trait]
impl ResultProcessor for DecisionIngestion {
    async fn process(&self, task: &Task, result: &Value) -> TaskResult<()> {
        let result: PollDecisionsResult = decode_result(task, result)?;
        let written = self.ingest(task, &result).await?;

        info!(
            task_id = %task.id,
            matched = written,
            unmatched = result.unmatched_subjects.len(),
            ambiguous = result.ambiguous_subjects.len(),
            "Decision poll applied"
        );
        Ok(())
    }
}
