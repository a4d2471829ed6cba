//! Agenda ingestion: creates the subjects extracted from a meeting agenda

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;

use super::registry::{decode_result, ResultProcessor};
use crate::db::subjects;
use crate::error::{TaskError, TaskResult};
use crate::models::{ProcessAgendaResult, Task};

pub struct AgendaIngestion {
    pool: SqlitePool,
}

impl AgendaIngestion {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultProcessor for AgendaIngestion {
    async fn process(&self, task: &Task, result: &Value) -> TaskResult<()> {
        let result: ProcessAgendaResult = decode_result(task, result)?;
        let target = task.target();

        if let Some(unnamed) = result.subjects.iter().position(|s| s.name.trim().is_empty()) {
            return Err(TaskError::Processing(format!(
                "agenda subject #{} has no name",
                unnamed
            )));
        }

        let mut tx = self.pool.begin().await?;
        for subject in &result.subjects {
            subjects::insert_subject(&mut tx, &target, subject).await?;
        }
        tx.commit().await?;

        info!(
            task_id = %task.id,
            transcript = %target,
            subjects = result.subjects.len(),
            "Agenda subjects created"
        );
        Ok(())
    }
}
