//! Result processor registry
//!
//! Maps a task type to the processor that turns the worker's success
//! payload into durable writes. The launcher refuses types without a
//! processor, so a lookup miss at callback time is a defect.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::agenda_ingestion::AgendaIngestion;
use super::decision_ingestion::DecisionIngestion;
use super::transcript_ingestion::TranscriptIngestion;
use crate::error::{TaskError, TaskResult};
use crate::models::{Task, TaskType};

#[async_trait]
pub trait ResultProcessor: Send + Sync {
    /// Apply `result` for `task`; any error marks the task failed
    async fn process(&self, task: &Task, result: &Value) -> TaskResult<()>;
}

#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<TaskType, Arc<dyn ResultProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in processor
    pub fn standard(pool: SqlitePool, ingestion_timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(
            TaskType::transcribe(),
            Arc::new(TranscriptIngestion::new(pool.clone(), ingestion_timeout)),
        );
        registry.register(
            TaskType::process_agenda(),
            Arc::new(AgendaIngestion::new(pool.clone())),
        );
        registry.register(
            TaskType::poll_decisions(),
            Arc::new(DecisionIngestion::new(pool)),
        );
        registry
    }

    pub fn register(&mut self, task_type: TaskType, processor: Arc<dyn ResultProcessor>) {
        self.processors.insert(task_type, processor);
    }

    pub fn supports(&self, task_type: &TaskType) -> bool {
        self.processors.contains_key(task_type)
    }

    pub fn get(&self, task_type: &TaskType) -> TaskResult<Arc<dyn ResultProcessor>> {
        self.processors
            .get(task_type)
            .cloned()
            .ok_or_else(|| TaskError::UnsupportedType(task_type.to_string()))
    }

    pub fn types(&self) -> Vec<TaskType> {
        let mut types: Vec<_> = self.processors.keys().cloned().collect();
        types.sort();
        types
    }
}

/// Decode a worker result into its typed form, reporting shape errors as processing failures
pub(crate) fn decode_result<T: serde::de::DeserializeOwned>(
    task: &Task,
    result: &Value,
) -> TaskResult<T> {
    serde_json::from_value(result.clone()).map_err(|e| {
        TaskError::Processing(format!("malformed {} result: {}", task.task_type, e))
    })
}
