//! Worker callback handling
//!
//! Applies progress, success and error updates to a task. A task leaves
//! `pending` exactly once: the status UPDATE is conditional, so duplicate or
//! late callbacks are rejected with `AlreadyTerminal` and never run a result
//! processor twice.

use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::authorization::{AuthorizationGate, Caller};
use super::notifier::{AdminEvent, FailurePhase, Notifier};
use super::registry::ProcessorRegistry;
use crate::db::tasks;
use crate::error::{TaskError, TaskResult};
use crate::models::{TargetKey, Task, TaskStatus, TaskUpdate};

#[derive(Clone)]
pub struct CallbackHandler {
    pool: SqlitePool,
    gate: Arc<dyn AuthorizationGate>,
    registry: Arc<ProcessorRegistry>,
    notifier: Notifier,
}

impl CallbackHandler {
    pub fn new(
        pool: SqlitePool,
        gate: Arc<dyn AuthorizationGate>,
        registry: Arc<ProcessorRegistry>,
        notifier: Notifier,
    ) -> Self {
        Self {
            pool,
            gate,
            registry,
            notifier,
        }
    }

    async fn load(&self, target: &TargetKey, task_id: Uuid) -> TaskResult<Task> {
        tasks::get(&self.pool, task_id)
            .await?
            .filter(|task| task.belongs_to(target))
            .ok_or_else(|| TaskError::NotFound(format!("task {} for {}", task_id, target)))
    }

    /// Apply one worker update and return the task as stored afterwards
    pub async fn apply_update(
        &self,
        target: &TargetKey,
        task_id: Uuid,
        update: TaskUpdate,
    ) -> TaskResult<Task> {
        let task = self.load(target, task_id).await?;
        if task.is_terminal() {
            warn!(
                task_id = %task_id,
                status = %task.status,
                update = update.kind(),
                "Ignoring update for finished task"
            );
            return Err(TaskError::AlreadyTerminal(task_id));
        }

        match update {
            TaskUpdate::Processing {
                stage,
                progress_percent,
                version,
            } => {
                let applied = tasks::record_progress(
                    &self.pool,
                    task_id,
                    stage.as_deref(),
                    progress_percent,
                    version,
                )
                .await?;
                if !applied {
                    return Err(TaskError::AlreadyTerminal(task_id));
                }
                debug!(task_id = %task_id, stage = ?stage, percent = ?progress_percent, "Task progress");
            }
            TaskUpdate::Success { result, version } => {
                let response_body = result.as_ref().map(Value::to_string);
                let applied =
                    tasks::mark_succeeded(&self.pool, task_id, response_body.as_deref(), version)
                        .await?;
                if !applied {
                    return Err(TaskError::AlreadyTerminal(task_id));
                }

                match result {
                    Some(result) => self.run_processor(&task, &result).await?,
                    None => {
                        info!(task_id = %task_id, "Task succeeded without a result");
                        self.notify_completed(&task);
                    }
                }
            }
            TaskUpdate::Error { error, version } => {
                let applied = tasks::mark_failed(&self.pool, task_id, &error, version).await?;
                if !applied {
                    return Err(TaskError::AlreadyTerminal(task_id));
                }
                warn!(task_id = %task_id, task_type = %task.task_type, "Worker reported failure: {}", error);
                self.notifier.notify(AdminEvent::TaskFailed {
                    task_id,
                    task_type: task.task_type.clone(),
                    target: task.target(),
                    phase: FailurePhase::Worker,
                    error,
                });
            }
        }

        self.load(target, task_id).await
    }

    /// Re-run the processor on a task's stored result (super admins only)
    pub async fn reprocess(&self, caller: &Caller, target: &TargetKey, task_id: Uuid) -> TaskResult<Task> {
        self.gate.require_super_admin(caller)?;

        let task = self.load(target, task_id).await?;
        if task.status == TaskStatus::Pending {
            return Err(TaskError::InvalidRequest(format!("task {} is still pending", task_id)));
        }

        // Launch and worker failures leave an error message in response_body, not a result
        let result = task
            .response_body
            .as_deref()
            .filter(|_| task.has_result)
            .and_then(|body| serde_json::from_str::<Value>(body).ok())
            .filter(|value| value.is_object())
            .ok_or_else(|| {
                TaskError::InvalidRequest(format!("task {} has no stored result to reprocess", task_id))
            })?;

        info!(task_id = %task_id, task_type = %task.task_type, caller = %caller.name, "Reprocessing task result");
        self.run_processor(&task, &result).await?;
        tasks::mark_reprocessed(&self.pool, task_id).await?;

        self.load(target, task_id).await
    }

    /// Run the registered processor; a failure downgrades the task to `failed`
    async fn run_processor(&self, task: &Task, result: &Value) -> TaskResult<()> {
        let outcome = match self.registry.get(&task.task_type) {
            Ok(processor) => processor.process(task, result).await,
            Err(e) => {
                error!(task_id = %task.id, "No result processor registered for {}", task.task_type);
                Err(e)
            }
        };

        match outcome {
            Ok(()) => {
                self.notify_completed(task);
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    TaskError::Processing(message) => message.clone(),
                    other => other.to_string(),
                };
                error!(task_id = %task.id, task_type = %task.task_type, "Error processing result: {}", message);

                tasks::mark_processing_failed(&self.pool, task.id, &message).await?;
                self.notifier.notify(AdminEvent::TaskFailed {
                    task_id: task.id,
                    task_type: task.task_type.clone(),
                    target: task.target(),
                    phase: FailurePhase::Processing,
                    error: message.clone(),
                });

                Err(match e {
                    TaskError::UnsupportedType(_) => e,
                    _ => TaskError::Processing(message),
                })
            }
        }
    }

    fn notify_completed(&self, task: &Task) {
        self.notifier.notify(AdminEvent::TaskCompleted {
            task_id: task.id,
            task_type: task.task_type.clone(),
            target: task.target(),
        });
    }
}
