//! Task launcher
//!
//! Creates a pending task, hands the job to the worker and records the
//! outcome of the hand-off. The one-pending-task-per-(target, type) rule is
//! enforced twice: a read check that produces a friendly error, and the
//! partial unique index that closes the race between concurrent launches.

use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::authorization::{AuthorizationGate, Caller};
use super::notifier::{AdminEvent, FailurePhase, Notifier};
use super::registry::ProcessorRegistry;
use super::worker_client::WorkerClient;
use crate::db::{tasks, transcripts};
use crate::error::{TaskError, TaskResult};
use crate::models::{NewTask, TargetKey, Task, TaskType};

/// Payload key carrying the per-task callback address
pub const CALLBACK_URL_FIELD: &str = "callbackUrl";

#[derive(Clone)]
pub struct TaskLauncher {
    pool: SqlitePool,
    gate: Arc<dyn AuthorizationGate>,
    worker: Arc<dyn WorkerClient>,
    registry: Arc<ProcessorRegistry>,
    notifier: Notifier,
    public_base_url: String,
}

impl TaskLauncher {
    pub fn new(
        pool: SqlitePool,
        gate: Arc<dyn AuthorizationGate>,
        worker: Arc<dyn WorkerClient>,
        registry: Arc<ProcessorRegistry>,
        notifier: Notifier,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            gate,
            worker,
            registry,
            notifier,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Address the worker reports progress and results to
    pub fn callback_url(&self, target: &TargetKey, task_id: Uuid) -> String {
        format!(
            "{}/api/workspaces/{}/transcripts/{}/taskStatuses/{}",
            self.public_base_url, target.workspace_id, target.transcript_id, task_id
        )
    }

    /// Launch `task_type` against `target`
    ///
    /// Without `force`, fails with `Conflict` while another task of the same
    /// type is pending for the target. With `force` the new task runs
    /// alongside the old one, which is left untouched.
    pub async fn launch(
        &self,
        caller: &Caller,
        task_type: TaskType,
        payload: Value,
        target: &TargetKey,
        force: bool,
    ) -> TaskResult<Task> {
        self.gate.authorize(caller, target)?;

        if !self.registry.supports(&task_type) {
            return Err(TaskError::InvalidRequest(format!(
                "unknown task type '{}'",
                task_type
            )));
        }

        let Value::Object(payload) = payload else {
            return Err(TaskError::InvalidRequest(
                "task payload must be a JSON object".to_string(),
            ));
        };

        if transcripts::get_transcript(&self.pool, target).await?.is_none() {
            return Err(TaskError::NotFound(format!("transcript {}", target)));
        }

        let active = tasks::find_active(&self.pool, target, &task_type).await?;
        if let Some(existing) = &active {
            if !force {
                return Err(TaskError::Conflict(format!(
                    "a {} task is already running for {} ({})",
                    task_type, target, existing.id
                )));
            }
            warn!(
                task_type = %task_type,
                transcript = %target,
                existing_task = %existing.id,
                "Forcing launch while another task is pending"
            );
        }

        let task = self
            .insert(task_type, &payload, target, force, active.is_some())
            .await?;

        self.dispatch(task, payload).await
    }

    async fn insert(
        &self,
        task_type: TaskType,
        payload: &Map<String, Value>,
        target: &TargetKey,
        force: bool,
        overlaps_active: bool,
    ) -> TaskResult<Task> {
        let mut new_task = NewTask {
            id: Uuid::new_v4(),
            task_type,
            request_body: serde_json::to_string(payload)?,
            forced: overlaps_active,
            target: target.clone(),
        };

        match tasks::insert_pending(&self.pool, &new_task).await {
            // Lost a race with a concurrent launch; forced launches may still coexist
            Err(TaskError::Conflict(_)) if force && !new_task.forced => {
                new_task.forced = true;
                tasks::insert_pending(&self.pool, &new_task).await
            }
            other => other,
        }
    }

    async fn dispatch(&self, task: Task, payload: Map<String, Value>) -> TaskResult<Task> {
        let target = task.target();
        let callback_url = self.callback_url(&target, task.id);

        let mut body = payload;
        body.insert(CALLBACK_URL_FIELD.to_string(), Value::String(callback_url));
        let body = Value::Object(body);

        if let Err(e) = self.worker.dispatch(&task.task_type, &body).await {
            let message = e.message().to_string();
            warn!(
                task_id = %task.id,
                task_type = %task.task_type,
                "Failed to start task: {}",
                e
            );

            tasks::mark_launch_failed(&self.pool, task.id, &message).await?;
            self.notifier.notify(AdminEvent::TaskFailed {
                task_id: task.id,
                task_type: task.task_type.clone(),
                target,
                phase: FailurePhase::Launch,
                error: message.clone(),
            });

            return Err(TaskError::Launch {
                task_id: task.id,
                message,
            });
        }

        tasks::set_request_body(&self.pool, task.id, &body.to_string()).await?;

        info!(
            task_id = %task.id,
            task_type = %task.task_type,
            transcript = %target,
            forced = task.forced,
            "Task started"
        );
        self.notifier.notify(AdminEvent::TaskStarted {
            task_id: task.id,
            task_type: task.task_type.clone(),
            target,
        });

        tasks::get(&self.pool, task.id)
            .await?
            .ok_or_else(|| TaskError::NotFound(format!("task {}", task.id)))
    }
}
