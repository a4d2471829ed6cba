//! Operator-facing task operations
//!
//! Job request builders (transcribe, agenda processing, decision polling)
//! prepare the target and payload before handing off to the launcher; the
//! remaining operations inspect or delete tasks.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::authorization::{AuthorizationGate, Caller};
use super::callback_handler::CallbackHandler;
use super::task_launcher::TaskLauncher;
use crate::db::{subjects, tasks, transcripts};
use crate::error::{TaskError, TaskResult};
use crate::models::{
    PollDecisionsRequest, ProcessAgendaRequest, TargetKey, Task, TaskType, TaskUpdate,
    TranscribeRequest, Voiceprint,
};

/// Generic launch of any registered task type
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchJob {
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default = "empty_payload")]
    pub payload: Value,
    #[serde(default)]
    pub force: bool,
}

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeJob {
    #[serde(alias = "youtubeUrl")]
    pub media_url: String,
    #[serde(default)]
    pub custom_vocabulary: Option<Vec<String>>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub voiceprints: Option<Vec<Voiceprint>>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessAgendaJob {
    pub agenda_url: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub topic_labels: Vec<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDecisionsJob {
    pub meeting_date: String,
    pub diavgeia_uid: String,
    #[serde(default)]
    pub diavgeia_unit_id: Option<String>,
    #[serde(default)]
    pub subject_ids: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct TaskService {
    pool: SqlitePool,
    gate: Arc<dyn AuthorizationGate>,
    launcher: TaskLauncher,
    callbacks: CallbackHandler,
    delete_cooldown: Duration,
}

impl TaskService {
    pub fn new(
        pool: SqlitePool,
        gate: Arc<dyn AuthorizationGate>,
        launcher: TaskLauncher,
        callbacks: CallbackHandler,
        delete_cooldown: Duration,
    ) -> Self {
        Self {
            pool,
            gate,
            launcher,
            callbacks,
            delete_cooldown,
        }
    }

    pub fn gate(&self) -> &Arc<dyn AuthorizationGate> {
        &self.gate
    }

    pub async fn launch(&self, caller: &Caller, target: &TargetKey, job: LaunchJob) -> TaskResult<Task> {
        if job.task_type.trim().is_empty() {
            return Err(TaskError::InvalidRequest("task type is required".to_string()));
        }
        self.launcher
            .launch(caller, TaskType::new(job.task_type), job.payload, target, job.force)
            .await
    }

    pub async fn request_transcribe(
        &self,
        caller: &Caller,
        target: &TargetKey,
        job: TranscribeJob,
    ) -> TaskResult<Task> {
        self.gate.authorize(caller, target)?;
        require_non_empty("mediaUrl", &job.media_url)?;
        self.require_transcript(target).await?;

        let mut conn = self.pool.acquire().await?;
        let has_segments = transcripts::has_segments(&mut conn, target).await?;
        drop(conn);

        if has_segments {
            if !job.force {
                return Err(TaskError::Conflict(format!(
                    "transcript {} already has speaker segments",
                    target
                )));
            }
            let removed = transcripts::clear_segments(&self.pool, target).await?;
            info!(transcript = %target, removed, "Cleared speaker segments before forced transcription");
        }

        transcripts::set_video_url(&self.pool, target, &job.media_url).await?;

        let body = TranscribeRequest {
            youtube_url: job.media_url,
            custom_vocabulary: job.custom_vocabulary,
            custom_prompt: job.custom_prompt,
            voiceprints: job.voiceprints.filter(|v| !v.is_empty()),
        };

        self.launcher
            .launch(caller, TaskType::transcribe(), serde_json::to_value(&body)?, target, job.force)
            .await
    }

    pub async fn request_process_agenda(
        &self,
        caller: &Caller,
        target: &TargetKey,
        job: ProcessAgendaJob,
    ) -> TaskResult<Task> {
        self.gate.authorize(caller, target)?;
        require_non_empty("agendaUrl", &job.agenda_url)?;
        self.require_transcript(target).await?;

        if subjects::count_subjects(&self.pool, target).await? > 0 {
            if !job.force {
                return Err(TaskError::Conflict(format!("transcript {} already has subjects", target)));
            }
            let removed = subjects::clear_subjects(&self.pool, target).await?;
            info!(transcript = %target, removed, "Cleared subjects before forced agenda processing");
        }

        let body = ProcessAgendaRequest {
            agenda_url: job.agenda_url,
            date: job.date,
            topic_labels: job.topic_labels,
        };

        self.launcher
            .launch(caller, TaskType::process_agenda(), serde_json::to_value(&body)?, target, job.force)
            .await
    }

    pub async fn request_poll_decisions(
        &self,
        caller: &Caller,
        target: &TargetKey,
        job: PollDecisionsJob,
    ) -> TaskResult<Task> {
        self.gate.authorize(caller, target)?;
        require_non_empty("diavgeiaUid", &job.diavgeia_uid)?;
        require_non_empty("meetingDate", &job.meeting_date)?;
        self.require_transcript(target).await?;

        let only = job.subject_ids.as_deref().filter(|ids| !ids.is_empty());
        let subjects = subjects::subjects_for_polling(&self.pool, target, only).await?;
        if subjects.is_empty() {
            return Err(TaskError::InvalidRequest(
                "no eligible subjects to poll (subjects must have an agenda item index)".to_string(),
            ));
        }

        let body = PollDecisionsRequest {
            meeting_date: job.meeting_date,
            diavgeia_uid: job.diavgeia_uid,
            diavgeia_unit_id: job.diavgeia_unit_id,
            subjects,
        };

        self.launcher
            .launch(caller, TaskType::poll_decisions(), serde_json::to_value(&body)?, target, false)
            .await
    }

    pub async fn apply_callback(
        &self,
        target: &TargetKey,
        task_id: Uuid,
        update: TaskUpdate,
    ) -> TaskResult<Task> {
        self.callbacks.apply_update(target, task_id, update).await
    }

    pub async fn reprocess(&self, caller: &Caller, target: &TargetKey, task_id: Uuid) -> TaskResult<Task> {
        self.callbacks.reprocess(caller, target, task_id).await
    }

    pub async fn list_tasks(&self, caller: &Caller, target: &TargetKey) -> TaskResult<Vec<Task>> {
        self.gate.authorize(caller, target)?;
        tasks::list_for_target(&self.pool, target).await
    }

    /// Delete a task that has been idle for at least the cool-down window
    pub async fn delete_task(&self, caller: &Caller, target: &TargetKey, task_id: Uuid) -> TaskResult<()> {
        self.gate.require_super_admin(caller)?;

        let task = tasks::get(&self.pool, task_id)
            .await?
            .ok_or_else(|| TaskError::NotFound(format!("task {}", task_id)))?;

        if !task.belongs_to(target) {
            return Err(TaskError::InvalidRequest(format!(
                "task {} does not belong to {}",
                task_id, target
            )));
        }

        let elapsed_secs = (Utc::now() - task.updated_at).num_seconds();
        let cooldown_secs = self.delete_cooldown.as_secs();
        if elapsed_secs < cooldown_secs as i64 {
            return Err(TaskError::CooldownActive {
                task_id,
                elapsed_secs: elapsed_secs.max(0),
                cooldown_secs,
            });
        }

        tasks::delete(&self.pool, task_id).await?;
        info!(task_id = %task_id, caller = %caller.name, status = %task.status, "Task deleted");
        Ok(())
    }

    pub async fn highest_versions(
        &self,
        caller: &Caller,
        types: &[String],
    ) -> TaskResult<HashMap<String, Option<i64>>> {
        self.gate.require_super_admin(caller)?;
        tasks::highest_versions(&self.pool, types).await
    }

    async fn require_transcript(&self, target: &TargetKey) -> TaskResult<()> {
        match transcripts::get_transcript(&self.pool, target).await? {
            Some(_) => Ok(()),
            None => Err(TaskError::NotFound(format!("transcript {}", target))),
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> TaskResult<()> {
    if value.trim().is_empty() {
        Err(TaskError::InvalidRequest(format!("{} is required", field)))
    } else {
        Ok(())
    }
}
