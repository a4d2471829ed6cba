//! Task lifecycle model
//!
//! A task is one attempt to run a named job against one transcript. It is
//! created `pending` by the launcher and moves to a terminal state
//! (`succeeded` or `failed`) only through worker callbacks:
//!
//! ```text
//! pending ──processing──▶ pending
//! pending ──success─────▶ succeeded ──(processor error)──▶ failed
//! pending ──error───────▶ failed
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Job kind
///
/// Open string enumeration: new job types only need a registered result
/// processor, never a change to the lifecycle code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    pub const TRANSCRIBE: &'static str = "transcribe";
    pub const PROCESS_AGENDA: &'static str = "processAgenda";
    pub const POLL_DECISIONS: &'static str = "pollDecisions";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn transcribe() -> Self {
        Self::new(Self::TRANSCRIBE)
    }

    pub fn process_agenda() -> Self {
        Self::new(Self::PROCESS_AGENDA)
    }

    pub fn poll_decisions() -> Self {
        Self::new(Self::POLL_DECISIONS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Task status
///
/// `Pending` covers both "launched" and "in progress"; `Succeeded` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

/// Composite key of the transcript a task operates on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetKey {
    pub workspace_id: String,
    pub transcript_id: String,
}

impl TargetKey {
    pub fn new(workspace_id: impl Into<String>, transcript_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            transcript_id: transcript_id.into(),
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workspace_id, self.transcript_id)
    }
}

/// Persisted task record (all operator-visible fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub stage: Option<String>,
    pub percent_complete: Option<f64>,
    /// Serialized request payload (callback URL included once dispatched)
    pub request_body: String,
    /// Raw worker result or error message
    pub response_body: Option<String>,
    /// Launch or processing failure recorded by this service
    pub error_message: Option<String>,
    /// `response_body` holds a worker result (set only by a success callback)
    pub has_result: bool,
    /// Result schema version reported by the worker; stored, not interpreted
    pub version: Option<i64>,
    /// Launched with `force` while another task was in flight
    pub forced: bool,
    pub workspace_id: String,
    pub transcript_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn target(&self) -> TargetKey {
        TargetKey::new(&self.workspace_id, &self.transcript_id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn belongs_to(&self, target: &TargetKey) -> bool {
        self.workspace_id == target.workspace_id && self.transcript_id == target.transcript_id
    }
}

/// Insert parameters for a new pending task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: Uuid,
    pub task_type: TaskType,
    pub request_body: String,
    pub forced: bool,
    pub target: TargetKey,
}

/// Worker callback payload, discriminated by `status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskUpdate {
    #[serde(rename_all = "camelCase")]
    Processing {
        #[serde(default)]
        stage: Option<String>,
        #[serde(default)]
        progress_percent: Option<f64>,
        #[serde(default)]
        version: Option<i64>,
    },
    Success {
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        version: Option<i64>,
    },
    Error {
        #[serde(default)]
        error: String,
        #[serde(default)]
        version: Option<i64>,
    },
}

impl TaskUpdate {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskUpdate::Processing { .. } => "processing",
            TaskUpdate::Success { .. } => "success",
            TaskUpdate::Error { .. } => "error",
        }
    }
}
