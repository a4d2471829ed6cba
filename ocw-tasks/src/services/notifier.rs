//! Admin notifications
//!
//! Fire-and-forget alerts on task lifecycle events. Delivery runs on a
//! spawned task; transport errors are logged and never reach the caller.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{TargetKey, TaskType};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification transport error: {0}")]
    Transport(String),

    #[error("Notification endpoint returned {0}")]
    Status(u16),
}

/// Where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    /// Worker could not be reached or refused the job
    Launch,
    /// Worker reported an error through the callback
    Worker,
    /// Result could not be applied after a successful run
    Processing,
}

impl FailurePhase {
    fn as_str(&self) -> &'static str {
        match self {
            FailurePhase::Launch => "launch",
            FailurePhase::Worker => "worker",
            FailurePhase::Processing => "processing",
        }
    }
}

#[derive(Debug, Clone)]
pub enum AdminEvent {
    TaskStarted {
        task_id: Uuid,
        task_type: TaskType,
        target: TargetKey,
    },
    TaskCompleted {
        task_id: Uuid,
        task_type: TaskType,
        target: TargetKey,
    },
    TaskFailed {
        task_id: Uuid,
        task_type: TaskType,
        target: TargetKey,
        phase: FailurePhase,
        error: String,
    },
}

impl AdminEvent {
    pub fn task_id(&self) -> Uuid {
        match self {
            AdminEvent::TaskStarted { task_id, .. }
            | AdminEvent::TaskCompleted { task_id, .. }
            | AdminEvent::TaskFailed { task_id, .. } => *task_id,
        }
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        match self {
            AdminEvent::TaskStarted { task_id, task_type, target } => {
                format!("Task started: {} on {} ({})", task_type, target, task_id)
            }
            AdminEvent::TaskCompleted { task_id, task_type, target } => {
                format!("Task completed: {} on {} ({})", task_type, target, task_id)
            }
            AdminEvent::TaskFailed {
                task_id,
                task_type,
                target,
                phase,
                error,
            } => format!(
                "Task failed [{}]: {} on {} ({}): {}",
                phase.as_str(),
                task_type,
                target,
                task_id,
                error
            ),
        }
    }
}

#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn deliver(&self, event: &AdminEvent) -> Result<(), NotifyError>;
}

/// Writes events to the log
pub struct LogNotifier;

#[async_trait]
impl AdminNotifier for LogNotifier {
    async fn deliver(&self, event: &AdminEvent) -> Result<(), NotifyError> {
        match event {
            AdminEvent::TaskFailed { .. } => tracing::warn!(task_id = %event.task_id(), "{}", event.summary()),
            _ => tracing::info!(task_id = %event.task_id(), "{}", event.summary()),
        }
        Ok(())
    }
}

/// Posts `{"content": "<summary>"}` to a chat webhook
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            webhook_url,
        })
    }
}

#[async_trait]
impl AdminNotifier for WebhookNotifier {
    async fn deliver(&self, event: &AdminEvent) -> Result<(), NotifyError> {
        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(&json!({ "content": event.summary() }))
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Cloneable handle that dispatches events in the background
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<dyn AdminNotifier>,
}

impl Notifier {
    pub fn new(inner: Arc<dyn AdminNotifier>) -> Self {
        Self { inner }
    }

    pub fn log_only() -> Self {
        Self::new(Arc::new(LogNotifier))
    }

    /// Webhook delivery when a URL is configured, log otherwise
    pub fn from_webhook_url(webhook_url: Option<&str>) -> Self {
        match webhook_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => match WebhookNotifier::new(url.to_string()) {
                Ok(webhook) => Self::new(Arc::new(webhook)),
                Err(e) => {
                    tracing::warn!("Webhook notifier unavailable ({}); falling back to log", e);
                    Self::log_only()
                }
            },
            None => Self::log_only(),
        }
    }

    /// Fire and forget; delivery errors are logged
    pub fn notify(&self, event: AdminEvent) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = inner.deliver(&event).await {
                tracing::warn!(task_id = %event.task_id(), "Admin notification failed: {}", e);
            }
        });
    }
}
