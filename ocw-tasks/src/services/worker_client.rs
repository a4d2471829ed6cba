//! Task worker client
//!
//! The worker exposes one endpoint per job type: `POST {base_url}/{type}`
//! with a bearer credential and the job payload (callback URL included).
//! A 2xx response only means the job was accepted; results arrive later on
//! the callback URL.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::TaskType;

const USER_AGENT: &str = concat!("ocw-tasks/", env!("CARGO_PKG_VERSION"));

/// Launch failure reported by a worker client
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Request never produced a response
    #[error("Worker unreachable: {0}")]
    Transport(String),

    /// Worker answered with a non-2xx status
    #[error("Worker returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Client setup error: {0}")]
    Setup(String),
}

impl WorkerError {
    /// Human-readable message stored on the failed task
    pub fn message(&self) -> &str {
        match self {
            WorkerError::Transport(message)
            | WorkerError::Rejected { message, .. }
            | WorkerError::Setup(message) => message,
        }
    }
}

/// Outbound half of the task protocol
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Submit a job; `Ok` means the worker accepted it
    async fn dispatch(&self, task_type: &TaskType, body: &Value) -> Result<(), WorkerError>;
}

/// Derive a readable message from a worker error response body
///
/// Tries a JSON `error` field first, then falls back to the raw text.
pub fn extract_error_message(body: &str) -> String {
    if body.trim().is_empty() {
        return "no response body".to_string();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("error") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::String(_) | Value::Null | Value::Bool(false)) | None => body.to_string(),
            Some(other) => other.to_string(),
        },
        _ => body.to_string(),
    }
}

/// reqwest-backed worker client
pub struct HttpWorkerClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpWorkerClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, WorkerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::Setup(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn endpoint(&self, task_type: &TaskType) -> String {
        format!("{}/{}", self.base_url, task_type)
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn dispatch(&self, task_type: &TaskType, body: &Value) -> Result<(), WorkerError> {
        let url = self.endpoint(task_type);
        tracing::debug!(url = %url, task_type = %task_type, "Dispatching job to worker");

        let mut request = self.http_client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkerError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        tracing::warn!(
            url = %url,
            status = status.as_u16(),
            "Worker rejected job"
        );

        Err(WorkerError::Rejected {
            status: status.as_u16(),
            message: extract_error_message(&text),
        })
    }
}
