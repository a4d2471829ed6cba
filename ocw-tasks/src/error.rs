//! Error types for ocw-tasks
//!
//! `TaskError` is returned by every service operation and doubles as the
//! HTTP error body via `IntoResponse`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TaskError {
    /// Missing or unknown bearer credential (401)
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller may not operate on the target (403)
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// A non-terminal task of the same type already exists (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Update addressed to a task that already finished (409)
    #[error("Task {0} is already in a terminal state")]
    AlreadyTerminal(Uuid),

    /// Worker unreachable or returned non-2xx; the task is recorded as failed (502)
    #[error("Launch failed: {message}")]
    Launch { task_id: Uuid, message: String },

    /// Task or target entity missing (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// No result processor registered for a task type (500)
    #[error("Unsupported task type: {0}")]
    UnsupportedType(String),

    /// Malformed external reference; recovered locally by ingestion
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller-supplied request rejected (400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Result processor failed after the worker reported success (422)
    #[error("Processing failed: {0}")]
    Processing(String),

    /// Task updated too recently to be deleted (409)
    #[error("Task {task_id} was updated {elapsed_secs}s ago; deletion allowed after {cooldown_secs}s")]
    CooldownActive {
        task_id: Uuid,
        elapsed_secs: i64,
        cooldown_secs: u64,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Common error: {0}")]
    Common(#[from] ocw_common::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TaskError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TaskError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            TaskError::Unauthorized(_) => StatusCode::FORBIDDEN,
            TaskError::Conflict(_)
            | TaskError::AlreadyTerminal(_)
            | TaskError::CooldownActive { .. } => StatusCode::CONFLICT,
            TaskError::Launch { .. } => StatusCode::BAD_GATEWAY,
            TaskError::NotFound(_) => StatusCode::NOT_FOUND,
            TaskError::InvalidRequest(_) | TaskError::Validation(_) => StatusCode::BAD_REQUEST,
            TaskError::Processing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TaskError::UnsupportedType(_)
            | TaskError::Database(_)
            | TaskError::Serialization(_)
            | TaskError::Common(_)
            | TaskError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TaskError::Unauthenticated(_) => "UNAUTHENTICATED",
            TaskError::Unauthorized(_) => "FORBIDDEN",
            TaskError::Conflict(_) => "CONFLICT",
            TaskError::AlreadyTerminal(_) => "TASK_TERMINAL",
            TaskError::Launch { .. } => "LAUNCH_FAILED",
            TaskError::NotFound(_) => "NOT_FOUND",
            TaskError::UnsupportedType(_) => "UNSUPPORTED_TYPE",
            TaskError::Validation(_) => "VALIDATION_ERROR",
            TaskError::InvalidRequest(_) => "BAD_REQUEST",
            TaskError::Processing(_) => "PROCESSING_FAILED",
            TaskError::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            TaskError::Database(_) => "DATABASE_ERROR",
            TaskError::Serialization(_) => "SERIALIZATION_ERROR",
            TaskError::Common(_) => "COMMON_ERROR",
            TaskError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });

        // Failed launches still created a task; hand its id back for auditing
        if let TaskError::Launch { task_id, .. } = &self {
            error["taskId"] = json!(task_id);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for service operations and API handlers
pub type TaskResult<T> = Result<T, TaskError>;
