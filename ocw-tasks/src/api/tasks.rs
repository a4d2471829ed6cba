//! Operator task endpoints
//!
//! All routes are scoped to one transcript:
//! `/api/workspaces/:workspace_id/transcripts/:transcript_id/...`

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::caller::AuthenticatedCaller;
use super::json_body::JsonBody;
use crate::error::TaskResult;
use crate::models::{TargetKey, Task};
use crate::services::{LaunchJob, PollDecisionsJob, ProcessAgendaJob, TranscribeJob};
use crate::AppState;

const TRANSCRIPT_BASE: &str = "/api/workspaces/:workspace_id/transcripts/:transcript_id";

/// GET /api/tasks/versions query
#[derive(Debug, Deserialize)]
pub struct VersionsQuery {
    /// Comma-separated task types
    #[serde(default)]
    pub types: String,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

fn target((workspace_id, transcript_id): (String, String)) -> TargetKey {
    TargetKey::new(workspace_id, transcript_id)
}

/// POST .../tasks
pub async fn launch_task(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(path): Path<(String, String)>,
    JsonBody(job): JsonBody<LaunchJob>,
) -> TaskResult<(StatusCode, Json<Task>)> {
    let task = state.tasks.launch(&caller, &target(path), job).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET .../tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(path): Path<(String, String)>,
) -> TaskResult<Json<TaskListResponse>> {
    let tasks = state.tasks.list_tasks(&caller, &target(path)).await?;
    Ok(Json(TaskListResponse { tasks }))
}

/// DELETE .../tasks/:task_id
pub async fn delete_task(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path((workspace_id, transcript_id, task_id)): Path<(String, String, Uuid)>,
) -> TaskResult<Json<Value>> {
    let target = TargetKey::new(workspace_id, transcript_id);
    state.tasks.delete_task(&caller, &target, task_id).await?;
    Ok(Json(json!({ "message": "Task deleted", "taskId": task_id })))
}

/// POST .../tasks/:task_id/reprocess
pub async fn reprocess_task(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path((workspace_id, transcript_id, task_id)): Path<(String, String, Uuid)>,
) -> TaskResult<Json<Task>> {
    let target = TargetKey::new(workspace_id, transcript_id);
    Ok(Json(state.tasks.reprocess(&caller, &target, task_id).await?))
}

/// POST .../transcribe
pub async fn request_transcribe(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(path): Path<(String, String)>,
    JsonBody(job): JsonBody<TranscribeJob>,
) -> TaskResult<(StatusCode, Json<Task>)> {
    let task = state.tasks.request_transcribe(&caller, &target(path), job).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// POST .../process-agenda
pub async fn request_process_agenda(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(path): Path<(String, String)>,
    JsonBody(job): JsonBody<ProcessAgendaJob>,
) -> TaskResult<(StatusCode, Json<Task>)> {
    let task = state.tasks.request_process_agenda(&caller, &target(path), job).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// POST .../poll-decisions
pub async fn request_poll_decisions(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(path): Path<(String, String)>,
    JsonBody(job): JsonBody<PollDecisionsJob>,
) -> TaskResult<(StatusCode, Json<Task>)> {
    let task = state.tasks.request_poll_decisions(&caller, &target(path), job).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/tasks/versions?types=a,b
pub async fn highest_versions(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Query(query): Query<VersionsQuery>,
) -> TaskResult<Json<HashMap<String, Option<i64>>>> {
    let types: Vec<String> = query
        .types
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    Ok(Json(state.tasks.highest_versions(&caller, &types).await?))
}

/// Build operator task routes
pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route(
            &format!("{}/tasks", TRANSCRIPT_BASE),
            get(list_tasks).post(launch_task),
        )
        .route(&format!("{}/tasks/:task_id", TRANSCRIPT_BASE), delete(delete_task))
        .route(
            &format!("{}/tasks/:task_id/reprocess", TRANSCRIPT_BASE),
            post(reprocess_task),
        )
        .route(&format!("{}/transcribe", TRANSCRIPT_BASE), post(request_transcribe))
        .route(
            &format!("{}/process-agenda", TRANSCRIPT_BASE),
            post(request_process_agenda),
        )
        .route(
            &format!("{}/poll-decisions", TRANSCRIPT_BASE),
            post(request_poll_decisions),
        )
        .route("/api/tasks/versions", get(highest_versions))
}
