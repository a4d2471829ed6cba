//! ocw-tasks library interface
//!
//! Task orchestration for transcripts: launches jobs on the external
//! worker, tracks them through worker callbacks and ingests their results.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{TaskError, TaskResult};

use axum::Router;
use chrono::{DateTime, Utc};
use ocw_common::config::TomlConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::services::{
    gate_from_config, AuthorizationGate, CallbackHandler, HttpWorkerClient, Notifier,
    ProcessorRegistry, TaskLauncher, TaskService, WorkerClient,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub tasks: Arc<TaskService>,
    /// Types accepted by the launcher
    pub task_types: Vec<String>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire every service from explicit collaborators
    pub fn new(
        db: SqlitePool,
        config: &TomlConfig,
        gate: Arc<dyn AuthorizationGate>,
        worker: Arc<dyn WorkerClient>,
        notifier: Notifier,
    ) -> Self {
        let registry = Arc::new(ProcessorRegistry::standard(
            db.clone(),
            Duration::from_secs(config.tasks.ingestion_timeout_secs),
        ));
        let task_types = registry.types().iter().map(|t| t.to_string()).collect();

        let launcher = TaskLauncher::new(
            db.clone(),
            Arc::clone(&gate),
            worker,
            Arc::clone(&registry),
            notifier.clone(),
            config.public_base_url(),
        );
        let callbacks = CallbackHandler::new(db.clone(), Arc::clone(&gate), registry, notifier);
        let tasks = TaskService::new(
            db.clone(),
            gate,
            launcher,
            callbacks,
            Duration::from_secs(config.tasks.delete_cooldown_secs),
        );

        Self {
            db,
            tasks: Arc::new(tasks),
            task_types,
            startup_time: Utc::now(),
        }
    }

    /// Wire the production collaborators described by `config`
    pub fn from_config(db: SqlitePool, config: &TomlConfig) -> TaskResult<Self> {
        let worker = HttpWorkerClient::new(
            &config.worker.base_url,
            config.worker.api_key.clone(),
            Duration::from_secs(config.worker.timeout_secs),
        )
        .map_err(|e| TaskError::Internal(e.to_string()))?;

        if config.worker.api_key.is_none() {
            tracing::warn!("No worker API key configured; jobs are sent without credentials");
        }

        Ok(Self::new(
            db,
            config,
            gate_from_config(&config.access),
            Arc::new(worker),
            Notifier::from_webhook_url(config.notifier.webhook_url.as_deref()),
        ))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::task_routes())
        .merge(api::callback_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
