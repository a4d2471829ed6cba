//! Shared test fixtures: temp database, fake worker, seeded transcripts
#![allow(dead_code)]

use axum::{extract::Path, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use ocw_common::config::{AccessToken, TomlConfig};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use ocw_tasks::db::transcripts;
use ocw_tasks::models::TargetKey;
use ocw_tasks::services::{gate_from_config, Caller, HttpWorkerClient, Notifier};
use ocw_tasks::AppState;

pub const WORKER_KEY: &str = "worker-key";
pub const EDITOR_TOKEN: &str = "editor-token";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const PUBLIC_BASE_URL: &str = "http://ocw.test";

/// Job received by the fake worker
#[derive(Debug, Clone)]
pub struct ReceivedJob {
    pub task_type: String,
    pub body: Value,
    pub authorization: Option<String>,
}

/// In-process worker bound on an ephemeral port
#[derive(Clone)]
pub struct FakeWorker {
    pub base_url: String,
    jobs: Arc<Mutex<Vec<ReceivedJob>>>,
    reply: Arc<Mutex<(u16, String)>>,
}

impl FakeWorker {
    pub async fn start() -> Self {
        let jobs: Arc<Mutex<Vec<ReceivedJob>>> = Arc::default();
        let reply = Arc::new(Mutex::new((200, r#"{"accepted":true}"#.to_string())));

        let app = {
            let jobs = Arc::clone(&jobs);
            let reply = Arc::clone(&reply);
            Router::new().route(
                "/:task_type",
                post(move |Path(task_type): Path<String>, headers: HeaderMap, Json(body): Json<Value>| {
                    let jobs = Arc::clone(&jobs);
                    let reply = Arc::clone(&reply);
                    async move {
                        jobs.lock().unwrap().push(ReceivedJob {
                            task_type,
                            body,
                            authorization: headers
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string),
                        });
                        let (status, text) = reply.lock().unwrap().clone();
                        (StatusCode::from_u16(status).unwrap(), text)
                    }
                }),
            )
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            jobs,
            reply,
        }
    }

    /// Make every following request answer with `status` and `body`
    pub fn respond_with(&self, status: u16, body: &str) {
        *self.reply.lock().unwrap() = (status, body.to_string());
    }

    pub fn jobs(&self) -> Vec<ReceivedJob> {
        self.jobs.lock().unwrap().clone()
    }
}

pub struct TestEnv {
    _dir: TempDir,
    pub pool: SqlitePool,
    pub state: AppState,
    pub worker: FakeWorker,
    pub config: TomlConfig,
}

pub fn test_config(worker_url: &str) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.worker.base_url = worker_url.to_string();
    config.worker.api_key = Some(WORKER_KEY.to_string());
    config.worker.timeout_secs = 5;
    config.public_base_url = Some(PUBLIC_BASE_URL.to_string());
    config.access.tokens = vec![
        AccessToken {
            name: "editor".to_string(),
            token: EDITOR_TOKEN.to_string(),
            super_admin: false,
            workspaces: vec!["athens".to_string()],
        },
        AccessToken {
            name: "admin".to_string(),
            token: ADMIN_TOKEN.to_string(),
            super_admin: true,
            workspaces: vec![],
        },
    ];
    config
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut TomlConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = ocw_common::db::init_database(&dir.path().join("test.db"))
            .await
            .unwrap();
        let worker = FakeWorker::start().await;

        let mut config = test_config(&worker.base_url);
        adjust(&mut config);

        let client = HttpWorkerClient::new(
            &config.worker.base_url,
            config.worker.api_key.clone(),
            Duration::from_secs(config.worker.timeout_secs),
        )
        .unwrap();

        let state = AppState::new(
            pool.clone(),
            &config,
            gate_from_config(&config.access),
            Arc::new(client),
            Notifier::log_only(),
        );

        Self {
            _dir: dir,
            pool,
            state,
            worker,
            config,
        }
    }

    pub fn editor(&self) -> Caller {
        self.state.tasks.gate().identify(Some(EDITOR_TOKEN)).unwrap()
    }

    pub fn admin(&self) -> Caller {
        self.state.tasks.gate().identify(Some(ADMIN_TOKEN)).unwrap()
    }

    pub async fn seed_transcript(&self, workspace_id: &str, transcript_id: &str) -> TargetKey {
        let target = TargetKey::new(workspace_id, transcript_id);
        transcripts::create_transcript(&self.pool, &target, "Δημοτικό Συμβούλιο")
            .await
            .unwrap();
        target
    }

    pub async fn count_tasks(&self, target: &TargetKey) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE workspace_id = ? AND transcript_id = ?")
            .bind(&target.workspace_id)
            .bind(&target.transcript_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Push a task's `updated_at` into the past
    pub async fn age_task(&self, task_id: uuid::Uuid, seconds: i64) {
        let past = chrono::Utc::now() - chrono::Duration::seconds(seconds);
        sqlx::query("UPDATE tasks SET updated_at = ? WHERE id = ?")
            .bind(past.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

/// Transcription result in the worker's wire format
pub fn transcribe_result(speakers: Value, utterances: &[(i64, f64, f64, &str)]) -> Value {
    let utterances: Vec<Value> = utterances
        .iter()
        .map(|(speaker, start, end, text)| {
            json!({ "speaker": speaker, "start": start, "end": end, "text": text, "drift": 0.1 })
        })
        .collect();

    json!({
        "videoUrl": "https://cdn.example.org/meeting.mp4",
        "audioUrl": "https://cdn.example.org/meeting.mp3",
        "muxPlaybackId": "mux-playback-1",
        "transcript": {
            "transcription": {
                "speakers": speakers,
                "utterances": utterances
            }
        }
    })
}
