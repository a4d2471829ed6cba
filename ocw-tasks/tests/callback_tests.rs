//! Worker callback lifecycle tests

mod helpers;

use helpers::{transcribe_result, TestEnv};
use ocw_tasks::db::{tasks, transcripts};
use ocw_tasks::models::{TargetKey, Task, TaskStatus, TaskUpdate};
use ocw_tasks::services::TranscribeJob;
use ocw_tasks::TaskError;
use serde_json::{json, Value};

async fn launch_transcribe(env: &TestEnv, target: &TargetKey) -> Task {
    env.state
        .tasks
        .request_transcribe(
            &env.editor(),
            target,
            TranscribeJob {
                media_url: "https://www.youtube.com/watch?v=meeting".to_string(),
                custom_vocabulary: None,
                custom_prompt: None,
                voiceprints: None,
                force: false,
            },
        )
        .await
        .unwrap()
}

fn simple_result() -> Value {
    transcribe_result(
        json!([{ "speaker": 0 }, { "speaker": 1 }]),
        &[
            (0, 0.0, 2.0, "Καλησπέρα σας."),
            (0, 2.5, 4.0, "Ξεκινάμε."),
            (1, 4.2, 6.0, "Ευχαριστώ."),
        ],
    )
}

#[tokio::test]
async fn test_progress_updates_keep_task_pending() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = launch_transcribe(&env, &target).await;

    let updated = env
        .state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Processing {
                stage: Some("diarizing".to_string()),
                progress_percent: Some(42.5),
                version: Some(3),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, TaskStatus::Pending);
    assert_eq!(updated.stage.as_deref(), Some("diarizing"));
    assert_eq!(updated.percent_complete, Some(42.5));
    assert_eq!(updated.version, Some(3));
}

#[tokio::test]
async fn test_success_ingests_transcript() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = launch_transcribe(&env, &target).await;

    let done = env
        .state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Success {
                result: Some(simple_result()),
                version: Some(4),
            },
        )
        .await
        .unwrap();

    assert_eq!(done.status, TaskStatus::Succeeded);
    assert_eq!(done.version, Some(4));
    let stored: Value = serde_json::from_str(done.response_body.as_deref().unwrap()).unwrap();
    assert_eq!(stored, simple_result());

    let segments = transcripts::load_segments(&env.pool, &target).await.unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].utterances.len(), 2);
    assert_eq!(segments[1].utterances.len(), 1);

    let transcript = transcripts::get_transcript(&env.pool, &target).await.unwrap().unwrap();
    assert_eq!(transcript.video_url.as_deref(), Some("https://cdn.example.org/meeting.mp4"));
    assert_eq!(transcript.audio_url.as_deref(), Some("https://cdn.example.org/meeting.mp3"));
    assert_eq!(transcript.mux_playback_id.as_deref(), Some("mux-playback-1"));
}

#[tokio::test]
async fn test_duplicate_success_is_rejected_without_reingesting() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = launch_transcribe(&env, &target).await;

    let success = || TaskUpdate::Success {
        result: Some(simple_result()),
        version: None,
    };

    env.state.tasks.apply_callback(&target, task.id, success()).await.unwrap();
    let again = env.state.tasks.apply_callback(&target, task.id, success()).await;
    assert!(matches!(again, Err(TaskError::AlreadyTerminal(id)) if id == task.id));

    // Late progress and error reports are rejected too
    let late = env
        .state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Error {
                error: "late failure".to_string(),
                version: None,
            },
        )
        .await;
    assert!(matches!(late, Err(TaskError::AlreadyTerminal(_))));

    let segments = transcripts::load_segments(&env.pool, &target).await.unwrap();
    assert_eq!(segments.len(), 2);
    let stored = tasks::get(&env.pool, task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Succeeded);
    assert!(stored.error_message.is_none());
}

#[tokio::test]
async fn test_error_update_fails_task() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = launch_transcribe(&env, &target).await;

    let failed = env
        .state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Error {
                error: "audio download failed".to_string(),
                version: Some(2),
            },
        )
        .await
        .unwrap();

    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.response_body.as_deref(), Some("audio download failed"));
    assert_eq!(failed.version, Some(2));
    assert!(transcripts::load_segments(&env.pool, &target).await.unwrap().is_empty());

    // Terminal failure frees the slot for a new launch
    launch_transcribe(&env, &target).await;
}

#[tokio::test]
async fn test_success_without_result_skips_processing() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = launch_transcribe(&env, &target).await;

    let done = env
        .state
        .tasks
        .apply_callback(&target, task.id, TaskUpdate::Success { result: None, version: None })
        .await
        .unwrap();

    assert_eq!(done.status, TaskStatus::Succeeded);
    assert!(done.response_body.is_none());
    assert!(!done.has_result);
    assert!(transcripts::load_segments(&env.pool, &target).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_processing_failure_downgrades_task_and_keeps_response() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = launch_transcribe(&env, &target).await;

    let result = transcribe_result(json!([]), &[(0, 0.0, 1.0, "Κανείς;")]);
    let outcome = env
        .state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Success {
                result: Some(result.clone()),
                version: None,
            },
        )
        .await;

    let Err(TaskError::Processing(message)) = outcome else {
        panic!("expected processing error");
    };
    assert!(message.contains("no speakers"));

    let stored = tasks::get(&env.pool, task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some(message.as_str()));
    let body: Value = serde_json::from_str(stored.response_body.as_deref().unwrap()).unwrap();
    assert_eq!(body, result);
    assert!(transcripts::list_speaker_tags(&env.pool, &target).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_result_fails_processing() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = launch_transcribe(&env, &target).await;

    let outcome = env
        .state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Success {
                result: Some(json!({ "transcript": "not an object" })),
                version: None,
            },
        )
        .await;

    assert!(matches!(outcome, Err(TaskError::Processing(_))));
    let stored = tasks::get(&env.pool, task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_callback_for_other_transcript_is_not_found() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    env.seed_transcript("athens", "m2").await;
    let task = launch_transcribe(&env, &target).await;

    let outcome = env
        .state
        .tasks
        .apply_callback(
            &TargetKey::new("athens", "m2"),
            task.id,
            TaskUpdate::Error {
                error: "boom".to_string(),
                version: None,
            },
        )
        .await;
    assert!(matches!(outcome, Err(TaskError::NotFound(_))));

    let unknown = env
        .state
        .tasks
        .apply_callback(
            &target,
            uuid::Uuid::new_v4(),
            TaskUpdate::Processing {
                stage: None,
                progress_percent: None,
                version: None,
            },
        )
        .await;
    assert!(matches!(unknown, Err(TaskError::NotFound(_))));

    let stored = tasks::get(&env.pool, task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_reprocess_applies_stored_result_after_fix() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = launch_transcribe(&env, &target).await;

    // First ingestion fails because segments already exist
    let mut conn = env.pool.acquire().await.unwrap();
    let tag = transcripts::create_speaker_tag(&mut conn, &target, "SPEAKER_9", None)
        .await
        .unwrap();
    let stale = ocw_tasks::services::Segment {
        speaker: 9,
        start: 0.0,
        end: 1.0,
        utterances: vec![],
    };
    transcripts::insert_segment(&mut conn, &target, &tag, &stale).await.unwrap();
    drop(conn);

    let outcome = env
        .state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Success {
                result: Some(simple_result()),
                version: None,
            },
        )
        .await;
    assert!(matches!(outcome, Err(TaskError::Processing(_))));

    // Editors cannot reprocess
    let denied = env.state.tasks.reprocess(&env.editor(), &target, task.id).await;
    assert!(matches!(denied, Err(TaskError::Unauthorized(_))));

    transcripts::clear_segments(&env.pool, &target).await.unwrap();
    let reprocessed = env
        .state
        .tasks
        .reprocess(&env.admin(), &target, task.id)
        .await
        .unwrap();

    assert_eq!(reprocessed.status, TaskStatus::Succeeded);
    assert!(reprocessed.error_message.is_none());
    assert_eq!(transcripts::load_segments(&env.pool, &target).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_reprocess_rejects_pending_task() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = launch_transcribe(&env, &target).await;

    let outcome = env.state.tasks.reprocess(&env.admin(), &target, task.id).await;
    assert!(matches!(outcome, Err(TaskError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_reprocess_refuses_failure_bodies() {
    use ocw_tasks::services::ProcessAgendaJob;

    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;

    // Launch rejected by the worker: its JSON error body lands in response_body
    env.worker.respond_with(503, r#"{"detail":"overloaded"}"#);
    let launch = env
        .state
        .tasks
        .request_process_agenda(
            &env.editor(),
            &target,
            ProcessAgendaJob {
                agenda_url: "https://example.org/agenda.pdf".to_string(),
                date: None,
                topic_labels: vec![],
                force: false,
            },
        )
        .await;
    let Err(TaskError::Launch { task_id: rejected_id, .. }) = launch else {
        panic!("expected launch error");
    };
    let rejected = tasks::get(&env.pool, rejected_id).await.unwrap().unwrap();
    assert_eq!(rejected.response_body.as_deref(), Some(r#"{"detail":"overloaded"}"#));
    assert!(!rejected.has_result);

    let outcome = env.state.tasks.reprocess(&env.admin(), &target, rejected_id).await;
    assert!(matches!(outcome, Err(TaskError::InvalidRequest(_))));
    let after = tasks::get(&env.pool, rejected_id).await.unwrap().unwrap();
    assert_eq!(after.status, TaskStatus::Failed);

    // Worker-reported failure whose message happens to be a JSON object
    env.worker.respond_with(200, "{}");
    let task = launch_transcribe(&env, &target).await;
    env.state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Error {
                error: r#"{"detail":"gpu lost"}"#.to_string(),
                version: None,
            },
        )
        .await
        .unwrap();

    let outcome = env.state.tasks.reprocess(&env.admin(), &target, task.id).await;
    assert!(matches!(outcome, Err(TaskError::InvalidRequest(_))));
    let after = tasks::get(&env.pool, task.id).await.unwrap().unwrap();
    assert_eq!(after.status, TaskStatus::Failed);
    assert!(transcripts::load_segments(&env.pool, &target).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_omitted_callback_fields_keep_stored_values() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = launch_transcribe(&env, &target).await;

    env.state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Processing {
                stage: Some("diarizing".to_string()),
                progress_percent: Some(10.0),
                version: Some(5),
            },
        )
        .await
        .unwrap();

    let updated = env
        .state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Processing {
                stage: None,
                progress_percent: Some(60.0),
                version: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.stage.as_deref(), Some("diarizing"));
    assert_eq!(updated.percent_complete, Some(60.0));
    assert_eq!(updated.version, Some(5));

    let done = env
        .state
        .tasks
        .apply_callback(
            &target,
            task.id,
            TaskUpdate::Success {
                result: Some(simple_result()),
                version: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(done.version, Some(5));
    assert!(done.has_result);
}
