//! Result ingestion tests: transcripts, agenda subjects and decisions

mod helpers;

use helpers::{transcribe_result, TestEnv};
use ocw_tasks::db::{decisions, subjects, tasks, transcripts};
use ocw_tasks::models::{TargetKey, Task, TaskStatus, TaskType, TaskUpdate};
use ocw_tasks::services::{LaunchJob, ProcessAgendaJob, TranscribeJob};
use ocw_tasks::TaskError;
use serde_json::{json, Value};

fn transcribe_job(force: bool) -> TranscribeJob {
    TranscribeJob {
        media_url: "https://www.youtube.com/watch?v=meeting".to_string(),
        custom_vocabulary: None,
        custom_prompt: None,
        voiceprints: None,
        force,
    }
}

async fn complete(env: &TestEnv, target: &TargetKey, task: &Task, result: Value) -> Result<Task, TaskError> {
    env.state
        .tasks
        .apply_callback(
            target,
            task.id,
            TaskUpdate::Success {
                result: Some(result),
                version: None,
            },
        )
        .await
}

async fn transcribe(env: &TestEnv, target: &TargetKey, result: Value) -> Task {
    let task = env
        .state
        .tasks
        .request_transcribe(&env.editor(), target, transcribe_job(false))
        .await
        .unwrap();
    complete(env, target, &task, result).await.unwrap()
}

#[tokio::test]
async fn test_gap_splits_same_speaker_segments() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;

    transcribe(
        &env,
        &target,
        transcribe_result(
            json!([{ "speaker": 1 }, { "speaker": 2 }]),
            &[
                (1, 0.0, 2.0, "a"),
                (1, 3.0, 5.0, "b"),
                (1, 20.0, 22.0, "c"),
                (2, 23.0, 25.0, "d"),
            ],
        ),
    )
    .await;

    let segments = transcripts::load_segments(&env.pool, &target).await.unwrap();
    let bounds: Vec<(f64, f64)> = segments
        .iter()
        .map(|s| (s.start_timestamp, s.end_timestamp))
        .collect();
    assert_eq!(bounds, vec![(0.0, 5.0), (20.0, 22.0), (23.0, 25.0)]);

    // The first two segments belong to the same speaker tag
    assert_eq!(segments[0].speaker_tag_id, segments[1].speaker_tag_id);
    assert_ne!(segments[1].speaker_tag_id, segments[2].speaker_tag_id);
}

#[tokio::test]
async fn test_every_utterance_lands_in_exactly_one_segment() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;

    // Deliberately out of order and overlapping
    let input = [
        (0, 10.0, 12.0, "τέταρτο"),
        (0, 0.0, 3.0, "πρώτο"),
        (1, 3.5, 6.0, "τρίτο"),
        (0, 2.0, 9.0, "δεύτερο"),
    ];
    transcribe(
        &env,
        &target,
        transcribe_result(json!([{ "speaker": 0 }, { "speaker": 1 }]), &input),
    )
    .await;

    let segments = transcripts::load_segments(&env.pool, &target).await.unwrap();
    assert_eq!(segments.len(), 3);

    let mut texts: Vec<&str> = segments
        .iter()
        .flat_map(|s| s.utterances.iter().map(|u| u.text.as_str()))
        .collect();
    texts.sort_unstable();
    let mut expected: Vec<&str> = input.iter().map(|(_, _, _, text)| *text).collect();
    expected.sort_unstable();
    assert_eq!(texts, expected);

    for segment in &segments {
        let min_start = segment
            .utterances
            .iter()
            .map(|u| u.start_timestamp)
            .fold(f64::INFINITY, f64::min);
        let max_end = segment
            .utterances
            .iter()
            .map(|u| u.end_timestamp)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(segment.start_timestamp, min_start);
        assert_eq!(segment.end_timestamp, max_end);
    }

    assert_eq!(segments[0].utterances[0].text, "πρώτο");
    assert_eq!(segments[0].end_timestamp, 9.0);
}

#[tokio::test]
async fn test_unknown_speaker_match_becomes_unmatched_tag() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let mayor = transcripts::create_speaker(&env.pool, "Δήμαρχος", Some("person-1"))
        .await
        .unwrap();

    let task = transcribe(
        &env,
        &target,
        transcribe_result(
            json!([
                { "speaker": 0, "match": mayor },
                { "speaker": 1, "match": "ghost-speaker" }
            ]),
            &[(0, 0.0, 2.0, "Καλησπέρα."), (1, 2.5, 4.0, "Παρών.")],
        ),
    )
    .await;
    assert_eq!(task.status, TaskStatus::Succeeded);

    let tags = transcripts::list_speaker_tags(&env.pool, &target).await.unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].label, "SPEAKER_0");
    assert_eq!(tags[0].speaker_id.as_deref(), Some(mayor.as_str()));
    assert_eq!(tags[1].label, "SPEAKER_1");
    assert!(tags[1].speaker_id.is_none());

    let segments = transcripts::load_segments(&env.pool, &target).await.unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].speaker_tag_id, tags[1].id);
}

#[tokio::test]
async fn test_undeclared_utterance_speaker_gets_tag() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;

    transcribe(
        &env,
        &target,
        transcribe_result(
            json!([{ "speaker": 0 }]),
            &[(0, 0.0, 1.0, "Ναι."), (3, 1.5, 2.0, "Όχι.")],
        ),
    )
    .await;

    let tags = transcripts::list_speaker_tags(&env.pool, &target).await.unwrap();
    let labels: Vec<&str> = tags.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, vec!["SPEAKER_0", "SPEAKER_3"]);
    assert!(tags.iter().all(|t| t.speaker_id.is_none()));
}

#[tokio::test]
async fn test_forced_transcription_replaces_segments() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let speakers = json!([{ "speaker": 0 }]);

    transcribe(&env, &target, transcribe_result(speakers.clone(), &[(0, 0.0, 1.0, "παλιό")])).await;

    let blocked = env
        .state
        .tasks
        .request_transcribe(&env.editor(), &target, transcribe_job(false))
        .await;
    assert!(matches!(blocked, Err(TaskError::Conflict(_))));

    let task = env
        .state
        .tasks
        .request_transcribe(&env.editor(), &target, transcribe_job(true))
        .await
        .unwrap();
    assert!(transcripts::load_segments(&env.pool, &target).await.unwrap().is_empty());
    assert!(transcripts::list_speaker_tags(&env.pool, &target).await.unwrap().is_empty());

    complete(&env, &target, &task, transcribe_result(speakers, &[(0, 0.0, 1.0, "νέο")]))
        .await
        .unwrap();

    let segments = transcripts::load_segments(&env.pool, &target).await.unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].utterances[0].text, "νέο");
}

#[tokio::test]
async fn test_agenda_subjects_created_and_force_clears_them() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let job = |force| ProcessAgendaJob {
        agenda_url: "https://example.org/agenda.pdf".to_string(),
        date: Some("2026-03-04".to_string()),
        topic_labels: vec!["Οικονομικά".to_string()],
        force,
    };

    let task = env
        .state
        .tasks
        .request_process_agenda(&env.editor(), &target, job(false))
        .await
        .unwrap();
    complete(
        &env,
        &target,
        &task,
        json!({
            "subjects": [
                { "name": "Έγκριση προϋπολογισμού", "agendaItemIndex": 1 },
                { "name": "Ανακοινώσεις Δημάρχου", "description": "Εκτός ημερησίας" }
            ]
        }),
    )
    .await
    .unwrap();

    let stored = subjects::list_subjects(&env.pool, &target).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().any(|s| s.agenda_item_index == Some(1)));

    let blocked = env
        .state
        .tasks
        .request_process_agenda(&env.editor(), &target, job(false))
        .await;
    assert!(matches!(blocked, Err(TaskError::Conflict(_))));

    env.state
        .tasks
        .request_process_agenda(&env.editor(), &target, job(true))
        .await
        .unwrap();
    assert_eq!(subjects::count_subjects(&env.pool, &target).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unnamed_agenda_subject_fails_processing() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;

    let task = env
        .state
        .tasks
        .launch(
            &env.editor(),
            &target,
            LaunchJob {
                task_type: TaskType::PROCESS_AGENDA.to_string(),
                payload: json!({ "agendaUrl": "https://example.org/agenda.pdf" }),
                force: false,
            },
        )
        .await
        .unwrap();

    let outcome = complete(
        &env,
        &target,
        &task,
        json!({ "subjects": [{ "name": "Θέμα 1" }, { "name": "  " }] }),
    )
    .await;
    assert!(matches!(outcome, Err(TaskError::Processing(_))));

    // Nothing from the batch is kept
    assert_eq!(subjects::count_subjects(&env.pool, &target).await.unwrap(), 0);
}

async fn poll_task(env: &TestEnv, target: &TargetKey) -> Task {
    env.state
        .tasks
        .launch(
            &env.editor(),
            target,
            LaunchJob {
                task_type: TaskType::POLL_DECISIONS.to_string(),
                payload: json!({ "meetingDate": "2026-03-04", "diavgeiaUid": "6104", "subjects": [] }),
                force: false,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_decision_upsert_keeps_latest_values() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;

    let first = poll_task(&env, &target).await;
    complete(
        &env,
        &target,
        &first,
        json!({
            "matches": [{
                "subjectId": "subject-1",
                "pdfUrl": "https://diavgeia.gov.gr/doc/AAA",
                "ada": "ΨΑ1Β",
                "decisionTitle": "Αρχικός τίτλος",
                "issueDate": "2026-03-05"
            }],
            "unmatchedSubjects": ["subject-2"]
        }),
    )
    .await
    .unwrap();

    let second = poll_task(&env, &target).await;
    complete(
        &env,
        &target,
        &second,
        json!({
            "matches": [{
                "subjectId": "subject-1",
                "pdfUrl": "https://diavgeia.gov.gr/doc/BBB",
                "protocolNumber": "42/2026",
                "title": "Διορθωμένος τίτλος",
                "issueDate": "2026-03-06T09:00:00Z"
            }]
        }),
    )
    .await
    .unwrap();

    assert_eq!(decisions::count_decisions(&env.pool).await.unwrap(), 1);
    let decision = decisions::get_decision(&env.pool, "subject-1").await.unwrap().unwrap();
    assert_eq!(decision.pdf_url, "https://diavgeia.gov.gr/doc/BBB");
    assert_eq!(decision.title.as_deref(), Some("Διορθωμένος τίτλος"));
    assert_eq!(decision.protocol_number.as_deref(), Some("42/2026"));
    assert!(decision.ada.is_none());
    assert_eq!(decision.task_id, Some(second.id.to_string()));
    assert_eq!(
        decision.issue_date.unwrap().to_rfc3339(),
        "2026-03-06T09:00:00+00:00"
    );
}

#[tokio::test]
async fn test_invalid_issue_date_fails_decision_task() {
    let env = TestEnv::new().await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = poll_task(&env, &target).await;

    let outcome = complete(
        &env,
        &target,
        &task,
        json!({
            "matches": [{
                "subjectId": "subject-1",
                "pdfUrl": "https://diavgeia.gov.gr/doc/AAA",
                "issueDate": "5 Μαρτίου"
            }]
        }),
    )
    .await;

    let Err(TaskError::Processing(message)) = outcome else {
        panic!("expected processing error");
    };
    assert!(message.contains("issueDate"));

    let stored = tasks::get(&env.pool, task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(decisions::get_decision(&env.pool, "subject-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_ingestion_timeout_rolls_back_and_fails_task() {
    let env = TestEnv::with_config(|config| config.tasks.ingestion_timeout_secs = 0).await;
    let target = env.seed_transcript("athens", "m1").await;
    let task = env
        .state
        .tasks
        .request_transcribe(&env.editor(), &target, transcribe_job(false))
        .await
        .unwrap();

    let result = transcribe_result(
        json!([{ "speaker": 0 }, { "speaker": 1 }]),
        &[(0, 0.0, 2.0, "Καλησπέρα."), (1, 2.5, 4.0, "Παρών.")],
    );
    let outcome = complete(&env, &target, &task, result.clone()).await;

    let Err(TaskError::Processing(message)) = outcome else {
        panic!("expected processing error");
    };
    assert!(message.contains("rolled back"));

    let stored = tasks::get(&env.pool, task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(stored.has_result);
    let body: Value = serde_json::from_str(stored.response_body.as_deref().unwrap()).unwrap();
    assert_eq!(body, result);

    assert!(transcripts::load_segments(&env.pool, &target).await.unwrap().is_empty());
    assert!(transcripts::list_speaker_tags(&env.pool, &target).await.unwrap().is_empty());
    let transcript = transcripts::get_transcript(&env.pool, &target).await.unwrap().unwrap();
    assert!(transcript.video_url.is_none());
}
