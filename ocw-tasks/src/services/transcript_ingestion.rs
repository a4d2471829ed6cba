//! Transcript ingestion
//!
//! Applies a `transcribe` result: speaker tags, segments, utterances and
//! media references, all in one transaction bounded by the ingestion
//! timeout. Dangling speaker matches are downgraded to unmatched tags.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use super::registry::{decode_result, ResultProcessor};
use super::segmentation::segment_utterances;
use crate::db::transcripts;
use crate::error::{TaskError, TaskResult};
use crate::models::{DeclaredSpeaker, TargetKey, Task, TranscribeResult, TranscriptUtterance};

/// Counts reported after a successful ingestion
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionSummary {
    pub speaker_tags: usize,
    pub identified_speakers: usize,
    pub dropped_matches: usize,
    pub synthesized_tags: usize,
    pub segments: usize,
    pub utterances: usize,
}

pub struct TranscriptIngestion {
    pool: SqlitePool,
    timeout: Duration,
}

impl TranscriptIngestion {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub async fn ingest(&self, task: &Task, result: TranscribeResult) -> TaskResult<IngestionSummary> {
        if result.transcript.transcription.speakers.is_empty() {
            return Err(TaskError::Processing(
                "no speakers found in transcription result".to_string(),
            ));
        }

        let target = task.target();
        match tokio::time::timeout(self.timeout, self.ingest_in_transaction(&target, result)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Processing(format!(
                "ingestion exceeded {}s and was rolled back",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn ingest_in_transaction(
        &self,
        target: &TargetKey,
        result: TranscribeResult,
    ) -> TaskResult<IngestionSummary> {
        let mut tx = self.pool.begin().await?;

        if transcripts::has_segments(&mut tx, target).await? {
            return Err(TaskError::Processing(format!(
                "transcript {} already has speaker segments",
                target
            )));
        }

        let transcription = result.transcript.transcription;
        let mut summary = IngestionSummary::default();

        let mut tags =
            materialize_speakers(&mut tx, target, &transcription.speakers, &mut summary).await?;
        ensure_tags_for_utterances(&mut tx, target, &transcription.utterances, &mut tags, &mut summary)
            .await?;

        summary.utterances = transcription.utterances.len();
        let segments = segment_utterances(transcription.utterances);
        summary.segments = segments.len();

        for segment in &segments {
            let tag_id = tags.get(&segment.speaker).ok_or_else(|| {
                TaskError::Internal(format!("no speaker tag for speaker {}", segment.speaker))
            })?;
            transcripts::insert_segment(&mut tx, target, tag_id, segment).await?;
        }

        transcripts::update_media(
            &mut tx,
            target,
            result.video_url.as_deref(),
            result.audio_url.as_deref(),
            result.mux_playback_id.as_deref(),
        )
        .await?;

        tx.commit().await?;
        Ok(summary)
    }
}

#[async_trait]
impl ResultProcessor for TranscriptIngestion {
    async fn process(&self, task: &Task, result: &Value) -> TaskResult<()> {
        let result: TranscribeResult = decode_result(task, result)?;
        let summary = self.ingest(task, result).await?;

        info!(
            task_id = %task.id,
            transcript = %task.target(),
            speaker_tags = summary.speaker_tags,
            identified = summary.identified_speakers,
            dropped_matches = summary.dropped_matches,
            synthesized = summary.synthesized_tags,
            segments = summary.segments,
            utterances = summary.utterances,
            "Transcript ingested"
        );
        Ok(())
    }
}

fn speaker_label(speaker: i64) -> String {
    format!("SPEAKER_{}", speaker)
}

/// Resolve a declared speaker's match; an id with no speaker row is a `Validation` error
async fn reconcile_match<'a>(
    conn: &mut SqliteConnection,
    declared: &'a DeclaredSpeaker,
) -> TaskResult<Option<&'a str>> {
    let Some(id) = declared.matched.as_deref().filter(|id| !id.is_empty()) else {
        return Ok(None);
    };

    if transcripts::speaker_exists(conn, id).await? {
        Ok(Some(id))
    } else {
        Err(TaskError::Validation(format!(
            "speaker {} matched unknown speaker id {}",
            declared.speaker, id
        )))
    }
}

/// Create one tag per declared speaker, linking it when the match exists
async fn materialize_speakers(
    conn: &mut SqliteConnection,
    target: &TargetKey,
    speakers: &[DeclaredSpeaker],
    summary: &mut IngestionSummary,
) -> TaskResult<HashMap<i64, String>> {
    let mut tags = HashMap::with_capacity(speakers.len());

    for declared in speakers {
        if tags.contains_key(&declared.speaker) {
            continue;
        }

        let speaker_id = match reconcile_match(&mut *conn, declared).await {
            Ok(id) => id,
            Err(TaskError::Validation(reason)) => {
                warn!(transcript = %target, "{}; creating unmatched tag", reason);
                summary.dropped_matches += 1;
                None
            }
            Err(e) => return Err(e),
        };

        let tag_id = transcripts::create_speaker_tag(
            &mut *conn,
            target,
            &speaker_label(declared.speaker),
            speaker_id,
        )
        .await?;

        if speaker_id.is_some() {
            summary.identified_speakers += 1;
        }
        tags.insert(declared.speaker, tag_id);
    }

    summary.speaker_tags = tags.len();
    Ok(tags)
}

/// Synthesize unmatched tags for speaker indices only seen in utterances
async fn ensure_tags_for_utterances(
    conn: &mut SqliteConnection,
    target: &TargetKey,
    utterances: &[TranscriptUtterance],
    tags: &mut HashMap<i64, String>,
    summary: &mut IngestionSummary,
) -> TaskResult<()> {
    let mut missing: Vec<i64> = utterances
        .iter()
        .map(|u| u.speaker)
        .filter(|s| !tags.contains_key(s))
        .collect();
    missing.sort_unstable();
    missing.dedup();

    for speaker in missing {
        warn!(
            transcript = %target,
            speaker,
            "Utterances reference undeclared speaker; creating unmatched tag"
        );
        let tag_id =
            transcripts::create_speaker_tag(&mut *conn, target, &speaker_label(speaker), None).await?;
        tags.insert(speaker, tag_id);
        summary.synthesized_tags += 1;
    }

    summary.speaker_tags = tags.len();
    Ok(())
}
