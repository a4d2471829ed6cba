//! Transcript, speaker and segment persistence

use sqlx::{QueryBuilder, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{now_timestamp, parse_timestamp};
use crate::error::TaskResult;
use crate::models::{TargetKey, Transcript};
use crate::services::segmentation::Segment;

/// SQLite caps bound parameters per statement; 5 columns per utterance row
const UTTERANCE_INSERT_CHUNK: usize = 500;

/// Persisted segment with its utterances, ordered by start time
#[derive(Debug, Clone)]
pub struct StoredSegment {
    pub id: String,
    pub speaker_tag_id: String,
    pub start_timestamp: f64,
    pub end_timestamp: f64,
    pub utterances: Vec<StoredUtterance>,
}

#[derive(Debug, Clone)]
pub struct StoredUtterance {
    pub start_timestamp: f64,
    pub end_timestamp: f64,
    pub text: String,
    pub drift: f64,
}

/// Persisted speaker tag
#[derive(Debug, Clone)]
pub struct StoredSpeakerTag {
    pub id: String,
    pub label: String,
    pub speaker_id: Option<String>,
}

pub async fn create_transcript(pool: &SqlitePool, target: &TargetKey, name: &str) -> TaskResult<()> {
    let now = now_timestamp();
    sqlx::query(
        r#"
        INSERT INTO transcripts (workspace_id, id, name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .bind(name)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_transcript(pool: &SqlitePool, target: &TargetKey) -> TaskResult<Option<Transcript>> {
    let row = sqlx::query(
        r#"
        SELECT workspace_id, id, name, video_url, audio_url, mux_playback_id, created_at, updated_at
        FROM transcripts
        WHERE workspace_id = ? AND id = ?
        "#,
    )
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Some(Transcript {
        workspace_id: row.get("workspace_id"),
        id: row.get("id"),
        name: row.get("name"),
        video_url: row.get("video_url"),
        audio_url: row.get("audio_url"),
        mux_playback_id: row.get("mux_playback_id"),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    }))
}

/// Record the source media before a transcription job is launched
pub async fn set_video_url(pool: &SqlitePool, target: &TargetKey, video_url: &str) -> TaskResult<()> {
    sqlx::query("UPDATE transcripts SET video_url = ?, updated_at = ? WHERE workspace_id = ? AND id = ?")
        .bind(video_url)
        .bind(now_timestamp())
        .bind(&target.workspace_id)
        .bind(&target.transcript_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Apply media references from a transcription result; absent values keep the stored ones
pub async fn update_media(
    conn: &mut SqliteConnection,
    target: &TargetKey,
    video_url: Option<&str>,
    audio_url: Option<&str>,
    mux_playback_id: Option<&str>,
) -> TaskResult<()> {
    sqlx::query(
        r#"
        UPDATE transcripts
        SET video_url = COALESCE(?, video_url),
            audio_url = COALESCE(?, audio_url),
            mux_playback_id = COALESCE(?, mux_playback_id),
            updated_at = ?
        WHERE workspace_id = ? AND id = ?
        "#,
    )
    .bind(video_url)
    .bind(audio_url)
    .bind(mux_playback_id)
    .bind(now_timestamp())
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn has_segments(conn: &mut SqliteConnection, target: &TargetKey) -> TaskResult<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM speaker_segments WHERE workspace_id = ? AND transcript_id = ?)",
    )
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Remove segments, utterances and speaker tags ahead of a forced re-transcription
pub async fn clear_segments(pool: &SqlitePool, target: &TargetKey) -> TaskResult<u64> {
    let mut tx = pool.begin().await?;

    // Utterances follow via ON DELETE CASCADE
    let removed = sqlx::query("DELETE FROM speaker_segments WHERE workspace_id = ? AND transcript_id = ?")
        .bind(&target.workspace_id)
        .bind(&target.transcript_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM speaker_tags WHERE workspace_id = ? AND transcript_id = ?")
        .bind(&target.workspace_id)
        .bind(&target.transcript_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(removed)
}

pub async fn create_speaker(pool: &SqlitePool, name: &str, person_id: Option<&str>) -> TaskResult<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO speakers (id, name, person_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(person_id)
        .bind(now_timestamp())
        .execute(pool)
        .await?;

    Ok(id)
}

pub async fn speaker_exists(conn: &mut SqliteConnection, speaker_id: &str) -> TaskResult<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM speakers WHERE id = ?)")
        .bind(speaker_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(exists)
}

pub async fn create_speaker_tag(
    conn: &mut SqliteConnection,
    target: &TargetKey,
    label: &str,
    speaker_id: Option<&str>,
) -> TaskResult<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO speaker_tags (id, label, speaker_id, workspace_id, transcript_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(label)
    .bind(speaker_id)
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .bind(now_timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

/// Insert one segment row followed by its utterances in chunked multi-row inserts
pub async fn insert_segment(
    conn: &mut SqliteConnection,
    target: &TargetKey,
    speaker_tag_id: &str,
    segment: &Segment,
) -> TaskResult<String> {
    let segment_id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO speaker_segments (
            id, workspace_id, transcript_id, speaker_tag_id,
            start_timestamp, end_timestamp, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&segment_id)
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .bind(speaker_tag_id)
    .bind(segment.start)
    .bind(segment.end)
    .bind(now_timestamp())
    .execute(&mut *conn)
    .await?;

    for chunk in segment.utterances.chunks(UTTERANCE_INSERT_CHUNK) {
        let mut builder = QueryBuilder::new(
            "INSERT INTO utterances (id, speaker_segment_id, start_timestamp, end_timestamp, text, drift) ",
        );
        builder.push_values(chunk, |mut row, utterance| {
            row.push_bind(Uuid::new_v4().to_string())
                .push_bind(&segment_id)
                .push_bind(utterance.start)
                .push_bind(utterance.end)
                .push_bind(&utterance.text)
                .push_bind(utterance.drift);
        });
        builder.build().execute(&mut *conn).await?;
    }

    Ok(segment_id)
}

pub async fn list_speaker_tags(pool: &SqlitePool, target: &TargetKey) -> TaskResult<Vec<StoredSpeakerTag>> {
    let rows = sqlx::query(
        r#"
        SELECT id, label, speaker_id FROM speaker_tags
        WHERE workspace_id = ? AND transcript_id = ?
        ORDER BY label
        "#,
    )
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| StoredSpeakerTag {
            id: row.get("id"),
            label: row.get("label"),
            speaker_id: row.get("speaker_id"),
        })
        .collect())
}

/// Segments of a transcript with their utterances, both ordered by start time
pub async fn load_segments(pool: &SqlitePool, target: &TargetKey) -> TaskResult<Vec<StoredSegment>> {
    let segment_rows = sqlx::query(
        r#"
        SELECT id, speaker_tag_id, start_timestamp, end_timestamp
        FROM speaker_segments
        WHERE workspace_id = ? AND transcript_id = ?
        ORDER BY start_timestamp, rowid
        "#,
    )
    .bind(&target.workspace_id)
    .bind(&target.transcript_id)
    .fetch_all(pool)
    .await?;

    let mut segments = Vec::with_capacity(segment_rows.len());
    for row in segment_rows {
        let id: String = row.get("id");

        let utterances = sqlx::query(
            r#"
            SELECT start_timestamp, end_timestamp, text, drift
            FROM utterances
            WHERE speaker_segment_id = ?
            ORDER BY start_timestamp, rowid
            "#,
        )
        .bind(&id)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|u| StoredUtterance {
            start_timestamp: u.get("start_timestamp"),
            end_timestamp: u.get("end_timestamp"),
            text: u.get("text"),
            drift: u.get("drift"),
        })
        .collect();

        segments.push(StoredSegment {
            id,
            speaker_tag_id: row.get("speaker_tag_id"),
            start_timestamp: row.get("start_timestamp"),
            end_timestamp: row.get("end_timestamp"),
            utterances,
        });
    }

    Ok(segments)
}
