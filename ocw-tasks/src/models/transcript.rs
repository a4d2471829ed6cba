//! Transcription job payloads and the transcript row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transcript row (the target entity of every task)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub workspace_id: String,
    pub id: String,
    pub name: String,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub mux_playback_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Known voice sent to the worker for speaker identification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voiceprint {
    pub person_id: String,
    pub voiceprint: String,
}

/// Body posted to the worker for a `transcribe` job (callback URL added at launch)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest {
    pub youtube_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_vocabulary: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voiceprints: Option<Vec<Voiceprint>>,
}

/// Worker result for a `transcribe` job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeResult {
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub mux_playback_id: Option<String>,
    pub transcript: TranscriptBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptBody {
    pub transcription: Transcription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub speakers: Vec<DeclaredSpeaker>,
    #[serde(default)]
    pub utterances: Vec<TranscriptUtterance>,
}

/// Speaker detected by the worker, optionally matched to a known speaker id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredSpeaker {
    pub speaker: i64,
    #[serde(default, rename = "match")]
    pub matched: Option<String>,
}

/// One time-stamped utterance as emitted by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptUtterance {
    pub speaker: i64,
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub drift: f64,
}
