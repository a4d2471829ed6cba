//! Decision polling payloads and the decision row

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Published decision linked to an agenda subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub subject_id: String,
    pub pdf_url: String,
    pub ada: Option<String>,
    pub protocol_number: Option<String>,
    pub title: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
    /// Task that wrote the current values
    pub task_id: Option<String>,
}

/// Subject sent to the worker for matching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSubject {
    pub subject_id: String,
    pub name: String,
}

/// Body posted to the worker for a `pollDecisions` job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDecisionsRequest {
    pub meeting_date: String,
    pub diavgeia_uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diavgeia_unit_id: Option<String>,
    pub subjects: Vec<PollSubject>,
}

/// Worker result for a `pollDecisions` job
///
/// Only `matches` is written; the other lists are reported in logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDecisionsResult {
    #[serde(default)]
    pub matches: Vec<DecisionMatch>,
    #[serde(default)]
    pub unmatched_subjects: Vec<String>,
    #[serde(default)]
    pub ambiguous_subjects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMatch {
    pub subject_id: String,
    pub pdf_url: String,
    #[serde(default)]
    pub ada: Option<String>,
    #[serde(default)]
    pub protocol_number: Option<String>,
    #[serde(default, alias = "decisionTitle")]
    pub title: Option<String>,
    #[serde(default)]
    pub issue_date: Option<String>,
}

impl DecisionMatch {
    /// Parse `issue_date` as RFC 3339 or a bare `YYYY-MM-DD` date (midnight UTC)
    pub fn parsed_issue_date(&self) -> Result<Option<DateTime<Utc>>, String> {
        let Some(raw) = self.issue_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Some(dt.with_timezone(&Utc)));
        }

        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Some(naive.and_utc()))
            .ok_or_else(|| format!("invalid issueDate '{}' for subject {}", raw, self.subject_id))
    }
}
