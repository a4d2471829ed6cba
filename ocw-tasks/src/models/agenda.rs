//! Agenda processing payloads

use serde::{Deserialize, Serialize};

/// Body posted to the worker for a `processAgenda` job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessAgendaRequest {
    pub agenda_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_labels: Vec<String>,
}

/// Worker result for a `processAgenda` job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessAgendaResult {
    #[serde(default)]
    pub subjects: Vec<AgendaSubject>,
}

/// Agenda item extracted by the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaSubject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub agenda_item_index: Option<i64>,
}
