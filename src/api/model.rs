use crate::model::call::{CallMetadata, Utterance};
use crate::model::common::{
    deserialize_flexible_id, deserialize_null_as_default, deserialize_optional_string, CallId,
    DateRange,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Paging block carried by every list-style response.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiRecords {
    #[serde(default)]
    pub total_records: Option<i64>,
    #[serde(default)]
    pub current_page_size: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub cursor: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: CallId,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub started: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub title: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallsPage {
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub records: ApiRecords,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub calls: Vec<CallSummary>,
}

impl ApiCallsPage {
    pub fn next_cursor(&self) -> Option<&str> {
        self.records.cursor.as_deref()
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiExtensiveResponse {
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub records: ApiRecords,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub calls: Vec<CallMetadata>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CallTranscript {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub call_id: CallId,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub transcript: Vec<Utterance>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiTranscriptResponse {
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub records: ApiRecords,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub call_transcripts: Vec<CallTranscript>,
}

pub fn list_params(range: &DateRange, cursor: Option<&str>) -> Vec<(String, String)> {
    let mut params = vec![
        ("fromDateTime".to_string(), range.from_datetime()),
        ("toDateTime".to_string(), range.to_datetime()),
    ];
    if let Some(c) = cursor {
        params.push(("cursor".to_string(), c.to_string()));
    }
    params
}

fn batch_filter(ids: &[CallId], range: &DateRange) -> Value {
    json!({
        "callIds": ids,
        "fromDateTime": range.from_datetime(),
        "toDateTime": range.to_datetime(),
    })
}

pub fn extensive_payload(ids: &[CallId], range: &DateRange) -> Value {
    json!({
        "filter": batch_filter(ids, range),
        "contentSelector": {
            "context": "Extended",
            "exposedFields": {
                "parties": true,
                "content": {
                    "structure": true,
                    "topics": true,
                    "trackers": true,
                    "brief": true,
                    "keyPoints": true,
                    "callOutcome": true
                },
                "interaction": {
                    "speakers": true,
                    "personInteractionStats": true,
                    "questions": true,
                    "video": true
                },
                "collaboration": {
                    "publicComments": true
                },
                "media": true
            }
        }
    })
}

pub fn transcript_payload(ids: &[CallId], range: &DateRange) -> Value {
    json!({ "filter": batch_filter(ids, range) })
}
