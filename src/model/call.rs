use super::common::{
    deserialize_flexible_i64_or_zero, deserialize_null_as_default,
    deserialize_optional_flexible_id, deserialize_optional_string, CallId,
};
use crate::config;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn not_available() -> String {
    config::NOT_AVAILABLE.to_string()
}

fn unknown() -> String {
    config::UNKNOWN.to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Affiliation {
    Internal,
    External,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Affiliation {
    pub fn as_str(self) -> &'static str {
        match self {
            Affiliation::Internal => "Internal",
            Affiliation::External => "External",
            Affiliation::Unknown => config::UNKNOWN,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    #[serde(
        default,
        deserialize_with = "deserialize_optional_flexible_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_flexible_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub speaker_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_flexible_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub email_address: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub affiliation: Affiliation,
    /// Seconds of talk time, joined from `interaction.speakers`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talk_time: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Party {
    /// A party counts as speaking when it carries a non-empty speaker id.
    pub fn is_speaking(&self) -> bool {
        self.speaker_id.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    #[serde(
        default,
        deserialize_with = "deserialize_optional_flexible_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<CallId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Tracker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_i64_or_zero")]
    pub count: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct KeyPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CallContent {
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub trackers: Vec<Tracker>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub topics: Vec<Topic>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub brief: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub key_points: Vec<KeyPoint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerStat {
    #[serde(
        default,
        deserialize_with = "deserialize_optional_flexible_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_flexible_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talk_time: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    #[serde(default, deserialize_with = "deserialize_flexible_i64_or_zero")]
    pub company_count: i64,
    #[serde(default, deserialize_with = "deserialize_flexible_i64_or_zero")]
    pub non_company_count: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub speakers: Vec<SpeakerStat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<QuestionStats>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Account,
    Opportunity,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Account => "Account",
            ObjectType::Opportunity => "Opportunity",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContextField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContextObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_flexible_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub object_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub fields: Vec<ContextField>,
}

impl ContextObject {
    pub fn is_type(&self, object_type: ObjectType) -> bool {
        self.object_type.as_deref() == Some(object_type.as_str())
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|f| f.name.as_deref() == Some(name))
            .and_then(|f| f.value.as_ref())
            .and_then(value_to_text)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContextEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub objects: Vec<ContextObject>,
}

/// One call from the extensive endpoint. Fields not modelled here are kept in
/// `extra` so the archive mirrors the API response.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    #[serde(default)]
    pub meta_data: MetaData,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub context: Vec<ContextEntry>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub parties: Vec<Party>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub content: CallContent,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub interaction: Interaction,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallMetadata {
    /// First context entry holding an object of `object_type`, then that
    /// object within the entry.
    pub fn context_object(&self, object_type: ObjectType) -> Option<&ContextObject> {
        let entry = self
            .context
            .iter()
            .find(|entry| entry.objects.iter().any(|o| o.is_type(object_type)))?;
        entry.objects.iter().find(|o| o.is_type(object_type))
    }

    /// `None` when the entry, the object or the field is missing, or when the
    /// field holds no value.
    pub fn context_field(&self, object_type: ObjectType, field: &str) -> Option<String> {
        self.context_object(object_type)?.field(field)
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    #[serde(
        default,
        deserialize_with = "deserialize_optional_flexible_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub speaker_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub topic: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub sentences: Vec<Sentence>,
}

impl Utterance {
    pub fn text(&self) -> String {
        self.sentences
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Metadata and transcript of one call, plus the organisation fields the
/// normalizer fills in.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JoinedCall {
    pub call_id: CallId,
    pub short_call_id: String,
    pub call_metadata: CallMetadata,
    pub utterances: Vec<Utterance>,
    #[serde(default = "not_available")]
    pub account_api: String,
    #[serde(default = "not_available")]
    pub account_normalized: String,
    #[serde(default = "not_available")]
    pub industry_api: String,
    #[serde(default = "unknown")]
    pub industry_normalized: String,
}

impl JoinedCall {
    pub fn new(
        call_id: CallId,
        short_call_id: String,
        call_metadata: CallMetadata,
        utterances: Vec<Utterance>,
    ) -> Self {
        JoinedCall {
            call_id,
            short_call_id,
            call_metadata,
            utterances,
            account_api: not_available(),
            account_normalized: not_available(),
            industry_api: not_available(),
            industry_normalized: unknown(),
        }
    }

    pub fn parties(&self) -> &[Party] {
        &self.call_metadata.parties
    }

    pub fn party_for_speaker(&self, speaker_id: &str) -> Option<&Party> {
        self.parties()
            .iter()
            .find(|p| p.speaker_id.as_deref() == Some(speaker_id))
    }

    pub fn account_field(&self, field: &str) -> String {
        self.call_metadata
            .context_field(ObjectType::Account, field)
            .unwrap_or_else(not_available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata_with_context(context: Value) -> CallMetadata {
        serde_json::from_value(json!({ "metaData": {"id": "1"}, "context": context })).unwrap()
    }

    #[test]
    fn context_field_scans_entry_then_object_then_field() {
        let meta = metadata_with_context(json!([
            {"system": "Other", "objects": [{"objectType": "Lead", "fields": []}]},
            {"system": "Salesforce", "objects": [
                {"objectType": "Account", "objectId": 42, "fields": [
                    {"name": "Name", "value": "Acme"},
                    {"name": "Website", "value": "acme.com"}
                ]},
                {"objectType": "Opportunity", "fields": [
                    {"name": "StageName", "value": "Negotiation"},
                    {"name": "Amount", "value": 1200}
                ]}
            ]}
        ]));

        assert_eq!(meta.context_field(ObjectType::Account, "Name").as_deref(), Some("Acme"));
        assert_eq!(
            meta.context_field(ObjectType::Opportunity, "StageName").as_deref(),
            Some("Negotiation")
        );
        assert_eq!(
            meta.context_field(ObjectType::Opportunity, "Amount").as_deref(),
            Some("1200")
        );
        assert_eq!(
            meta.context_object(ObjectType::Account).and_then(|o| o.object_id.as_deref()),
            Some("42")
        );
    }

    #[test]
    fn context_field_is_none_when_absent_at_any_level() {
        let no_context = metadata_with_context(json!(null));
        assert!(no_context.context_field(ObjectType::Account, "Name").is_none());

        let no_object = metadata_with_context(json!([{"objects": [{"objectType": "Lead"}]}]));
        assert!(no_object.context_field(ObjectType::Account, "Name").is_none());

        let no_field = metadata_with_context(json!([{"objects": [
            {"objectType": "Account", "fields": [{"name": "Industry", "value": null}]}
        ]}]));
        assert!(no_field.context_field(ObjectType::Account, "Name").is_none());
        assert!(no_field.context_field(ObjectType::Account, "Industry").is_none());
    }

    #[test]
    fn unrecognised_affiliation_becomes_unknown() {
        let party: Party =
            serde_json::from_value(json!({"speakerId": "s1", "affiliation": "Partner"})).unwrap();
        assert_eq!(party.affiliation, Affiliation::Unknown);
        let party: Party = serde_json::from_value(json!({"affiliation": null})).unwrap();
        assert_eq!(party.affiliation, Affiliation::Unknown);
        assert!(!party.is_speaking());
    }

    #[test]
    fn unmodelled_fields_survive_a_round_trip() {
        let raw = json!({
            "metaData": {"id": "9", "title": "Demo", "scheduled": "2025-04-07T10:00:00Z"},
            "media": {"audioUrl": "https://example.com/a.mp3"},
            "content": {"structure": [{"name": "Intro", "duration": 30}]}
        });
        let meta: CallMetadata = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["media"]["audioUrl"], "https://example.com/a.mp3");
        assert_eq!(back["metaData"]["scheduled"], "2025-04-07T10:00:00Z");
        assert_eq!(back["content"]["structure"][0]["name"], "Intro");
    }
}
