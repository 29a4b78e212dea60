use crate::config::{self, PipelineConfig};
use crate::model::call::{JoinedCall, ObjectType, Utterance};
use crate::model::common::iso_date;
use crate::model::output::{FilterStats, QualityRow};
use crate::utils::quote_id;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct FilterRules {
    pub excluded_topics: HashSet<String>,
    pub excluded_affiliations: HashSet<String>,
    pub min_word_count: usize,
}

impl FilterRules {
    pub fn from_config(config: &PipelineConfig) -> Self {
        FilterRules {
            excluded_topics: config.excluded_topics.clone(),
            excluded_affiliations: config.excluded_affiliations.clone(),
            min_word_count: config.min_word_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Included,
    ExcludedTopic,
    DroppedEmpty,
    ExcludedLength,
    ExcludedAffiliation,
}

impl FilterStats {
    fn record(&mut self, verdict: Verdict) {
        self.total_utterances += 1;
        match verdict {
            Verdict::Included => self.included += 1,
            Verdict::ExcludedTopic => self.excluded_topic += 1,
            Verdict::DroppedEmpty => self.dropped_empty += 1,
            Verdict::ExcludedLength => self.excluded_length += 1,
            Verdict::ExcludedAffiliation => self.excluded_affiliation += 1,
        }
    }
}

/// First matching rule decides; the order matters because each utterance
/// lands in exactly one bucket.
pub fn classify(utterance: &Utterance, speaker_affiliation: &str, rules: &FilterRules) -> Verdict {
    let topic = utterance.topic.as_deref().unwrap_or(config::NOT_AVAILABLE);
    if rules.excluded_topics.contains(topic) {
        return Verdict::ExcludedTopic;
    }
    if utterance.sentences.is_empty() {
        return Verdict::DroppedEmpty;
    }
    if utterance.text().split_whitespace().count() <= rules.min_word_count {
        return Verdict::ExcludedLength;
    }
    if rules.excluded_affiliations.contains(speaker_affiliation) {
        return Verdict::ExcludedAffiliation;
    }
    Verdict::Included
}

fn or_default(value: Option<&str>, default: &str) -> String {
    value.unwrap_or(default).to_string()
}

fn time_cell(value: Option<i64>) -> String {
    value.map_or_else(|| config::NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Call-level columns shared by every row of one call.
struct CallColumns {
    call_id: String,
    short_call_id: String,
    call_title: String,
    call_date: String,
    account_id: String,
    website: String,
}

impl CallColumns {
    fn of(call: &JoinedCall) -> Self {
        let meta = &call.call_metadata.meta_data;
        let account_id = call
            .call_metadata
            .context_object(ObjectType::Account)
            .and_then(|o| o.object_id.as_deref())
            .map_or_else(|| config::NOT_AVAILABLE.to_string(), quote_id);
        CallColumns {
            call_id: quote_id(&call.call_id),
            short_call_id: call.short_call_id.clone(),
            call_title: or_default(meta.title.as_deref(), config::NOT_AVAILABLE),
            call_date: meta
                .started
                .as_deref()
                .and_then(iso_date)
                .unwrap_or_else(|| config::NOT_AVAILABLE.to_string()),
            account_id,
            website: call.account_field("Website"),
        }
    }
}

fn build_row(call: &JoinedCall, cols: &CallColumns, utterance: &Utterance) -> QualityRow {
    let speaker_id = utterance.speaker_id.as_deref();
    let party = speaker_id.and_then(|id| call.party_for_speaker(id));
    QualityRow {
        call_id: cols.call_id.clone(),
        short_call_id: cols.short_call_id.clone(),
        call_title: cols.call_title.clone(),
        call_date: cols.call_date.clone(),
        account_id: cols.account_id.clone(),
        account_api: call.account_api.clone(),
        account_normalized: call.account_normalized.clone(),
        website: cols.website.clone(),
        industry_api: call.industry_api.clone(),
        industry_normalized: call.industry_normalized.clone(),
        speaker_id: speaker_id.map_or_else(|| config::NOT_AVAILABLE.to_string(), quote_id),
        speaker_name: or_default(party.and_then(|p| p.name.as_deref()), config::NOT_AVAILABLE),
        speaker_job_title: or_default(party.and_then(|p| p.title.as_deref()), config::UNKNOWN),
        speaker_affiliation: party
            .map_or(config::UNKNOWN, |p| p.affiliation.as_str())
            .to_string(),
        speaker_email: or_default(
            party.and_then(|p| p.email_address.as_deref()),
            config::NOT_AVAILABLE,
        ),
        topic: or_default(utterance.topic.as_deref(), config::NOT_AVAILABLE),
        utterance_start: time_cell(utterance.sentences.first().and_then(|s| s.start)),
        utterance_end: time_cell(utterance.sentences.last().and_then(|s| s.end)),
        utterance_text: utterance.text(),
    }
}

/// Emits one row per included utterance and counts every other utterance in
/// exactly one exclusion bucket.
pub fn build_quality_rows(
    calls: &[JoinedCall],
    rules: &FilterRules,
) -> (Vec<QualityRow>, FilterStats) {
    let mut rows = Vec::new();
    let mut stats = FilterStats::default();

    for call in calls {
        let cols = CallColumns::of(call);
        for utterance in &call.utterances {
            let affiliation = utterance
                .speaker_id
                .as_deref()
                .and_then(|id| call.party_for_speaker(id))
                .map_or(config::UNKNOWN, |p| p.affiliation.as_str());

            let verdict = classify(utterance, affiliation, rules);
            stats.record(verdict);
            if verdict == Verdict::Included {
                rows.push(build_row(call, &cols, utterance));
            }
        }
    }

    (rows, stats)
}
