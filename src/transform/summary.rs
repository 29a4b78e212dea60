use crate::config;
use crate::model::call::{Affiliation, JoinedCall, ObjectType, Party};
use crate::model::common::iso_date;
use crate::model::output::SummaryTable;
use crate::utils::{format_duration, quote_id};
use std::collections::{HashMap, HashSet};

const FIXED_PREFIX: [&str; 23] = [
    "CALL_ID",
    "SHORT_CALL_ID",
    "CALL_TITLE",
    "CALL_START_TIME",
    "CALL_DATE",
    "DURATION",
    "CALL_URL",
    "MEETING_URL",
    "WEBSITE",
    "ACCOUNT_API",
    "ACCOUNT_NORMALIZED",
    "INDUSTRY_API",
    "INDUSTRY_NORMALIZED",
    "OPPORTUNITY_NAME",
    "LEAD_SOURCE",
    "OPPORTUNITY_TYPE",
    "DEAL_STAGE",
    "FORECAST_CATEGORY",
    "EXTERNAL_PARTICIPANTS",
    "INTERNAL_PARTICIPANTS",
    "TOTAL_SPEAKERS",
    "INTERNAL_SPEAKERS",
    "EXTERNAL_SPEAKERS",
];

const FIXED_SUFFIX: [&str; 6] = [
    "PRICING_DURATION",
    "NEXT_STEPS_DURATION",
    "QUESTIONS_COMPANY",
    "QUESTIONS_NON_COMPANY",
    "CALL_BRIEF",
    "KEY_POINTS",
];

const OPPORTUNITY_FIELDS: [&str; 5] = [
    "Name",
    "LeadSource",
    "Type",
    "StageName",
    "ForecastCategoryName",
];

/// `TRACKER_<NAME>` with the name uppercased and non-alphanumeric runs
/// collapsed to `_`.
pub fn tracker_column(name: &str) -> String {
    let upper = name.to_uppercase();
    let cleaned = config::COLUMN_NAME_RE.replace_all(&upper, "_");
    format!("TRACKER_{}", cleaned.trim_matches('_'))
}

fn speaking_parties(call: &JoinedCall, affiliation: Affiliation) -> Vec<&Party> {
    let mut parties: Vec<&Party> = call
        .parties()
        .iter()
        .filter(|p| p.is_speaking() && p.affiliation == affiliation)
        .collect();
    parties.sort_by(|a, b| {
        b.talk_time
            .unwrap_or(0.0)
            .total_cmp(&a.talk_time.unwrap_or(0.0))
    });
    parties
}

/// Column layout of the summary table, sized over the whole dataset before
/// any row is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLayout {
    pub max_external: usize,
    pub max_internal: usize,
    pub trackers: Vec<String>,
}

impl SummaryLayout {
    pub fn from_calls(calls: &[JoinedCall], trackers: &[String]) -> Self {
        let mut max_external = 0;
        let mut max_internal = 0;
        for call in calls {
            max_external = max_external.max(speaking_parties(call, Affiliation::External).len());
            max_internal = max_internal.max(speaking_parties(call, Affiliation::Internal).len());
        }
        let mut columns = HashSet::new();
        let trackers = trackers
            .iter()
            .filter(|t| columns.insert(tracker_column(t)))
            .cloned()
            .collect();
        SummaryLayout {
            max_external,
            max_internal,
            trackers,
        }
    }

    pub fn width(&self) -> usize {
        FIXED_PREFIX.len()
            + 2 * self.max_external
            + 2 * self.max_internal
            + 1
            + self.trackers.len()
            + FIXED_SUFFIX.len()
    }

    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = FIXED_PREFIX.iter().map(|h| h.to_string()).collect();
        for (side, max) in [("EXTERNAL", self.max_external), ("INTERNAL", self.max_internal)] {
            for n in 1..=max {
                headers.push(format!("{}_SPEAKER_{}_NAME", side, n));
                headers.push(format!("{}_SPEAKER_{}_TITLE", side, n));
            }
        }
        headers.push("TRACKERS_ALL".to_string());
        headers.extend(self.trackers.iter().map(|t| tracker_column(t)));
        headers.extend(FIXED_SUFFIX.iter().map(|h| h.to_string()));
        headers
    }

    pub fn build_row(&self, call: &JoinedCall) -> Vec<String> {
        let meta = &call.call_metadata.meta_data;
        let content = &call.call_metadata.content;
        let na = || config::NOT_AVAILABLE.to_string();

        let mut row = Vec::with_capacity(self.width());
        row.push(quote_id(&call.call_id));
        row.push(call.short_call_id.clone());
        row.push(meta.title.clone().unwrap_or_else(na));
        row.push(meta.started.clone().unwrap_or_else(na));
        row.push(meta.started.as_deref().and_then(iso_date).unwrap_or_else(na));
        row.push(format_duration(meta.duration.as_ref()));
        row.push(meta.url.clone().unwrap_or_else(na));
        row.push(meta.meeting_url.clone().unwrap_or_else(na));
        row.push(call.account_field("Website"));
        row.push(call.account_api.clone());
        row.push(call.account_normalized.clone());
        row.push(call.industry_api.clone());
        row.push(call.industry_normalized.clone());
        for field in OPPORTUNITY_FIELDS {
            row.push(
                call.call_metadata
                    .context_field(ObjectType::Opportunity, field)
                    .unwrap_or_else(na),
            );
        }

        let count_parties = |a: Affiliation| call.parties().iter().filter(|p| p.affiliation == a).count();
        row.push(count_parties(Affiliation::External).to_string());
        row.push(count_parties(Affiliation::Internal).to_string());

        let speakers: HashSet<&str> = call
            .utterances
            .iter()
            .filter_map(|u| u.speaker_id.as_deref())
            .filter(|id| !id.is_empty())
            .collect();
        let speakers_of = |a: Affiliation| {
            speakers
                .iter()
                .filter(|id| call.party_for_speaker(id).is_some_and(|p| p.affiliation == a))
                .count()
        };
        row.push(speakers.len().to_string());
        row.push(speakers_of(Affiliation::Internal).to_string());
        row.push(speakers_of(Affiliation::External).to_string());

        for (affiliation, max) in [
            (Affiliation::External, self.max_external),
            (Affiliation::Internal, self.max_internal),
        ] {
            let ranked = speaking_parties(call, affiliation);
            for slot in 0..max {
                match ranked.get(slot) {
                    Some(party) => {
                        row.push(party.name.clone().unwrap_or_default());
                        row.push(party.title.clone().unwrap_or_default());
                    }
                    None => {
                        row.push(String::new());
                        row.push(String::new());
                    }
                }
            }
        }

        let mut tracker_counts: HashMap<String, i64> = HashMap::new();
        for tracker in &content.trackers {
            if let Some(name) = tracker.name.as_deref() {
                *tracker_counts.entry(name.to_lowercase()).or_insert(0) += tracker.count;
            }
        }
        row.push(if content.trackers.is_empty() {
            na()
        } else {
            content
                .trackers
                .iter()
                .map(|t| {
                    format!(
                        "{}:{}",
                        t.name.as_deref().unwrap_or(config::NOT_AVAILABLE),
                        t.count
                    )
                })
                .collect::<Vec<_>>()
                .join(";")
        });
        for tracker in &self.trackers {
            let count = tracker_counts.get(&tracker.to_lowercase()).copied().unwrap_or(0);
            row.push(count.to_string());
        }

        let topic_duration = |name: &str| {
            let duration = content
                .topics
                .iter()
                .find(|t| t.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
                .and_then(|t| t.duration.clone())
                .unwrap_or_else(|| serde_json::Value::from(0));
            format_duration(Some(&duration))
        };
        row.push(topic_duration(config::TOPIC_PRICING));
        row.push(topic_duration(config::TOPIC_NEXT_STEPS));

        let questions = call.call_metadata.interaction.questions.clone().unwrap_or_default();
        row.push(questions.company_count.to_string());
        row.push(questions.non_company_count.to_string());

        row.push(content.brief.clone().unwrap_or_else(na));
        let key_points: Vec<&str> = content
            .key_points
            .iter()
            .filter_map(|k| k.text.as_deref())
            .collect();
        row.push(if key_points.is_empty() {
            na()
        } else {
            key_points.join(";")
        });

        row
    }
}

pub fn build_summary_table(calls: &[JoinedCall], trackers: &[String]) -> SummaryTable {
    let layout = SummaryLayout::from_calls(calls, trackers);
    SummaryTable {
        headers: layout.headers(),
        rows: calls.iter().map(|c| layout.build_row(c)).collect(),
    }
}
