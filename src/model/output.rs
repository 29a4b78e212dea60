use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One included utterance of the quality table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct QualityRow {
    pub call_id: String,
    pub short_call_id: String,
    pub call_title: String,
    pub call_date: String,
    pub account_id: String,
    pub account_api: String,
    pub account_normalized: String,
    pub website: String,
    pub industry_api: String,
    pub industry_normalized: String,
    pub speaker_id: String,
    pub speaker_name: String,
    pub speaker_job_title: String,
    pub speaker_affiliation: String,
    pub speaker_email: String,
    pub topic: String,
    pub utterance_start: String,
    pub utterance_end: String,
    pub utterance_text: String,
}

/// Summary table with a header sized to the dataset; every row has
/// `headers.len()` cells.
#[derive(Debug, Clone, Default)]
pub struct SummaryTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub total_utterances: usize,
    pub included: usize,
    pub excluded_topic: usize,
    pub excluded_length: usize,
    pub excluded_affiliation: usize,
    pub dropped_empty: usize,
}

impl FilterStats {
    /// `count` as a whole percentage of all utterances seen.
    pub fn percent_of_total(&self, count: usize) -> u32 {
        if self.total_utterances == 0 {
            return 0;
        }
        (count as f64 / self.total_utterances as f64 * 100.0).round() as u32
    }

    pub fn accounted(&self) -> usize {
        self.included
            + self.excluded_topic
            + self.excluded_length
            + self.excluded_affiliation
            + self.dropped_empty
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct OutputFiles {
    pub archive: Option<PathBuf>,
    pub quality_table: PathBuf,
    pub summary_table: PathBuf,
}

/// Persisted as `fetch_stats_<tag>.json` once a run completes.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunStatistics {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub total_calls: usize,
    pub joined_calls: usize,
    pub dropped_calls: usize,
    pub utterances: FilterStats,
    pub files: OutputFiles,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_round_to_nearest_and_guard_zero() {
        let empty = FilterStats::default();
        assert_eq!(empty.percent_of_total(0), 0);

        let stats = FilterStats {
            total_utterances: 3,
            included: 1,
            excluded_topic: 2,
            ..Default::default()
        };
        assert_eq!(stats.percent_of_total(stats.excluded_topic), 67);
        assert_eq!(stats.percent_of_total(stats.included), 33);
        assert_eq!(stats.accounted(), 3);
    }
}
