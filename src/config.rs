use crate::model::common::DateRange;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OUT_DIR: &str = "./gong_output";
pub const DEFAULT_BASE_URL: &str = "https://us-11211.api.gong.io";
pub const DEFAULT_ORG_MAPPING_FILE: &str = "normalized_orgs.csv";
pub const DEFAULT_INDUSTRY_MAPPING_FILE: &str = "industry_mapping.csv";

pub const ENDPOINT_CALLS: &str = "/v2/calls";
pub const ENDPOINT_EXTENSIVE: &str = "/v2/calls/extensive";
pub const ENDPOINT_TRANSCRIPT: &str = "/v2/calls/transcript";

pub const LIST_TIMEOUT_SECONDS: u64 = 30;
pub const BATCH_TIMEOUT_SECONDS: u64 = 60;
pub const HTTP_CONNECT_TIMEOUT: u64 = 20;
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY_BASE_SECS: f32 = 1.0;
pub const RETRY_STATUS_CODES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];
pub const PAGE_DELAY_SECS: u64 = 1;
pub const ERROR_BODY_SNIPPET_CHARS: usize = 300;

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_MIN_WORD_COUNT: usize = 5;
pub const FUZZY_MATCH_THRESHOLD: f64 = 80.0;

pub const DEFAULT_EXCLUDED_TOPICS: [&str; 3] = ["Call Setup", "Small Talk", "Wrap-up"];
pub const DEFAULT_EXCLUDED_AFFILIATIONS: [&str; 1] = ["Internal"];
pub const DEFAULT_TRACKERS: [&str; 4] = ["Competition", "Pricing", "Objections", "Next Steps"];

pub const TOPIC_PRICING: &str = "Pricing";
pub const TOPIC_NEXT_STEPS: &str = "Next Steps";

pub const NOT_AVAILABLE: &str = "N/A";
pub const UNKNOWN: &str = "Unknown";
pub const UNKNOWN_DATE: &str = "unknown-date";
pub const SHORT_ID_PREFIX_LEN: usize = 5;

pub static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());
pub static COLUMN_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Z0-9]+").unwrap());

/// Settings for one export run, resolved from the command line.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub range: DateRange,
    pub batch_size: usize,
    pub min_word_count: usize,
    pub excluded_topics: HashSet<String>,
    pub excluded_affiliations: HashSet<String>,
    pub trackers: Vec<String>,
    pub page_delay: Duration,
    pub out_dir: PathBuf,
    pub org_mapping_path: PathBuf,
    pub industry_mapping_path: PathBuf,
}

impl PipelineConfig {
    pub fn with_defaults(range: DateRange) -> Self {
        PipelineConfig {
            range,
            batch_size: DEFAULT_BATCH_SIZE,
            min_word_count: DEFAULT_MIN_WORD_COUNT,
            excluded_topics: DEFAULT_EXCLUDED_TOPICS.iter().map(|s| s.to_string()).collect(),
            excluded_affiliations: DEFAULT_EXCLUDED_AFFILIATIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trackers: DEFAULT_TRACKERS.iter().map(|s| s.to_string()).collect(),
            page_delay: Duration::from_secs(PAGE_DELAY_SECS),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            org_mapping_path: PathBuf::from(DEFAULT_ORG_MAPPING_FILE),
            industry_mapping_path: PathBuf::from(DEFAULT_INDUSTRY_MAPPING_FILE),
        }
    }
}
