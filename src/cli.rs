use crate::api::client::Credentials;
use crate::config::{self, PipelineConfig};
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::common::DateRange;
use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Exports call metadata and transcripts into utterance and summary tables.",
    long_about = None,
    after_help = format!(
        "Default excluded topics: {}\nDefault trackers: {}",
        config::DEFAULT_EXCLUDED_TOPICS.join(", "),
        config::DEFAULT_TRACKERS.join(", ")
    ),
    arg_required_else_help = true
)]
pub struct CliArgs {
    #[arg(long, value_name = "YYYY-MM-DD", help = "First day of the date range")]
    from: String,

    #[arg(long, value_name = "YYYY-MM-DD", help = "Last day of the date range (inclusive)")]
    to: String,

    #[arg(long, env = "GONG_ACCESS_KEY", hide_env_values = true, help = "API access key")]
    access_key: Option<String>,

    #[arg(long, env = "GONG_SECRET_KEY", hide_env_values = true, help = "API secret key")]
    secret_key: Option<String>,

    #[arg(
        long,
        env = "GONG_BASE_URL",
        default_value = config::DEFAULT_BASE_URL,
        value_name = "URL",
        help = "API base URL"
    )]
    base_url: String,

    #[arg(
        long,
        default_value = config::DEFAULT_OUT_DIR,
        value_name = "DIR_PATH",
        help = "Output directory path"
    )]
    out_dir: String,

    #[arg(
        long,
        default_value = config::DEFAULT_ORG_MAPPING_FILE,
        value_name = "FILE_PATH",
        help = "Organization reference CSV (primary_domain, org_name, FINAL)"
    )]
    org_mapping: String,

    #[arg(
        long,
        default_value = config::DEFAULT_INDUSTRY_MAPPING_FILE,
        value_name = "FILE_PATH",
        help = "Industry mapping CSV (industry_code, FINAL)"
    )]
    industry_mapping: String,

    #[arg(long, default_value_t = config::DEFAULT_BATCH_SIZE, help = "Call ids per detail request")]
    batch_size: usize,

    #[arg(
        long,
        default_value_t = config::DEFAULT_MIN_WORD_COUNT,
        help = "Utterances with at most this many words are excluded"
    )]
    min_word_count: usize,

    #[arg(
        long = "exclude-topic",
        value_name = "TOPIC",
        help = "Topic to exclude (repeatable; replaces the defaults)"
    )]
    exclude_topics: Vec<String>,

    #[arg(
        long = "exclude-affiliation",
        value_name = "AFFILIATION",
        help = "Speaker affiliation to exclude (repeatable; replaces the default 'Internal')"
    )]
    exclude_affiliations: Vec<String>,

    #[arg(
        long = "tracker",
        value_name = "NAME",
        help = "Tracker to give its own summary column (repeatable; replaces the defaults)"
    )]
    trackers: Vec<String>,

    #[arg(
        long,
        value_name = "FILE_PATH",
        help = "Rebuild the tables from a saved call archive instead of fetching"
    )]
    replay_archive: Option<String>,

    #[arg(short, long, help = "Enable debug logging")]
    verbose: bool,
}

fn or_defaults(given: &[String], defaults: &[&str]) -> Vec<String> {
    let cleaned: Vec<String> = given
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if cleaned.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        cleaned
    }
}

impl CliArgs {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }

    pub fn get_replay_archive(&self) -> Option<PathBuf> {
        self.replay_archive.as_deref().map(PathBuf::from)
    }

    pub fn get_credentials(&self) -> AppResult<Credentials> {
        match (self.access_key.as_deref(), self.secret_key.as_deref()) {
            (Some(access), Some(secret)) if !access.trim().is_empty() && !secret.trim().is_empty() => {
                Ok(Credentials {
                    access_key: access.trim().to_string(),
                    secret_key: secret.trim().to_string(),
                })
            }
            _ => Err(AppError::Argument(
                "Missing credentials. Use --access-key/--secret-key or set GONG_ACCESS_KEY/GONG_SECRET_KEY.".into(),
            )),
        }
    }

    pub fn pipeline_config(&self) -> AppResult<PipelineConfig> {
        let range = DateRange::parse(&self.from, &self.to)?;
        if self.batch_size == 0 {
            return Err(AppError::Argument("--batch-size must be at least 1.".into()));
        }

        let mut cfg = PipelineConfig::with_defaults(range);
        cfg.batch_size = self.batch_size;
        cfg.min_word_count = self.min_word_count;
        cfg.excluded_topics = or_defaults(&self.exclude_topics, &config::DEFAULT_EXCLUDED_TOPICS)
            .into_iter()
            .collect::<HashSet<_>>();
        cfg.excluded_affiliations =
            or_defaults(&self.exclude_affiliations, &config::DEFAULT_EXCLUDED_AFFILIATIONS)
                .into_iter()
                .collect::<HashSet<_>>();
        cfg.trackers = or_defaults(&self.trackers, &config::DEFAULT_TRACKERS);
        cfg.out_dir = PathBuf::from(&self.out_dir);
        cfg.org_mapping_path = PathBuf::from(&self.org_mapping);
        cfg.industry_mapping_path = PathBuf::from(&self.industry_mapping);

        log(
            LogLevel::Info,
            &format!(
                "Date range {} to {}, batch size {}, min words {}.",
                cfg.range.from, cfg.range.to, cfg.batch_size, cfg.min_word_count
            ),
        );
        log(
            LogLevel::Debug,
            &format!(
                "Excluded topics: {:?}; excluded affiliations: {:?}; trackers: {:?}",
                cfg.excluded_topics, cfg.excluded_affiliations, cfg.trackers
            ),
        );
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        let mut full = vec!["gong-export"];
        full.extend_from_slice(args);
        CliArgs::try_parse_from(full).unwrap()
    }

    #[test]
    fn defaults_fill_the_pipeline_config() {
        let args = parse(&["--from", "2025-04-07", "--to", "2025-04-14"]);
        let cfg = args.pipeline_config().unwrap();
        assert_eq!(cfg.batch_size, config::DEFAULT_BATCH_SIZE);
        assert!(cfg.excluded_topics.contains("Small Talk"));
        assert!(cfg.excluded_affiliations.contains("Internal"));
        assert_eq!(cfg.trackers.len(), config::DEFAULT_TRACKERS.len());
        assert_eq!(cfg.range.file_tag(), "07apr25_to_14apr25");
    }

    #[test]
    fn repeated_flags_replace_defaults() {
        let args = parse(&[
            "--from", "2025-04-07", "--to", "2025-04-07",
            "--exclude-topic", "Intro", "--exclude-topic", "Outro",
            "--tracker", "Security",
            "--min-word-count", "2",
        ]);
        let cfg = args.pipeline_config().unwrap();
        assert_eq!(cfg.excluded_topics.len(), 2);
        assert!(cfg.excluded_topics.contains("Outro"));
        assert_eq!(cfg.trackers, vec!["Security".to_string()]);
        assert_eq!(cfg.min_word_count, 2);
    }

    #[test]
    fn reversed_range_and_zero_batch_are_rejected() {
        let args = parse(&["--from", "2025-04-14", "--to", "2025-04-07"]);
        assert!(matches!(args.pipeline_config(), Err(AppError::Argument(_))));
        let args = parse(&["--from", "2025-04-07", "--to", "2025-04-08", "--batch-size", "0"]);
        assert!(matches!(args.pipeline_config(), Err(AppError::Argument(_))));
    }

    #[test]
    fn credentials_require_both_keys() {
        let args = parse(&[
            "--from", "2025-04-07", "--to", "2025-04-08",
            "--access-key", "ak", "--secret-key", " ",
        ]);
        assert!(args.get_credentials().is_err());
        let args = parse(&[
            "--from", "2025-04-07", "--to", "2025-04-08",
            "--access-key", "ak", "--secret-key", "sk",
        ]);
        assert_eq!(args.get_credentials().unwrap().secret_key, "sk");
    }
}
