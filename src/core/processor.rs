use crate::api::fetchers;
use crate::api::CallSource;
use crate::config::PipelineConfig;
use crate::core::joiner;
use crate::core::stats::{self, RunStats};
use crate::error::{AppError, AppResult};
use crate::io::{self, OutputPaths};
use crate::logging::{log, LogLevel};
use crate::model::call::JoinedCall;
use crate::model::output::{FilterStats, OutputFiles, QualityRow, RunStatistics, SummaryTable};
use crate::normalize::OrgNormalizer;
use crate::transform::quality::{self, FilterRules};
use crate::transform::summary;
use chrono::Utc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RunReport {
    pub statistics: RunStatistics,
    pub phases: RunStats,
    pub paths: OutputPaths,
}

impl RunReport {
    pub fn filters(&self) -> &FilterStats {
        &self.statistics.utterances
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    Cancelled { stage: String },
}

/// Rows of both output tables for an already normalized set of calls.
pub struct BuiltTables {
    pub quality_rows: Vec<QualityRow>,
    pub filters: FilterStats,
    pub summary: SummaryTable,
}

pub fn build_tables(calls: &[JoinedCall], config: &PipelineConfig) -> BuiltTables {
    let rules = FilterRules::from_config(config);
    let (quality_rows, filters) = quality::build_quality_rows(calls, &rules);
    let summary = summary::build_summary_table(calls, &config.trackers);
    BuiltTables {
        quality_rows,
        filters,
        summary,
    }
}

/// Writes the utterance and summary tables, counting each file in `phase`.
pub async fn write_tables(
    tables: BuiltTables,
    paths: &OutputPaths,
    save_stats: &mut stats::CategoryStats,
) -> AppResult<FilterStats> {
    let BuiltTables {
        quality_rows,
        filters,
        summary,
    } = tables;

    let quality = io::save_quality_table(paths.quality_table.clone(), quality_rows).await;
    record_save(save_stats, quality)?;
    let summary = io::save_summary_table(paths.summary_table.clone(), summary).await;
    record_save(save_stats, summary)?;
    Ok(filters)
}

fn record_save(save_stats: &mut stats::CategoryStats, result: AppResult<()>) -> AppResult<()> {
    match result {
        Ok(()) => {
            save_stats.add_ok();
            Ok(())
        }
        Err(e) => {
            save_stats.add_fail();
            Err(e)
        }
    }
}

/// Runs fetch, join, normalization, table building and saving in order.
/// A cancellation noticed at a page or batch boundary ends the run with
/// `RunOutcome::Cancelled`; any other error aborts it.
pub async fn run<S>(
    source: &S,
    config: &PipelineConfig,
    normalizer: &OrgNormalizer,
    cancel: &CancellationToken,
) -> AppResult<RunOutcome>
where
    S: CallSource + ?Sized,
{
    match run_phases(source, config, normalizer, cancel).await {
        Ok(report) => Ok(RunOutcome::Completed(report)),
        Err(AppError::Cancelled(stage)) => {
            log(
                LogLevel::Warning,
                &format!("Run cancelled during {}; no files were written.", stage),
            );
            Ok(RunOutcome::Cancelled { stage })
        }
        Err(e) => Err(e),
    }
}

async fn run_phases<S>(
    source: &S,
    config: &PipelineConfig,
    normalizer: &OrgNormalizer,
    cancel: &CancellationToken,
) -> AppResult<RunReport>
where
    S: CallSource + ?Sized,
{
    let overall_start_time = Instant::now();
    let started_at = Utc::now();
    let range = &config.range;

    log(
        LogLevel::Step,
        &format!(
            "Starting call export for {} to {} at {}",
            range.from,
            range.to,
            started_at.format("%Y-%m-%d %H:%M:%S %Z")
        ),
    );
    log(
        LogLevel::Info,
        &format!("Output Directory: {}", config.out_dir.display()),
    );

    let mut run_stats = stats::initialize_stats();
    let paths = OutputPaths::new(&config.out_dir, range);

    let list_start_time = Instant::now();
    log(LogLevel::Step, "--- Phase 1: Call List Fetch ---");
    let summaries = fetchers::fetch_all_calls(source, range, config.page_delay, cancel).await?;
    {
        let s = stats::phase(&mut run_stats, stats::PHASE_CALL_LIST);
        s.set_total(summaries.len());
        s.add_ok_n(summaries.len());
        stats::log_phase_completion(stats::PHASE_CALL_LIST, s, list_start_time.elapsed());
    }
    if summaries.is_empty() {
        log(
            LogLevel::Warning,
            "No calls found in the date range; writing empty tables.",
        );
    }

    let join_start_time = Instant::now();
    log(LogLevel::Step, "--- Phase 2: Detail & Transcript Join ---");
    let joined =
        joiner::fetch_joined_calls(source, &summaries, range, config.batch_size, cancel).await?;
    let mut calls = joined.calls;
    let dropped_calls = joined.dropped.len();
    {
        let s = stats::phase(&mut run_stats, stats::PHASE_DETAIL_JOIN);
        s.set_total(summaries.len());
        s.add_ok_n(calls.len());
        s.add_skip_n(dropped_calls);
        stats::log_phase_completion(stats::PHASE_DETAIL_JOIN, s, join_start_time.elapsed());
    }

    let normalize_start_time = Instant::now();
    log(LogLevel::Step, "--- Phase 3: Organization Normalization ---");
    normalizer.apply(&mut calls);
    {
        let s = stats::phase(&mut run_stats, stats::PHASE_NORMALIZE);
        s.set_total(calls.len());
        s.add_ok_n(calls.len());
        stats::log_phase_completion(stats::PHASE_NORMALIZE, s, normalize_start_time.elapsed());
    }

    let tables_start_time = Instant::now();
    log(LogLevel::Step, "--- Phase 4: Build Utterance & Summary Tables ---");
    let tables = build_tables(&calls, config);
    {
        let s = stats::phase(&mut run_stats, stats::PHASE_TABLES);
        s.set_total(tables.filters.total_utterances);
        s.add_ok_n(tables.filters.included);
        s.add_skip_n(tables.filters.total_utterances - tables.filters.included);
        stats::log_phase_completion(stats::PHASE_TABLES, s, tables_start_time.elapsed());
    }

    let save_start_time = Instant::now();
    log(LogLevel::Step, "--- Phase 5: Save Files ---");
    io::ensure_output_dir(&config.out_dir).await?;
    let joined_calls = calls.len();
    let filters = {
        let s = stats::phase(&mut run_stats, stats::PHASE_SAVE);
        s.set_total(3);
        let archive = io::save_json(paths.archive.clone(), calls, "call archive".to_string()).await;
        record_save(s, archive)?;
        let filters = write_tables(tables, &paths, s).await?;
        stats::log_phase_completion(stats::PHASE_SAVE, s, save_start_time.elapsed());
        filters
    };

    let duration = overall_start_time.elapsed();
    let statistics = RunStatistics {
        started_at,
        completed_at: Utc::now(),
        duration_seconds: duration.as_secs_f64(),
        total_calls: summaries.len(),
        joined_calls,
        dropped_calls,
        utterances: filters,
        files: OutputFiles {
            archive: Some(paths.archive.clone()),
            quality_table: paths.quality_table.clone(),
            summary_table: paths.summary_table.clone(),
        },
    };

    stats::print_summary(&run_stats, &filters, range, duration);

    Ok(RunReport {
        statistics,
        phases: run_stats,
        paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeSource;
    use crate::model::common::DateRange;
    use crate::normalize::reference::{OrgMappingEntry, ReferenceTables};
    use serde_json::{json, Value};
    use std::path::Path;
    use std::time::Duration;

    fn test_config(out_dir: &Path) -> PipelineConfig {
        let range = DateRange::parse("2025-04-07", "2025-04-14").unwrap();
        let mut config = PipelineConfig::with_defaults(range);
        config.out_dir = out_dir.to_path_buf();
        config.batch_size = 2;
        config.page_delay = Duration::ZERO;
        config
    }

    fn normalizer() -> OrgNormalizer {
        OrgNormalizer::new(ReferenceTables::new(
            vec![OrgMappingEntry {
                primary_domain: "acme.com".to_string(),
                org_name: "Acme Inc".to_string(),
                industry: "Tech".to_string(),
            }],
            vec![],
        ))
    }

    fn metadata(id: &str) -> Value {
        json!({
            "metaData": {"id": id, "title": format!("Call {}", id), "started": "2025-04-08T09:00:00Z", "duration": 600},
            "parties": [
                {"speakerId": "ext", "name": "Dana", "affiliation": "External"},
                {"speakerId": "int", "name": "Sam", "affiliation": "Internal"}
            ],
            "context": [{"objects": [{"objectType": "Account", "objectId": "A1", "fields": [
                {"name": "Name", "value": "ACME corp"},
                {"name": "Website", "value": "https://acme.com"},
                {"name": "Industry", "value": "Software"}
            ]}]}]
        })
    }

    fn transcript() -> Value {
        json!([
            {"speakerId": "ext", "topic": "Pricing", "sentences": [{"start": 0, "end": 5000, "text": "we would like to understand the pricing tiers"}]},
            {"speakerId": "int", "topic": "Pricing", "sentences": [{"start": 5000, "end": 9000, "text": "sure let me walk you through every tier"}]},
            {"speakerId": "ext", "topic": "Small Talk", "sentences": [{"text": "how was the weekend for everyone on the call"}]}
        ])
    }

    fn source() -> FakeSource {
        FakeSource::with_pages(vec![vec!["1001", "1002"], vec!["1003"]])
            .with_metadata("1001", metadata("1001"))
            .with_transcript("1001", transcript())
            .with_metadata("1002", metadata("1002"))
            .with_transcript("1002", transcript())
            .with_metadata("1003", metadata("1003"))
    }

    #[tokio::test]
    async fn completed_run_writes_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let source = source();

        let outcome = run(&source, &config, &normalizer(), &CancellationToken::new())
            .await
            .unwrap();
        let report = match outcome {
            RunOutcome::Completed(report) => report,
            other => panic!("expected completion, got {:?}", other),
        };

        assert_eq!(report.statistics.total_calls, 3);
        assert_eq!(report.statistics.joined_calls, 2);
        assert_eq!(report.statistics.dropped_calls, 1);
        let filters = report.filters();
        assert_eq!(filters.total_utterances, 6);
        assert_eq!(filters.included, 2);
        assert_eq!(filters.excluded_topic, 2);
        assert_eq!(filters.excluded_affiliation, 2);
        assert_eq!(report.phases[stats::PHASE_SAVE].ok, 3);
        assert_eq!(source.extensive_batches().len(), 2);

        assert!(report.paths.archive.ends_with("json_gong_07apr25_to_14apr25.json"));
        let archive: Vec<JoinedCall> = io::load_json(&report.paths.archive).await.unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive[0].account_normalized, "Acme Inc");
        assert_eq!(archive[0].industry_normalized, "Tech");

        let mut rdr = csv::Reader::from_path(&report.paths.quality_table).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][6], "Acme Inc");

        let mut rdr = csv::Reader::from_path(&report.paths.summary_table).unwrap();
        let width = rdr.headers().unwrap().len();
        let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == width));
    }

    #[tokio::test]
    async fn cancellation_between_batches_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let cancel = CancellationToken::new();
        let source = source().cancelling_on_batch(1, cancel.clone());

        let outcome = run(&source, &config, &normalizer(), &cancel).await.unwrap();
        match outcome {
            RunOutcome::Cancelled { stage } => assert!(stage.contains("batch 2/2")),
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert_eq!(source.transcript_batches().len(), 1);
        assert!(!OutputPaths::new(dir.path(), &config.range).archive.exists());
    }

    #[tokio::test]
    async fn cancellation_before_start_stops_at_the_first_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let source = source();

        let outcome = run(&source, &config, &normalizer(), &cancel).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Cancelled { .. }));
        assert_eq!(source.list_requests(), 0);
    }

    #[tokio::test]
    async fn transport_failure_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let source = source().failing_transcript_batch(2);

        let err = run(&source, &config, &normalizer(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ApiError { status: 503, .. }));
    }

    #[tokio::test]
    async fn empty_range_still_writes_headed_tables() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let source = FakeSource::with_pages(vec![vec![]]);

        let outcome = run(&source, &config, &normalizer(), &CancellationToken::new())
            .await
            .unwrap();
        let RunOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.statistics.total_calls, 0);
        assert_eq!(report.filters().total_utterances, 0);
        let text = std::fs::read_to_string(&report.paths.quality_table).unwrap();
        assert!(text.starts_with("CALL_ID,SHORT_CALL_ID"));
    }
}
