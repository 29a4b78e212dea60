use crate::config::PipelineConfig;
use crate::core::processor;
use crate::core::stats::{self, CategoryStats};
use crate::error::{AppError, AppResult};
use crate::io::{self, OutputPaths};
use crate::logging::{log, LogLevel};
use crate::model::call::JoinedCall;
use crate::model::output::{FilterStats, OutputFiles};
use crate::normalize::OrgNormalizer;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub calls: usize,
    pub filters: FilterStats,
    pub files: OutputFiles,
}

/// Rebuilds both tables from a saved call archive without touching the
/// network. Normalization is re-run against the current reference tables.
pub async fn replay_archive(
    archive_path: &Path,
    config: &PipelineConfig,
    normalizer: &OrgNormalizer,
) -> AppResult<ReplayReport> {
    let start_time = Instant::now();
    log(LogLevel::Step, "--- Replaying Call Archive ---");
    log(
        LogLevel::Info,
        &format!("Archive: {}", archive_path.display()),
    );

    if !archive_path.exists() {
        return Err(AppError::Argument(format!(
            "Archive file not found: {}",
            archive_path.display()
        )));
    }

    let mut calls: Vec<JoinedCall> = io::load_json(archive_path).await?;
    log(
        LogLevel::Info,
        &format!("Loaded {} call(s) from archive.", calls.len()),
    );

    normalizer.apply(&mut calls);
    let tables = processor::build_tables(&calls, config);

    io::ensure_output_dir(&config.out_dir).await?;
    let paths = OutputPaths::new(&config.out_dir, &config.range);
    let mut save_stats = CategoryStats::default();
    save_stats.set_total(2);
    let filters = processor::write_tables(tables, &paths, &mut save_stats).await?;
    stats::log_phase_completion("Replay", &save_stats, start_time.elapsed());

    Ok(ReplayReport {
        calls: calls.len(),
        filters,
        files: OutputFiles {
            archive: None,
            quality_table: paths.quality_table,
            summary_table: paths.summary_table,
        },
    })
}
