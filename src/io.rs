use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::common::DateRange;
use crate::model::output::{QualityRow, RunStatistics, SummaryTable};
use crate::utils;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Locations of the four files a run produces for one date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub archive: PathBuf,
    pub quality_table: PathBuf,
    pub summary_table: PathBuf,
    pub statistics: PathBuf,
}

impl OutputPaths {
    pub fn new(out_dir: &Path, range: &DateRange) -> Self {
        let tag = range.file_tag();
        OutputPaths {
            archive: out_dir.join(format!("json_gong_{}.json", tag)),
            quality_table: out_dir.join(format!("utterances_gong_{}.csv", tag)),
            summary_table: out_dir.join(format!("summary_gong_{}.csv", tag)),
            statistics: out_dir.join(format!("fetch_stats_{}.json", tag)),
        }
    }
}

pub async fn ensure_output_dir(base_dir: &Path) -> AppResult<()> {
    log(
        LogLevel::Info,
        &format!("Ensuring output directory exists: {}", base_dir.display()),
    );
    fs::create_dir_all(base_dir)
        .await
        .map_err(|e| map_io_error(e, base_dir))
}

fn map_io_error(error: std::io::Error, path: &Path) -> AppError {
    AppError::Io(format!("I/O error at path '{}': {}", path.display(), error))
}

async fn write_file_async(fpath: &Path, data: &[u8]) -> AppResult<()> {
    let mut file = File::create(fpath)
        .await
        .map_err(|e| map_io_error(e, fpath))?;
    file.write_all(data)
        .await
        .map_err(|e| map_io_error(e, fpath))?;
    file.flush().await.map_err(|e| map_io_error(e, fpath))?;
    Ok(())
}

/// Writes already-encoded bytes, removing a partially written file on failure.
async fn write_or_clean(fpath: &Path, data: &[u8], log_ctx: &str) -> AppResult<()> {
    if let Err(e) = write_file_async(fpath, data).await {
        log(
            LogLevel::Error,
            &format!(
                "Save ({}) FAIL - Write Error: {}. File: '{}'",
                log_ctx,
                e,
                fpath.display()
            ),
        );
        if fs::try_exists(fpath).await.unwrap_or(false) {
            let _ = fs::remove_file(fpath).await;
        }
        return Err(e);
    }
    Ok(())
}

pub async fn save_json<T>(fpath: PathBuf, data: T, log_ctx: String) -> AppResult<()>
where
    T: Serialize + Send + Sync + 'static,
{
    let json_bytes = utils::run_blocking(move || {
        serde_json::to_vec_pretty(&data).map_err(AppError::from)
    })
    .await
    .map_err(|e| {
        log(
            LogLevel::Error,
            &format!(
                "Save JSON ({}) FAIL - Serialize/Task Error: {}. File: '{}'",
                log_ctx,
                e,
                fpath.display()
            ),
        );
        e
    })?;
    write_or_clean(&fpath, &json_bytes, &log_ctx).await
}

fn encode_quality(rows: &[QualityRow]) -> AppResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for row in rows {
        wtr.serialize(row)?;
    }
    if rows.is_empty() {
        wtr.write_record(QUALITY_HEADERS)?;
    }
    wtr.into_inner()
        .map_err(|e| AppError::Csv(e.to_string()))
}

fn encode_summary(table: &SummaryTable) -> AppResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.into_inner()
        .map_err(|e| AppError::Csv(e.to_string()))
}

/// Header of the utterance table; serde derives the same names from
/// `QualityRow` when rows exist.
pub const QUALITY_HEADERS: [&str; 19] = [
    "CALL_ID",
    "SHORT_CALL_ID",
    "CALL_TITLE",
    "CALL_DATE",
    "ACCOUNT_ID",
    "ACCOUNT_API",
    "ACCOUNT_NORMALIZED",
    "WEBSITE",
    "INDUSTRY_API",
    "INDUSTRY_NORMALIZED",
    "SPEAKER_ID",
    "SPEAKER_NAME",
    "SPEAKER_JOB_TITLE",
    "SPEAKER_AFFILIATION",
    "SPEAKER_EMAIL",
    "TOPIC",
    "UTTERANCE_START",
    "UTTERANCE_END",
    "UTTERANCE_TEXT",
];

pub async fn save_quality_table(fpath: PathBuf, rows: Vec<QualityRow>) -> AppResult<()> {
    let count = rows.len();
    let bytes = utils::run_blocking(move || encode_quality(&rows)).await?;
    write_or_clean(&fpath, &bytes, "quality table").await?;
    log(
        LogLevel::Info,
        &format!("Wrote {} utterance row(s) to {}", count, fpath.display()),
    );
    Ok(())
}

pub async fn save_summary_table(fpath: PathBuf, table: SummaryTable) -> AppResult<()> {
    let count = table.rows.len();
    let width = table.headers.len();
    let bytes = utils::run_blocking(move || encode_summary(&table)).await?;
    write_or_clean(&fpath, &bytes, "summary table").await?;
    log(
        LogLevel::Info,
        &format!(
            "Wrote {} summary row(s) x {} column(s) to {}",
            count,
            width,
            fpath.display()
        ),
    );
    Ok(())
}

pub async fn save_run_statistics(fpath: PathBuf, stats: RunStatistics) -> AppResult<()> {
    save_json(fpath, stats, "run statistics".to_string()).await
}

pub async fn load_json<T>(fpath: &Path) -> AppResult<T>
where
    T: for<'de> serde::Deserialize<'de> + Send + 'static,
{
    let bytes = fs::read(fpath).await.map_err(|e| map_io_error(e, fpath))?;
    utils::run_blocking(move || serde_json::from_slice(&bytes).map_err(AppError::from)).await
}
