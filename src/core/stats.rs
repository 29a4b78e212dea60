use crate::logging::{log, LogLevel};
use crate::model::common::DateRange;
use crate::model::output::FilterStats;
use std::collections::BTreeMap;
use std::time::Duration;

pub const PHASE_CALL_LIST: &str = "Call List";
pub const PHASE_DETAIL_JOIN: &str = "Detail Join";
pub const PHASE_NORMALIZE: &str = "Normalize";
pub const PHASE_TABLES: &str = "Build Tables";
pub const PHASE_SAVE: &str = "Save Files";

const PHASE_ORDER: [&str; 5] = [
    PHASE_CALL_LIST,
    PHASE_DETAIL_JOIN,
    PHASE_NORMALIZE,
    PHASE_TABLES,
    PHASE_SAVE,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryStats {
    pub ok: usize,
    pub fail: usize,
    pub skip_or_empty: usize,
    pub total_tasks: usize,
}

impl CategoryStats {
    pub fn add_ok(&mut self) {
        self.ok += 1;
    }
    pub fn add_fail(&mut self) {
        self.fail += 1;
    }
    pub fn add_ok_n(&mut self, n: usize) {
        self.ok += n;
    }
    pub fn add_skip_n(&mut self, n: usize) {
        self.skip_or_empty += n;
    }
    pub fn set_total(&mut self, total: usize) {
        self.total_tasks = total;
    }
}

pub type RunStats = BTreeMap<String, CategoryStats>;

pub fn initialize_stats() -> RunStats {
    PHASE_ORDER
        .iter()
        .map(|p| (p.to_string(), CategoryStats::default()))
        .collect()
}

/// Mutable access to one phase's counters, creating them if needed.
pub fn phase<'a>(stats: &'a mut RunStats, name: &str) -> &'a mut CategoryStats {
    stats.entry(name.to_string()).or_default()
}

pub fn log_phase_completion(phase: &str, stats: &CategoryStats, elapsed: Duration) {
    let level = if stats.fail > 0 {
        LogLevel::Warning
    } else {
        LogLevel::Success
    };
    log(
        level,
        &format!(
            "--- {} Phase complete ({} OK, {} Skip/Empty, {} Fail / {} Total) | Elapsed: {:?} ---",
            phase, stats.ok, stats.skip_or_empty, stats.fail, stats.total_tasks, elapsed
        ),
    );
}

fn filter_line(label: &str, count: usize, filters: &FilterStats) -> String {
    format!(
        "{:<24} {:>8} {:>6}%",
        label,
        count,
        filters.percent_of_total(count)
    )
}

pub fn print_summary(stats: &RunStats, filters: &FilterStats, range: &DateRange, duration: Duration) {
    let sep = "=".repeat(60);
    let title = format!("Run Summary ({} to {})", range.from, range.to);
    println!("\n{}\n{:^60}\n{}", sep, title, sep);
    println!("Total Run Time:    {:.3?}", duration);
    println!("{}", "-".repeat(60));

    println!(
        "{:<17} {:<8} {:<12} {:<8} {:<8}",
        "Phase", "OK", "Skip/Empty", "Fail", "Total"
    );
    println!("{}", "-".repeat(60));
    for name in PHASE_ORDER {
        if let Some(s) = stats.get(name) {
            println!(
                "{:<17} {:<8} {:<12} {:<8} {:<8}",
                name, s.ok, s.skip_or_empty, s.fail, s.total_tasks
            );
        }
    }

    println!("{}", "-".repeat(60));
    println!("{:<24} {:>8} {:>7}", "Utterances", "Count", "Share");
    println!("{}", filter_line("Included", filters.included, filters));
    println!("{}", filter_line("Excluded (topic)", filters.excluded_topic, filters));
    println!("{}", filter_line("Excluded (length)", filters.excluded_length, filters));
    println!(
        "{}",
        filter_line("Excluded (affiliation)", filters.excluded_affiliation, filters)
    );
    println!("{}", filter_line("Dropped (empty)", filters.dropped_empty, filters));
    println!("{:<24} {:>8}", "Total", filters.total_utterances);
    println!("{}", sep);

    log_overall_status(stats);

    let end_ts_str = chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string();
    log(
        LogLevel::Step,
        &format!("--- Run Finished at {} ---", end_ts_str),
    );
}

fn log_overall_status(stats: &RunStats) {
    let failures: usize = stats.values().map(|s| s.fail).sum();
    let listed = stats.get(PHASE_CALL_LIST).map_or(0, |s| s.ok);
    if failures > 0 {
        log(
            LogLevel::Error,
            &format!("Run completed with {} failed task(s). Check logs.", failures),
        );
    } else if listed == 0 {
        log(
            LogLevel::Warning,
            "Run completed, but no calls were found in the date range.",
        );
    } else {
        log(LogLevel::Success, "Run completed successfully.");
    }
}
