use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use gong_export::api::client::ApiClient;
use gong_export::cli::CliArgs;
use gong_export::core::processor::{self, RunOutcome};
use gong_export::error::{AppError, AppResult};
use gong_export::io;
use gong_export::logging::{log, setup_logging, LogLevel};
use gong_export::normalize::reference::ReferenceTables;
use gong_export::normalize::OrgNormalizer;
use gong_export::replay;
use std::process::ExitCode;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;

const EXIT_FAILURE: u8 = 1;
const EXIT_ARGUMENT: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

fn main() -> ExitCode {
    let cli_args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            setup_logging(false);
            log(LogLevel::Error, &format!("CLI Argument Error: {}", e));
            let _ = CliArgs::command().print_help();
            return ExitCode::from(EXIT_ARGUMENT);
        }
    };
    setup_logging(cli_args.is_verbose());

    let runtime = match Builder::new_multi_thread()
        .enable_all()
        .thread_name("gong-worker")
        .worker_threads(num_cpus::get())
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log(
                LogLevel::Error,
                &format!("FATAL: Failed to build Tokio runtime: {}", e),
            );
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match runtime.block_on(run_main(cli_args)) {
        Ok(code) => ExitCode::from(code),
        Err(e @ AppError::Argument(_)) => {
            log(LogLevel::Error, &e.to_string());
            ExitCode::from(EXIT_ARGUMENT)
        }
        Err(e) => {
            log(LogLevel::Error, &format!("FATAL ERROR: {}", e));
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run_main(args: CliArgs) -> AppResult<u8> {
    let config = args.pipeline_config()?;
    let tables = ReferenceTables::load(&config.org_mapping_path, &config.industry_mapping_path)?;
    let normalizer = OrgNormalizer::new(tables);

    if let Some(archive) = args.get_replay_archive() {
        let report = replay::replay_archive(&archive, &config, &normalizer).await?;
        log(
            LogLevel::Success,
            &format!(
                "Replay complete: {} call(s), {} of {} utterance(s) kept.",
                report.calls, report.filters.included, report.filters.total_utterances
            ),
        );
        return Ok(0);
    }

    let client = ApiClient::new(args.get_base_url(), args.get_credentials()?)?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log(
                LogLevel::Warning,
                "Interrupt received; stopping at the next page or batch boundary.",
            );
            signal_token.cancel();
        }
    });

    match processor::run(&client, &config, &normalizer, &cancel).await? {
        RunOutcome::Completed(report) => {
            let stats_path = report.paths.statistics.clone();
            io::save_run_statistics(stats_path.clone(), report.statistics).await?;
            log(
                LogLevel::Success,
                &format!("Run statistics saved to {}", stats_path.display()),
            );
            Ok(0)
        }
        RunOutcome::Cancelled { stage } => {
            log(LogLevel::Warning, &format!("Cancelled during {}.", stage));
            Ok(EXIT_CANCELLED)
        }
    }
}
