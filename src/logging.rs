use colored::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Step,
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 6] = [
        LogLevel::Step,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Success,
        LogLevel::Warning,
        LogLevel::Error,
    ];

    fn label(self) -> &'static str {
        match self {
            LogLevel::Step => "STEP",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    fn color(self) -> Color {
        match self {
            LogLevel::Step => Color::Magenta,
            LogLevel::Debug => Color::White,
            LogLevel::Info => Color::Cyan,
            LogLevel::Success => Color::Green,
            LogLevel::Warning => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }
}

const MIN_PADDING_AFTER_BRACKET: usize = 1;

static PREFIX_WIDTH: Lazy<usize> = Lazy::new(|| {
    let widest = LogLevel::ALL
        .iter()
        .map(|level| level.label().len())
        .max()
        .unwrap_or(7);
    widest + 4 + MIN_PADDING_AFTER_BRACKET
});

static LOG_PREFIXES: Lazy<HashMap<LogLevel, String>> = Lazy::new(|| {
    colored::control::set_override(true);

    LogLevel::ALL
        .iter()
        .map(|level| {
            let inside = format!(" {} ", level.label()).color(level.color()).bold();
            let padding = PREFIX_WIDTH.saturating_sub(level.label().len() + 4);
            (*level, format!("[{}]{}", inside, " ".repeat(padding)))
        })
        .collect()
});

/// Installs the global subscriber. `RUST_LOG` wins when set; otherwise the
/// filter is `info`, or `debug` with `verbose`.
pub fn setup_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_level(false)
        .with_target(false)
        .compact();

    let _ = tracing_subscriber::fmt()
        .event_format(format)
        .with_ansi(true)
        .with_env_filter(env_filter)
        .try_init();
}

pub fn log(level: LogLevel, message: &str) {
    let prefix = LOG_PREFIXES
        .get(&level)
        .cloned()
        .unwrap_or_else(|| format!("[{:<7}] ", level.label()));

    match level {
        LogLevel::Step => tracing::info!(target: "step", "{}{}", prefix, message),
        LogLevel::Debug => tracing::debug!("{}{}", prefix, message),
        LogLevel::Info | LogLevel::Success => tracing::info!("{}{}", prefix, message),
        LogLevel::Warning => tracing::warn!("{}{}", prefix, message),
        LogLevel::Error => tracing::error!("{}{}", prefix, message),
    }
}
