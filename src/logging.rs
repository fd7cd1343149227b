// src/logging.rs

//! Logging setup for `runonchange` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `-d` / `--debug` (always `debug`)
//! 2. `--log-level` CLI flag (if provided)
//! 3. `RUNONCHANGE_LOG` environment variable (e.g. "info", "debug")
//! 4. default to `warn`
//!
//! Logs go to STDERR next to the tick marks; stdout carries only the short
//! framing lines and COMMAND's own output.

use anyhow::{Result, anyhow};
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Initialise global logging subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(debug: bool, cli_level: Option<LogLevel>) -> Result<()> {
    let level = resolve_level(
        debug,
        cli_level,
        std::env::var("RUNONCHANGE_LOG").ok().as_deref(),
    );

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("installing log subscriber: {err}"))
}

fn resolve_level(debug: bool, cli_level: Option<LogLevel>, env: Option<&str>) -> tracing::Level {
    if debug {
        return tracing::Level::DEBUG;
    }
    match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => env.and_then(parse_level_str).unwrap_or(tracing::Level::WARN),
    }
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
