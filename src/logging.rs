//! Process-wide logging setup.
//!
//! The donor crate declares `log` and `simplelog` but never wires them to a
//! real `log::Log` implementation — its `logger.rs` bypassed the facade with
//! a hand-rolled ring buffer. This module completes that stack: a combined
//! terminal + rotating file logger, initialized once at process start.

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::OpenOptions;
use std::path::Path;

/// Install the global logger. Safe to call once; subsequent calls are
/// no-ops (the error from a second `set_logger` is swallowed).
pub fn init(log_path: impl AsRef<Path>, level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> =
        vec![TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )];

    match OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path.as_ref())
    {
        Ok(file) => loggers.push(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!(
                "logging: failed to open {}: {} (continuing with terminal logging only)",
                log_path.as_ref().display(),
                err
            );
        }
    }

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("logging: a global logger is already installed, skipping re-init");
    }
}

/// Level resolved from `RUST_LOG` (a single level name, no per-module
/// filters — the donor's logging surface never needed that granularity).
pub fn level_from_env() -> LevelFilter {
    match std::env::var("RUST_LOG").unwrap_or_default().to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}
