//! Logging infrastructure for rulescan.
//!
//! Log output goes to stderr so scan results on stdout stay machine-readable.

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level
    pub level: LevelFilter,
    /// Show timestamps
    pub timestamps: bool,
    /// Show module path
    pub module_path: bool,
    /// Colorize level tags
    pub colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            timestamps: true,
            module_path: false,
            colors: true,
        }
    }
}

/// Map a configured level name to a filter, defaulting to info.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

impl LogConfig {
    /// Create a log config from application config.
    pub fn from_config(config: &Config) -> Self {
        let level = parse_level(&config.logging.log_level);

        Self {
            level,
            timestamps: true,
            module_path: config.logging.verbose_console
                || level == LevelFilter::Debug
                || level == LevelFilter::Trace,
            colors: true,
        }
    }

    /// Create a verbose log config for CLI.
    pub fn verbose() -> Self {
        Self {
            level: LevelFilter::Debug,
            timestamps: true,
            module_path: true,
            colors: true,
        }
    }

    /// Create a quiet log config (errors only).
    pub fn quiet() -> Self {
        Self {
            level: LevelFilter::Error,
            timestamps: false,
            module_path: false,
            colors: true,
        }
    }

    /// Disable ANSI colors.
    pub fn without_colors(mut self) -> Self {
        self.colors = false;
        self
    }
}

fn level_tag(level: log::Level, colors: bool) -> &'static str {
    match (level, colors) {
        (log::Level::Error, true) => "\x1b[31mERROR\x1b[0m",
        (log::Level::Warn, true) => "\x1b[33mWARN\x1b[0m ",
        (log::Level::Info, true) => "\x1b[32mINFO\x1b[0m ",
        (log::Level::Debug, true) => "\x1b[34mDEBUG\x1b[0m",
        (log::Level::Trace, true) => "\x1b[35mTRACE\x1b[0m",
        (log::Level::Error, false) => "ERROR",
        (log::Level::Warn, false) => "WARN ",
        (log::Level::Info, false) => "INFO ",
        (log::Level::Debug, false) => "DEBUG",
        (log::Level::Trace, false) => "TRACE",
    }
}

/// Initialize the logging system.
///
/// Fails if a global logger is already installed.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let mut builder = Builder::new();

    builder.filter_level(config.level);
    builder.target(Target::Stderr);

    let level = config.level;
    builder.format(move |buf, record| {
        let mut output = String::new();

        if config.timestamps {
            output.push_str(&format!("{} ", Local::now().format("%Y-%m-%d %H:%M:%S")));
        }

        output.push_str(&format!("[{}] ", level_tag(record.level(), config.colors)));

        if config.module_path {
            if let Some(path) = record.module_path() {
                output.push_str(&format!("{}: ", path));
            }
        }

        output.push_str(&format!("{}", record.args()));

        writeln!(buf, "{}", output)
    });

    builder
        .try_init()
        .map_err(|e| Error::Io(format!("Failed to initialize logger: {}", e)))?;

    log::debug!("Logging initialized with level: {:?}", level);
    Ok(())
}
