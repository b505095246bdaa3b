//! # Logging Utilities
//!
//! `tracing` subscriber setup for processes that report caller identity.
//!
//! `callerid-core` only emits `tracing` events; the host decides where they
//! go. This module wires up a subscriber with:
//! - Pretty (development) or JSON (production) output
//! - `RUST_LOG` filtering
//! - Optional daily-rolling file output
//! - RFC 3339 UTC timestamps
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use callerid_utils::init_logging;
//!
//! init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!(caller = "my_app::handler", "request handled");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=callerid_core=trace`)
//! - `CALLERID_LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `CALLERID_LOG_FILE`: optional log file path, written in addition to stdout

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "CALLERID_LOG_FORMAT";
/// Environment variable naming an additional log file.
pub const LOG_FILE_ENV: &str = "CALLERID_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable, colored on terminals
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "dev" | "text" => Ok(LogFormat::Pretty),
            "json" | "prod" => Ok(LogFormat::Json),
            other => Err(LoggingError::InvalidFormat(other.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(LoggingError::InvalidLevel(other.to_string())),
        }
    }
}

/// Initialize logging from the environment.
///
/// `RUST_LOG` drives filtering (default `info`), `CALLERID_LOG_FORMAT` picks
/// the format and `CALLERID_LOG_FILE` adds a daily-rolling file sink.
///
/// ## Errors
///
/// Returns an error if `CALLERID_LOG_FORMAT` holds an unknown value, the log
/// file directory cannot be created, or a global subscriber is already set.
pub fn init_logging() -> Result<(), LoggingError>
{
    let format = match env::var(LOG_FORMAT_ENV) {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::default(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    let file = env::var(LOG_FILE_ENV).ok().map(PathBuf::from);

    install(format, &filter, file.as_deref())
}

/// Initialize logging with an explicit level and format, ignoring `RUST_LOG`.
///
/// `CALLERID_LOG_FILE` is still honored.
///
/// ## Errors
///
/// Returns an error if the log file directory cannot be created or a global
/// subscriber is already set.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<(), LoggingError>
{
    let filter = EnvFilter::new(Level::from(level).to_string());
    let file = env::var(LOG_FILE_ENV).ok().map(PathBuf::from);

    install(format, &filter, file.as_deref())
}

/// Initialize file-only logging for hosts whose stdout carries program output.
///
/// Events go to `<dir>/YYYY-MM-DD-callerid.log` in the pretty format without
/// ANSI colors. An explicit `level` takes precedence over `RUST_LOG`.
///
/// Returns the path of the log file.
///
/// ## Errors
///
/// Returns an error if `dir` cannot be created or a global subscriber is
/// already set.
pub fn init_logging_to_dir(dir: &Path, level: Option<LogLevel>) -> Result<PathBuf, LoggingError>
{
    std::fs::create_dir_all(dir)?;
    let file_name = dated_file_name();

    let filter = match level {
        Some(level) => EnvFilter::new(Level::from(level).to_string()),
        None => env::var("RUST_LOG")
            .ok()
            .and_then(|spec| EnvFilter::try_new(spec).ok())
            .unwrap_or_else(|| EnvFilter::new(Level::INFO.to_string())),
    };

    let appender = tracing_appender::rolling::never(dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    keep_alive(guard);

    Registry::default()
        .with(layer_for(LogFormat::Pretty, writer, false, filter))
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(dir.join(file_name))
}

/// File name used by [`init_logging_to_dir`] for today's date (UTC).
#[must_use]
pub fn dated_file_name() -> String
{
    format!("{}-callerid.log", Utc::now().format("%Y-%m-%d"))
}

fn install(format: LogFormat, filter: &EnvFilter, file: Option<&Path>) -> Result<(), LoggingError>
{
    let mut layers = vec![layer_for(format, io::stdout, true, filter.clone())];

    if let Some(path) = file {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;
        let name = path.file_name().map_or_else(|| PathBuf::from(dated_file_name()), PathBuf::from);
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
        keep_alive(guard);
        layers.push(layer_for(format, writer, false, filter.clone()));
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))
}

fn layer_for<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => base.with_ansi(ansi).with_filter(filter).boxed(),
        LogFormat::Json => base
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

// The global subscriber lives for the rest of the process, so its flush
// guard must as well.
fn keep_alive(guard: WorkerGuard)
{
    std::mem::forget(guard);
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Unknown value for the log format
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Unknown value for the log level
    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// A global subscriber was already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// Log file or directory could not be created
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("prod".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!(matches!("xml".parse::<LogFormat>(), Err(LoggingError::InvalidFormat(v)) if v == "xml"));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("Info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("dbg".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_dated_file_name_shape()
    {
        let name = dated_file_name();
        assert!(name.ends_with("-callerid.log"));
        // YYYY-MM-DD prefix
        assert_eq!(name.len(), "2024-01-01-callerid.log".len());
        assert_eq!(name.as_bytes()[4], b'-');
        assert_eq!(name.as_bytes()[7], b'-');
    }

    #[test]
    fn test_error_messages_name_the_value()
    {
        let err = LoggingError::InvalidLevel("loud".into());
        assert!(err.to_string().contains("loud"));
    }
}
