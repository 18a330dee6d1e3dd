//! Logging setup. stdout carries the MCP protocol, so human-readable output
//! goes to stderr and an optional JSON-lines file.

use std::{
    env,
    fs::{self, OpenOptions},
    io::{self, Error},
    path::{Path, PathBuf},
    sync::OnceLock,
};

use chrono::Local;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log file base name (JSON lines), suffixed with the date.
pub const LOG_FILE_BASE: &str = "gua.jsonl";

const LOG_DIR_ENV: &str = "GUA_LOG_DIR";
const LOG_LEVEL_ENV: &str = "GUA_LOG_LEVEL";
const ALT_LEVEL_ENV: &str = "RUST_LOG";

static LOGGER_GUARD: OnceLock<Result<LoggerGuard, io::Error>> = OnceLock::new();

struct LoggerGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialise logging once per process.
pub fn init() -> io::Result<()> {
    match LOGGER_GUARD.get_or_init(configure_logger) {
        Ok(_) => Ok(()),
        Err(err) => Err(io::Error::new(err.kind(), err.to_string())),
    }
}

/// Directory for JSON log files, if file logging is enabled.
pub fn log_dir() -> Option<PathBuf> {
    env::var_os(LOG_DIR_ENV).map(PathBuf::from)
}

/// Today's log file inside `dir`.
pub fn log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("{}.{}", LOG_FILE_BASE, today))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_from_env(ALT_LEVEL_ENV))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn configure_logger() -> io::Result<LoggerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    let (file_layer, file_guard, log_path) = match log_dir() {
        Some(dir) => {
            fs::create_dir_all(&dir)?;
            let path = log_file_path(&dir);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let (writer, guard) = non_blocking(file);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(false)
                .with_span_list(false)
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .boxed();
            (Some(layer), Some(guard), Some(path))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(Error::other)?;

    if let Some(path) = log_path {
        tracing::info!("File logging enabled: {}", path.display());
    }

    Ok(LoggerGuard {
        _file_guard: file_guard,
    })
}
