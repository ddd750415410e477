use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::errors::StressError;
use crate::settings::LogSettings;

const DEFAULT_LEVEL: &str = "info";

/// Keeps the JSON log writer alive. Hold it until the run is over; dropping
/// it flushes buffered lines to the file.
#[must_use = "dropping the guard stops the JSON log writer"]
#[derive(Debug)]
pub struct LogGuard {
    _writer: Option<WorkerGuard>,
}

/// Installs the global subscriber described by `log`.
///
/// Logs go to stderr in compact form, or as JSON lines to `log.json_path`.
/// The filter comes from `log.level`, then `RUST_LOG`, then `info`. Returns
/// without installing anything when logging is disabled or a subscriber is
/// already set.
pub fn init_observability(log: &LogSettings) -> Result<LogGuard, StressError> {
    if log.disabled {
        return Ok(LogGuard { _writer: None });
    }
    let filter = env_filter(log.level.as_deref())?;

    let Some(path) = &log.json_path else {
        let console = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .try_init();
        return Ok(LogGuard { _writer: None });
    };

    let (dir, file_name) = json_log_target(path)?;
    std::fs::create_dir_all(&dir).map_err(|e| {
        StressError::Config(format!("failed to create log directory {}: {e}", dir.display()))
    })?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    let json = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(false)
        .with_writer(writer);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .try_init();
    Ok(LogGuard {
        _writer: Some(guard),
    })
}

fn env_filter(level: Option<&str>) -> Result<EnvFilter, StressError> {
    if let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) {
        return EnvFilter::try_new(level)
            .map_err(|e| StressError::Config(format!("invalid log level `{level}`: {e}")));
    }
    Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL)))
}

fn json_log_target(path: &Path) -> Result<(PathBuf, String), StressError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            StressError::Config(format!("log path {} has no file name", path.display()))
        })?
        .to_string();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok((dir, file_name))
}
