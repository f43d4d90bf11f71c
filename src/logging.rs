//! Logging setup and configuration.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::error::AppError;

/// Installs a subscriber writing to stdout and to a daily log file under
/// `config.logs_path`.
///
/// `RUST_LOG` takes precedence over `config.log_filter`. Dispatcher records go
/// through the `log` facade and end up in the same sinks. Buffered file output
/// is flushed when the returned guard is dropped, so keep it alive in `main`.
pub fn setup_logging(config: &Config) -> Result<WorkerGuard, AppError> {
    let log_file = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("scoped-events")
        .filename_suffix("log")
        .max_log_files(7)
        .build(&config.logs_path)
        .map_err(|e| AppError::ConfigurationError {
            msg: format!(
                "Failed to open log directory '{}': {}",
                config.logs_path.display(),
                e
            ),
        })?;
    let (file_writer, flush_guard) = tracing_appender::non_blocking(log_file);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|e| AppError::ConfigurationError {
            msg: format!("Failed to install logging subscriber: {}", e),
        })?;

    Ok(flush_guard)
}
