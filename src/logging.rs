use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_core::{Metadata, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{Result, WebhookError};

/// Target of command execution events routed to standard output.
/// Kept under the crate path so crate-scoped `RUST_LOG` directives cover it.
pub const EXEC_STDOUT_TARGET: &str = "gitlab_webhook::exec";

const DEFAULT_LOG_FILTER: &str = "info";

/// Where the outcome of a command execution is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecSink {
    /// Dedicated timestamped logger on standard output.
    Stdout,
    /// The main log, i.e. the configured log file.
    MainLog,
}

impl ExecSink {
    pub fn from_exec_to_std(exec_to_std: bool) -> Self {
        if exec_to_std {
            ExecSink::Stdout
        } else {
            ExecSink::MainLog
        }
    }
}

pub fn exec_info(sink: ExecSink, message: &str) {
    match sink {
        ExecSink::Stdout => info!(target: EXEC_STDOUT_TARGET, "{}", message),
        ExecSink::MainLog => info!("{}", message),
    }
}

pub fn exec_error(sink: ExecSink, message: &str) {
    match sink {
        ExecSink::Stdout => error!(target: EXEC_STDOUT_TARGET, "{}", message),
        ExecSink::MainLog => error!("{}", message),
    }
}

/// Appends log lines to a single, never rotated file.
pub struct FileLogger {
    log_file: PathBuf,
}

impl FileLogger {
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
        }
    }

    pub fn setup_file_logging(&self) -> Result<(NonBlocking, WorkerGuard)> {
        let file_name = self
            .log_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                WebhookError::LogFileError(format!(
                    "Invalid log file path '{}'",
                    self.log_file.display()
                ))
            })?;
        let directory = match self.log_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(directory)
            .map_err(|e| {
                WebhookError::LogFileError(format!(
                    "Failed to open log file '{}': {}",
                    self.log_file.display(),
                    e
                ))
            })?;

        // A single worker thread owns the file, so concurrent lines never interleave.
        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// Main log events go to `main_writer`, execution events aimed at
/// [`EXEC_STDOUT_TARGET`] go to `exec_writer`, and nothing goes to both.
pub(crate) fn routed_layers<S, M, E>(main_writer: M, exec_writer: E) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    M: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    E: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_writer)
        .with_ansi(false)
        .with_filter(filter_fn(|meta: &Metadata<'_>| {
            meta.target() != EXEC_STDOUT_TARGET
        }));

    let exec_layer = tracing_subscriber::fmt::layer()
        .with_writer(exec_writer)
        .with_filter(filter_fn(|meta: &Metadata<'_>| {
            meta.target() == EXEC_STDOUT_TARGET
        }));

    main_layer.and_then(exec_layer)
}

/// Install the global subscriber. The returned guard flushes the log file
/// when dropped and must be held for the life of the process.
pub fn setup_logging(file_logger: &FileLogger) -> Result<WorkerGuard> {
    let (file_writer, guard) = file_logger.setup_file_logging()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(routed_layers(file_writer, std::io::stdout))
        .try_init()
        .map_err(|e| WebhookError::LogFileError(format!("Failed to install logger: {}", e)))?;

    Ok(guard)
}
