//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! Options come from the environment and CLI flags, never the config file.
//! `RUST_LOG` takes full filter directives; `PARLANCE_LOG` sets only the
//! level of parlance's own targets and leaves every other target at `warn`.
//!
//! Two modes, picked by [`LoggingOptions::dir`]:
//! - **File** ([`init_production`]): JSON file layer (daily rotation) + console layer
//! - **CLI** ([`init_cli`]): console-only

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Prefix of the rotated log files.
pub const LOG_FILE_PREFIX: &str = "parlance.log";

const DEFAULT_LEVEL: &str = "info";
const DEPENDENCY_LEVEL: &str = "warn";

/// Logging setup failures.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The filter directives do not parse.
    #[error("invalid log filter \"{directives}\": {source}")]
    Filter {
        /// Directives as resolved.
        directives: String,
        /// Parser error.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// The logs directory could not be created.
    #[error("failed to create logs directory {}: {source}", .path.display())]
    LogsDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// No home directory for the default logs location.
    #[error("cannot determine home directory")]
    NoHome,
}

/// Where logs go and how verbose they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// Level for parlance targets (`PARLANCE_LOG`).
    pub level: String,
    /// Full filter directives (`RUST_LOG`); wins over `level` when set.
    pub directives: Option<String>,
    /// Directory for daily JSON log files (`PARLANCE_LOG_DIR`); console
    /// only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_owned(),
            directives: None,
            dir: None,
        }
    }
}

impl LoggingOptions {
    /// Read options from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read options through `env`. Blank values count as unset.
    pub fn from_env_with(env: impl Fn(&str) -> Option<String>) -> Self {
        let set = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        Self {
            level: set("PARLANCE_LOG").unwrap_or_else(|| DEFAULT_LEVEL.to_owned()),
            directives: set("RUST_LOG"),
            dir: set("PARLANCE_LOG_DIR").map(PathBuf::from),
        }
    }

    /// The filter directives these options resolve to.
    pub fn directives(&self) -> String {
        match &self.directives {
            Some(directives) => directives.clone(),
            None => format!("{DEPENDENCY_LEVEL},parlance={}", self.level.trim()),
        }
    }

    /// Build the subscriber filter.
    ///
    /// # Errors
    ///
    /// Returns [`LoggingError::Filter`] when the directives do not parse.
    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        let directives = self.directives();
        EnvFilter::try_new(&directives).map_err(|source| LoggingError::Filter { directives, source })
    }
}

/// Holds the non-blocking writer guard for file logging.
///
/// The [`WorkerGuard`] must be kept alive for the duration of the process.
/// Dropping it flushes pending log entries and closes the file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Install the subscriber `options` describe.
///
/// Returns a guard only in file mode.
///
/// # Errors
///
/// Returns an error for an unparsable filter or an uncreatable directory.
pub fn init(options: &LoggingOptions) -> Result<Option<LoggingGuard>, LoggingError> {
    match &options.dir {
        Some(dir) => init_production(dir, options).map(Some),
        None => init_cli(options).map(|()| None),
    }
}

/// Initialise logging with a JSON file layer.
///
/// Writes JSON logs to `{logs_dir}/parlance.log.YYYY-MM-DD` with daily
/// rotation, plus human-readable output to stderr.
///
/// # Errors
///
/// Returns an error if the filter is invalid or the logs directory cannot be
/// created.
pub fn init_production(
    logs_dir: &Path,
    options: &LoggingOptions,
) -> Result<LoggingGuard, LoggingError> {
    let filter = options.filter()?;
    std::fs::create_dir_all(logs_dir).map_err(|source| LoggingError::LogsDir {
        path: logs_dir.to_path_buf(),
        source,
    })?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking);

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(console_layer)
        .init();

    Ok(LoggingGuard { _guard: guard })
}

/// Initialise console-only logging for one-shot subcommands.
///
/// # Errors
///
/// Returns [`LoggingError::Filter`] when the directives do not parse.
pub fn init_cli(options: &LoggingOptions) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(options.filter()?)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Default directory for file logs (`~/.parlance/logs`).
///
/// # Errors
///
/// Returns [`LoggingError::NoHome`] if the home directory cannot be
/// determined.
pub fn default_logs_dir() -> Result<PathBuf, LoggingError> {
    let home = directories::BaseDirs::new().ok_or(LoggingError::NoHome)?;
    Ok(home.home_dir().join(".parlance").join("logs"))
}
