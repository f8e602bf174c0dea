//! Structured logging for the paged-volume tools.
//!
//! Console output with uptime timestamps and module paths, plus optional JSON
//! file logging for post-mortem analysis of paging and eviction behaviour.
//! The level comes from `RUST_LOG` if set, otherwise from the config.

use nebula_config::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names a level.
pub const DEFAULT_FILTER: &str = "info";

/// File name of the JSON log inside the log directory.
pub const LOG_FILE_NAME: &str = "nebula-voxel.log";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - Directory for the JSON log file
/// * `file_logging` - Whether to write the JSON log at all
/// * `config` - Optional configuration supplying the log level
///
/// # Examples
///
/// ```no_run
/// use nebula_log::init_logging;
/// use nebula_config::Config;
///
/// init_logging(None, false, None);
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, file_logging: bool, config: Option<&Config>) {
    let filter_str = filter_directive(config);

    // RUST_LOG wins over the config
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true) // worker threads are named
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if file_logging
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_file_path(log_dir))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// The filter directive for a config: its `debug.log_level`, or [`DEFAULT_FILTER`].
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.trim().is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Path of the JSON log file inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
