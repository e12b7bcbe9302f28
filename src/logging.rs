//! Structured logging: env-filtered console output plus a daily rolling log
//! file under `{data_dir}/logs`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;

/// Rolling log files kept on disk.
pub const MAX_LOG_FILES: usize = 7;

const LOG_FILE_PREFIX: &str = "counter";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped; hold it for the
/// lifetime of the process.
pub fn init(config: &AppConfig) -> Result<WorkerGuard, String> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,counter_pos=debug"));

    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir).map_err(|e| format!("Failed to create log dir: {e}"))?;
    prune_old_logs(&log_dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| format!("Failed to install log subscriber: {e}"))?;

    Ok(guard)
}

/// Delete all but the newest `MAX_LOG_FILES` rolled `counter.*` files in
/// `log_dir`. Anything else in the directory is left alone.
pub fn prune_old_logs(log_dir: &Path) {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };
    let prefix = format!("{LOG_FILE_PREFIX}.");

    let mut rolled: Vec<(SystemTime, PathBuf)> = entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();

    rolled.sort_unstable_by(|a, b| b.0.cmp(&a.0));

    for (_, path) in rolled.into_iter().skip(MAX_LOG_FILES) {
        match fs::remove_file(&path) {
            Ok(()) => debug!(file = %path.display(), "Pruned rolled log"),
            Err(e) => warn!(file = %path.display(), error = %e, "Could not prune rolled log"),
        }
    }
}
