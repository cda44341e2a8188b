use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Log directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Global subscriber already installed: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Initialises console and JSON file logging for `app_name` under `log_dir`.
///
/// `RUST_LOG` wins over `log_level` when set. The returned guard flushes the
/// file writer on drop and must be held for the life of the process.
pub fn setup_logging(app_name: &str, log_dir: &Path, log_level: &str, keep_files: usize) -> Result<WorkerGuard, LoggingError> {
    fs::create_dir_all(log_dir)?;
    cleanup_old_logs(log_dir, app_name, keep_files)?;

    let file_appender = rolling::daily(log_dir, app_name);
    let (writer, guard) = non_blocking(file_appender);

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level).map_err(|source| LoggingError::Filter {
            filter: log_level.to_string(),
            source,
        })?,
    };

    let console_layer = fmt::layer().with_target(true).with_ansi(true);
    let file_layer = fmt::layer().with_ansi(false).with_writer(writer).json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(app = app_name, dir = %log_dir.display(), level = log_level, "Logging initialized");
    Ok(guard)
}

/// Deletes all but the newest `keep` files in `log_dir` whose name starts with
/// `prefix`. Returns how many were removed.
pub fn cleanup_old_logs(log_dir: &Path, prefix: &str, keep: usize) -> Result<usize, LoggingError> {
    let mut entries: Vec<(std::time::SystemTime, std::path::PathBuf)> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
        .filter_map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, e.path()))
        })
        .collect();

    entries.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in entries.iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Failed to delete old log file {:?}: {}", path, e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn cleanup_keeps_newest_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(1000);
        for (i, name) in ["server_capacity.2026-10-01", "server_capacity.2026-10-02", "server_capacity.2026-10-03"]
            .iter()
            .enumerate()
        {
            let path = dir.path().join(name);
            fs::write(&path, "x").unwrap();
            let file = fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(base + Duration::from_secs(i as u64 * 100)).unwrap();
        }
        fs::write(dir.path().join("other.log"), "y").unwrap();

        assert_eq!(cleanup_old_logs(dir.path(), "server_capacity", 2).unwrap(), 1);
        assert!(!dir.path().join("server_capacity.2026-10-01").exists());
        assert!(dir.path().join("server_capacity.2026-10-03").exists());
        assert!(dir.path().join("other.log").exists());
    }
}
