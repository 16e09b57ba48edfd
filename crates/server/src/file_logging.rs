//! Console and optional file logging.
//!
//! Console output is always on. Setting `PLANK_FILE_LOGGING` adds a daily
//! rotating JSON log under the log directory.
//!
//! # Configuration
//!
//! - `PLANK_FILE_LOGGING`: "true" or "1" enables file logging
//! - `PLANK_LOG_DIR`: log directory (defaults to `{asset_dir}/logs`)
//! - `PLANK_LOG_MAX_FILES`: number of daily log files to retain (default: 7)

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};
use utils::assets::log_dir;

const LOG_FILE_PREFIX: &str = "plank.log";
const DEFAULT_MAX_FILES: usize = 7;

#[derive(Debug, Clone)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub log_dir: PathBuf,
    pub max_files: usize,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        let enabled = std::env::var("PLANK_FILE_LOGGING")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_files = std::env::var("PLANK_LOG_MAX_FILES")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_FILES);

        Self {
            enabled,
            log_dir: log_dir(),
            max_files,
        }
    }
}

/// Filter directives for the workspace crates at `log_level`, everything
/// else at `warn`.
pub fn filter_directives(log_level: &str) -> String {
    format!(
        "warn,server={level},services={level},db={level},remote={level},utils={level}",
        level = log_level
    )
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(filter_directives(log_level)).unwrap_or_else(|e| {
        eprintln!("Invalid log level {log_level:?} ({e}), falling back to info");
        EnvFilter::new(filter_directives("info"))
    })
}

/// Initialize logging. The returned guard flushes the file writer on drop and
/// must live as long as the process; it is `None` when only the console is
/// used.
pub fn init_logging(log_level: &str) -> Option<WorkerGuard> {
    let config = FileLoggingConfig::default();
    let console_layer = tracing_subscriber::fmt::layer().with_filter(env_filter(log_level));

    if !config.enabled {
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!("Failed to create log directory {:?}: {}", config.log_dir, e);
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(env_filter(log_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = ?config.log_dir,
        max_files = config.max_files,
        "File logging enabled"
    );

    let log_dir = config.log_dir.clone();
    let max_files = config.max_files;
    std::thread::spawn(move || {
        cleanup_old_logs(&log_dir, max_files);
    });

    Some(guard)
}

/// Keep only the `max_files` most recently modified log files.
fn cleanup_old_logs(log_dir: &Path, max_files: usize) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };

    let mut log_files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        })
        .filter_map(|e| {
            e.metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|t| (e.path(), t))
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.into_iter().skip(max_files) {
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = ?path, error = %e, "Failed to remove old log file");
        } else {
            tracing::debug!(path = ?path, "Removed old log file");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, thread, time::Duration};

    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn filter_covers_workspace_crates() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("warn,"));
        for krate in ["server", "services", "db", "remote", "utils"] {
            assert!(directives.contains(&format!("{krate}=debug")));
        }
    }

    #[test]
    fn cleanup_keeps_newest_files() {
        let dir = TempDir::new().unwrap();
        for day in ["2026-01-01", "2026-01-02", "2026-01-03"] {
            fs::write(dir.path().join(format!("{LOG_FILE_PREFIX}.{day}")), "{}").unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        cleanup_old_logs(dir.path(), 2);

        let mut remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                format!("{LOG_FILE_PREFIX}.2026-01-02"),
                format!("{LOG_FILE_PREFIX}.2026-01-03"),
                "unrelated.txt".to_string(),
            ]
        );
    }

    #[test]
    #[serial]
    fn config_reads_environment() {
        // SAFETY: Tests run serially via #[serial] attribute
        unsafe {
            std::env::set_var("PLANK_FILE_LOGGING", "1");
            std::env::set_var("PLANK_LOG_DIR", "/tmp/plank-logs");
            std::env::set_var("PLANK_LOG_MAX_FILES", "3");
        }
        let config = FileLoggingConfig::default();
        unsafe {
            std::env::remove_var("PLANK_FILE_LOGGING");
            std::env::remove_var("PLANK_LOG_DIR");
            std::env::remove_var("PLANK_LOG_MAX_FILES");
        }

        assert!(config.enabled);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/plank-logs"));
        assert_eq!(config.max_files, 3);
    }
}
