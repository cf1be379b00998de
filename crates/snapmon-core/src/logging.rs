//! Tracing setup for the monitor process.
//!
//! Two sinks: a JSON-lines file rolled daily in the user's state directory
//! (`$XDG_STATE_HOME/snapmon/logs`, usually `~/.local/state/snapmon/logs`)
//! and compact human output on stderr. `SNAPMON_LOG` takes precedence over
//! `RUST_LOG`; without either, the snapmon crates log at `info`, or `debug`
//! when verbose.
//!
//! ## Example
//!
//! ```no_run
//! use snapmon_core::logging;
//!
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! tracing::info!("snapmon started");
//! tracing::debug!(change_id = "42", "polling change");
//! ```

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, SnapmonError};

/// Log file name prefix inside the log directory; the appender adds the date.
pub const LOG_FILE_NAME: &str = "snapmon.log";

/// Filter variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "SNAPMON_LOG";

/// Crates whose events pass the default filter.
const LOG_TARGETS: [&str; 4] = ["snapmon", "snapmon_core", "snapmon_client", "snapmon_monitor"];

/// Flushes the file sink when dropped. Hold it until the process exits.
pub struct LogGuard {
    _file_guard: WorkerGuard,
}

/// Install the global subscriber.
///
/// `log_dir` defaults to [`default_log_dir`]. Fails if the directory cannot
/// be created or a subscriber is already installed.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };
    ensure_dir(&log_dir)?;

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .json()
        .with_current_span(false);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(log_filter(verbose))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| SnapmonError::internal(format!("failed to install log subscriber: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");
    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Console-only logging for tests. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(default_directives(true)))
        .with_test_writer()
        .try_init();
}

/// `~/.local/state/snapmon/logs`, honouring `XDG_STATE_HOME`.
pub fn default_log_dir() -> Result<PathBuf> {
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
        .map(|state| state.join("snapmon").join("logs"))
        .ok_or_else(|| SnapmonError::internal("cannot determine a state directory for logs"))
}

/// Path of today's log file under the default directory, without the date
/// suffix the appender adds.
pub fn default_log_file() -> Result<PathBuf> {
    Ok(default_log_dir()?.join(LOG_FILE_NAME))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| SnapmonError::DirectoryCreation {
        path: dir.to_path_buf(),
        source,
    })
}

fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_default_log_dir_follows_xdg_state_home() {
        // SAFETY: serialized with the other tests touching the environment
        unsafe { std::env::set_var("XDG_STATE_HOME", "/tmp/snapmon-state") };
        let dir = default_log_dir().unwrap();
        // SAFETY: as above
        unsafe { std::env::remove_var("XDG_STATE_HOME") };

        if cfg!(target_os = "linux") {
            assert_eq!(dir, PathBuf::from("/tmp/snapmon-state/snapmon/logs"));
        }
        assert!(dir.ends_with("snapmon/logs"));
    }

    #[test]
    #[serial]
    fn test_default_log_file() {
        let file = default_log_file().unwrap();
        assert!(file.ends_with("snapmon/logs/snapmon.log"));
        assert_eq!(file.parent(), Some(default_log_dir().unwrap().as_path()));
    }

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(false),
            "snapmon=info,snapmon_core=info,snapmon_client=info,snapmon_monitor=info"
        );
        assert!(default_directives(true).split(',').all(|d| d.ends_with("=debug")));
    }

    #[test]
    fn test_ensure_dir_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"").unwrap();

        let err = ensure_dir(&blocker.join("logs")).unwrap_err();
        assert!(matches!(err, SnapmonError::DirectoryCreation { ref path, .. } if path.ends_with("logs")));
        assert!(ensure_dir(&tmp.path().join("a").join("b")).is_ok());
    }

    #[test]
    fn test_init_test_logging() {
        init_test_logging();
        init_test_logging();
    }
}
