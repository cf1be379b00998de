//! Monitor configuration.
//!
//! Loaded from `~/.config/snapmon/config.yaml` (or an explicit path). Every
//! field has a default, so a missing file or a partial file is fine. When no
//! socket is configured, [`MonitorConfig::load`] picks one from `SNAP_NAME`;
//! `Default` itself never looks at the environment.
//!
//! ```yaml
//! daemon:
//!   socket_path: /run/snapd.socket
//!   request_timeout_secs: 30
//! poll_interval_ms: 500
//! reconnect_delay_ms: 1000
//! forced_refresh:
//!   notice_threshold_secs: 86400
//!   alert_threshold_secs: 3600
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SnapmonError};

/// Socket used by processes running outside a snap.
pub const SNAPD_SOCKET: &str = "/run/snapd.socket";

/// Socket used by processes running confined inside a snap.
pub const SNAPD_SNAP_SOCKET: &str = "/run/snapd-snap.socket";

/// Directory where snapd installs the desktop files of snap applications.
pub const DEFAULT_DESKTOP_DIR: &str = "/var/lib/snapd/desktop/applications";

/// Pick the daemon socket for the given `SNAP_NAME` value.
pub fn resolve_socket_path(snap_name: Option<&str>) -> PathBuf {
    match snap_name {
        Some(name) if !name.is_empty() => PathBuf::from(SNAPD_SNAP_SOCKET),
        _ => PathBuf::from(SNAPD_SOCKET),
    }
}

/// Default config file location (`~/.config/snapmon/config.yaml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("snapmon").join("config.yaml"))
}

/// Top-level monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// How to reach the daemon
    pub daemon: DaemonConfig,

    /// Delay between polls of an in-flight change
    pub poll_interval_ms: u64,

    /// Delay before re-subscribing after a notice stream failure
    pub reconnect_delay_ms: u64,

    /// Where launcher desktop files live
    pub desktop_dir: PathBuf,

    /// Forced-refresh warning thresholds
    pub forced_refresh: ForcedRefreshConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            poll_interval_ms: 500,
            reconnect_delay_ms: 1000,
            desktop_dir: PathBuf::from(DEFAULT_DESKTOP_DIR),
            forced_refresh: ForcedRefreshConfig::default(),
        }
    }
}

/// Daemon connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Unix socket of the daemon REST API; unset until resolved at load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    /// Plain HTTP base URL; when set the socket is not used
    pub base_url: Option<String>,

    /// Timeout for ordinary requests
    pub request_timeout_secs: u64,

    /// Server-side wait of each notices long poll
    pub notices_timeout_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            base_url: None,
            request_timeout_secs: 30,
            notices_timeout_secs: 60,
        }
    }
}

impl DaemonConfig {
    /// The socket to connect to, falling back to the system socket.
    pub fn socket(&self) -> &Path {
        self.socket_path.as_deref().unwrap_or(Path::new(SNAPD_SOCKET))
    }

    /// Pick the socket for `snap_name` unless one is configured already.
    pub fn resolve_socket(&mut self, snap_name: Option<&str>) {
        if self.socket_path.is_none() {
            self.socket_path = Some(resolve_socket_path(snap_name));
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn notices_timeout(&self) -> Duration {
        Duration::from_secs(self.notices_timeout_secs)
    }
}

/// When to warn that the daemon is about to refresh a running snap anyway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForcedRefreshConfig {
    /// Remaining time below which a non-ignored snap gets a warning
    pub notice_threshold_secs: i64,

    /// Remaining time below which every snap gets an alert
    pub alert_threshold_secs: i64,
}

impl Default for ForcedRefreshConfig {
    fn default() -> Self {
        Self {
            notice_threshold_secs: 24 * 60 * 60,
            alert_threshold_secs: 60 * 60,
        }
    }
}

impl MonitorConfig {
    /// Load configuration and resolve the daemon socket from `SNAP_NAME`.
    ///
    /// With an explicit path the file must exist. Without one the default
    /// location is tried and defaults are used when it is absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => {
                    debug!("no config file, using defaults");
                    Self::default()
                }
            },
        };
        config
            .daemon
            .resolve_socket(std::env::var("SNAP_NAME").ok().as_deref());
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SnapmonError::config_not_found_with_source(path, e)
            } else {
                SnapmonError::io("reading config", path, e)
            }
        })?;

        let config = Self::parse(&content).map_err(|e| SnapmonError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Check the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(SnapmonError::config_validation("poll_interval_ms must be > 0"));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(SnapmonError::config_validation("reconnect_delay_ms must be > 0"));
        }
        if self.daemon.request_timeout_secs == 0 {
            return Err(SnapmonError::config_validation(
                "daemon.request_timeout_secs must be > 0",
            ));
        }
        if self.forced_refresh.alert_threshold_secs > self.forced_refresh.notice_threshold_secs {
            return Err(SnapmonError::config_validation(format!(
                "forced_refresh.alert_threshold_secs ({}) must not exceed notice_threshold_secs ({})",
                self.forced_refresh.alert_threshold_secs, self.forced_refresh.notice_threshold_secs
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Use a different daemon socket.
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.daemon.socket_path = Some(path.into());
        self
    }

    /// Talk plain HTTP to `url` instead of the socket.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.daemon.base_url = Some(url.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_desktop_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.desktop_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.reconnect_delay(), Duration::from_millis(1000));
        assert_eq!(config.forced_refresh.notice_threshold_secs, 86_400);
        assert_eq!(config.forced_refresh.alert_threshold_secs, 3_600);
        assert_eq!(config.desktop_dir, PathBuf::from(DEFAULT_DESKTOP_DIR));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_socket_path() {
        assert_eq!(resolve_socket_path(None), PathBuf::from(SNAPD_SOCKET));
        assert_eq!(resolve_socket_path(Some("")), PathBuf::from(SNAPD_SOCKET));
        assert_eq!(
            resolve_socket_path(Some("snapd-desktop-integration")),
            PathBuf::from(SNAPD_SNAP_SOCKET)
        );
    }

    #[test]
    #[serial]
    fn test_default_ignores_environment() {
        // SAFETY: serialized with the other tests touching the environment
        unsafe { std::env::set_var("SNAP_NAME", "snapmon") };
        let config = MonitorConfig::parse("poll_interval_ms: 100").unwrap();
        assert_eq!(config.daemon.socket_path, None);
        assert_eq!(MonitorConfig::default().daemon.socket(), Path::new(SNAPD_SOCKET));

        // SAFETY: as above
        unsafe { std::env::remove_var("SNAP_NAME") };
    }

    #[test]
    #[serial]
    fn test_load_resolves_socket_from_environment() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms: 100").unwrap();

        // SAFETY: serialized with the other tests touching the environment
        unsafe { std::env::set_var("SNAP_NAME", "snapmon") };
        let confined = MonitorConfig::load(Some(file.path())).unwrap();

        // SAFETY: as above
        unsafe { std::env::remove_var("SNAP_NAME") };
        let unconfined = MonitorConfig::load(Some(file.path())).unwrap();

        assert_eq!(confined.daemon.socket(), Path::new(SNAPD_SNAP_SOCKET));
        assert_eq!(unconfined.daemon.socket(), Path::new(SNAPD_SOCKET));
    }

    #[test]
    #[serial]
    fn test_configured_socket_wins_over_environment() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "daemon:\n  socket_path: /tmp/custom.socket").unwrap();

        // SAFETY: serialized with the other tests touching the environment
        unsafe { std::env::set_var("SNAP_NAME", "snapmon") };
        let config = MonitorConfig::load(Some(file.path())).unwrap();
        // SAFETY: as above
        unsafe { std::env::remove_var("SNAP_NAME") };

        assert_eq!(config.daemon.socket(), Path::new("/tmp/custom.socket"));
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
poll_interval_ms: 250
daemon:
  socket_path: /tmp/snapd.socket
forced_refresh:
  alert_threshold_secs: 600
"#;
        let config = MonitorConfig::parse(yaml).unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.daemon.socket(), Path::new("/tmp/snapd.socket"));
        assert_eq!(config.daemon.request_timeout_secs, 30);
        assert_eq!(config.forced_refresh.alert_threshold_secs, 600);
        assert_eq!(config.forced_refresh.notice_threshold_secs, 86_400);
        assert_eq!(config.reconnect_delay_ms, 1000);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(
            MonitorConfig::parse("").unwrap().poll_interval_ms,
            MonitorConfig::default().poll_interval_ms
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "reconnect_delay_ms: 2500").unwrap();

        let config = MonitorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.reconnect_delay(), Duration::from_millis(2500));
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = MonitorConfig::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, SnapmonError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms: [not, a, number]").unwrap();

        let err = MonitorConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, SnapmonError::ConfigInvalid { .. }));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = MonitorConfig::default().with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = MonitorConfig::default().with_reconnect_delay(Duration::ZERO);
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.forced_refresh.alert_threshold_secs = 100_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("alert_threshold_secs"));
    }

    #[test]
    fn test_builders() {
        let config = MonitorConfig::default()
            .with_socket_path("/tmp/s.sock")
            .with_base_url("http://127.0.0.1:9999")
            .with_desktop_dir("/tmp/apps");
        assert_eq!(config.daemon.socket(), Path::new("/tmp/s.sock"));
        assert_eq!(config.daemon.base_url.as_deref(), Some("http://127.0.0.1:9999"));
        assert_eq!(config.desktop_dir, PathBuf::from("/tmp/apps"));
    }
}
