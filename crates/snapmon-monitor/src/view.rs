//! Seams to the view layer.
//!
//! The monitor never owns UI objects. It hands out [`DialogHandle`]s and
//! talks to whatever renders them through [`DialogHost`], pushes launcher
//! progress through [`LauncherSink`], and asks [`DesktopLookup`] for desktop
//! metadata. All three are called from the monitor's event loop only.

use std::fmt;

use snapmon_core::Snap;
use tracing::info;

/// Opaque reference to a refresh dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DialogHandle(u64);

impl DialogHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DialogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dialog-{}", self.0)
    }
}

/// How a snap is presented in a dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub display_name: String,
    pub icon: Option<String>,
}

impl AppInfo {
    /// Presentation that only uses the raw snap name.
    pub fn fallback(snap_name: &str) -> Self {
        Self {
            display_name: snap_name.to_string(),
            icon: None,
        }
    }
}

/// Launcher progress payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LauncherUpdate {
    pub progress: f64,
    pub progress_visible: bool,
    pub updating: bool,
}

/// Renders refresh dialogs.
pub trait DialogHost: Send {
    /// Show a new dialog for `snap`.
    fn create_dialog(&mut self, handle: DialogHandle, snap: &str, app: &AppInfo);

    /// Update the progress shown in a dialog.
    fn push_progress(&mut self, handle: DialogHandle, summary: &str, done: usize, total: usize);

    /// Remove a dialog. Called at most once per handle.
    fn retire_dialog(&mut self, handle: DialogHandle);
}

/// Receives per-launcher progress.
pub trait LauncherSink: Send {
    fn emit_progress(&mut self, target: &str, update: LauncherUpdate);
}

/// Desktop metadata for snaps.
pub trait DesktopLookup: Send {
    /// Launcher entries (desktop file names) belonging to `snap`.
    fn launcher_targets(&self, snap: &str) -> Vec<String>;

    /// Display name and icon of the snap's first desktop application.
    fn app_info(&self, snap: &Snap) -> Option<AppInfo>;
}

/// [`DialogHost`] that only logs, for running headless.
#[derive(Debug, Default)]
pub struct LogDialogHost;

impl DialogHost for LogDialogHost {
    fn create_dialog(&mut self, handle: DialogHandle, snap: &str, app: &AppInfo) {
        info!(%handle, snap, display_name = %app.display_name, icon = ?app.icon, "refresh dialog opened");
    }

    fn push_progress(&mut self, handle: DialogHandle, summary: &str, done: usize, total: usize) {
        info!(%handle, summary, done, total, "refresh dialog progress");
    }

    fn retire_dialog(&mut self, handle: DialogHandle) {
        info!(%handle, "refresh dialog closed");
    }
}

/// [`LauncherSink`] that only logs.
#[derive(Debug, Default)]
pub struct LogLauncherSink;

impl LauncherSink for LogLauncherSink {
    fn emit_progress(&mut self, target: &str, update: LauncherUpdate) {
        info!(
            target_entry = target,
            progress = update.progress,
            visible = update.progress_visible,
            updating = update.updating,
            "launcher progress"
        );
    }
}
