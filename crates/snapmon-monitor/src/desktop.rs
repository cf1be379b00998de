//! Desktop metadata read from the snapd desktop-file directory.
//!
//! snapd installs one `<snap>_<app>.desktop` file per graphical application
//! into `/var/lib/snapd/desktop/applications`. Launcher targets are those
//! file names; the dialog name and icon come from the `[Desktop Entry]`
//! group of the first application that has one.

use std::path::{Path, PathBuf};

use snapmon_core::{Snap, SnapmonError};
use tracing::debug;

use crate::view::{AppInfo, DesktopLookup};

/// [`DesktopLookup`] backed by the filesystem.
#[derive(Debug, Clone)]
pub struct FsDesktopLookup {
    dir: PathBuf,
}

impl FsDesktopLookup {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_entry(path: &Path) -> snapmon_core::Result<Option<AppInfo>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SnapmonError::io("reading desktop file", path, e))?;
        Ok(parse_desktop_entry(&content))
    }
}

impl DesktopLookup for FsDesktopLookup {
    fn launcher_targets(&self, snap: &str) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "desktop directory unavailable");
                return Vec::new();
            }
        };

        let prefix = format!("{}_", snap);
        let mut targets: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(&prefix) && name.ends_with(".desktop"))
            .collect();
        targets.sort();
        targets
    }

    fn app_info(&self, snap: &Snap) -> Option<AppInfo> {
        snap.apps
            .iter()
            .filter_map(|app| app.desktop_file.as_deref())
            .find_map(|path| match Self::read_entry(path) {
                Ok(info) => info,
                Err(e) => {
                    debug!(snap = %snap.name, error = %e, "skipping desktop file");
                    None
                }
            })
    }
}

/// Extract `Name` and `Icon` from the `[Desktop Entry]` group.
///
/// Returns `None` when the group has no `Name`.
pub fn parse_desktop_entry(content: &str) -> Option<AppInfo> {
    let mut in_entry = false;
    let mut name = None;
    let mut icon = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            in_entry = line == "[Desktop Entry]";
            continue;
        }
        if !in_entry {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "Name" if name.is_none() => name = Some(value.trim().to_string()),
                "Icon" if icon.is_none() => icon = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    name.filter(|n| !n.is_empty()).map(|display_name| AppInfo {
        display_name,
        icon: icon.filter(|i| !i.is_empty()),
    })
}
