//! Recording collaborators for tests.
//!
//! Clones share their log, so a test can keep one clone and hand the other
//! to the monitor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use snapmon_core::Snap;

use crate::view::{AppInfo, DesktopLookup, DialogHandle, DialogHost, LauncherSink, LauncherUpdate};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A call received by [`RecordingDialogHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum DialogCall {
    Create {
        handle: DialogHandle,
        snap: String,
        display_name: String,
        icon: Option<String>,
    },
    Progress {
        handle: DialogHandle,
        summary: String,
        done: usize,
        total: usize,
    },
    Retire {
        handle: DialogHandle,
    },
}

/// [`DialogHost`] that records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingDialogHost {
    calls: Arc<Mutex<Vec<DialogCall>>>,
}

impl RecordingDialogHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DialogCall> {
        lock(&self.calls).clone()
    }

    /// Snaps a dialog was created for, in order.
    pub fn created(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                DialogCall::Create { snap, .. } => Some(snap.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn retired(&self) -> Vec<DialogHandle> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                DialogCall::Retire { handle } => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<(DialogHandle, String, usize, usize)> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                DialogCall::Progress {
                    handle,
                    summary,
                    done,
                    total,
                } => Some((*handle, summary.clone(), *done, *total)),
                _ => None,
            })
            .collect()
    }
}

impl DialogHost for RecordingDialogHost {
    fn create_dialog(&mut self, handle: DialogHandle, snap: &str, app: &AppInfo) {
        lock(&self.calls).push(DialogCall::Create {
            handle,
            snap: snap.to_string(),
            display_name: app.display_name.clone(),
            icon: app.icon.clone(),
        });
    }

    fn push_progress(&mut self, handle: DialogHandle, summary: &str, done: usize, total: usize) {
        lock(&self.calls).push(DialogCall::Progress {
            handle,
            summary: summary.to_string(),
            done,
            total,
        });
    }

    fn retire_dialog(&mut self, handle: DialogHandle) {
        lock(&self.calls).push(DialogCall::Retire { handle });
    }
}

/// [`LauncherSink`] that records every update.
#[derive(Debug, Clone, Default)]
pub struct RecordingLauncher {
    updates: Arc<Mutex<Vec<(String, LauncherUpdate)>>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<(String, LauncherUpdate)> {
        lock(&self.updates).clone()
    }
}

impl LauncherSink for RecordingLauncher {
    fn emit_progress(&mut self, target: &str, update: LauncherUpdate) {
        lock(&self.updates).push((target.to_string(), update));
    }
}

/// [`DesktopLookup`] with fixed answers.
#[derive(Debug, Clone, Default)]
pub struct StaticDesktopLookup {
    targets: HashMap<String, Vec<String>>,
    apps: HashMap<String, AppInfo>,
}

impl StaticDesktopLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets<I, S>(mut self, snap: &str, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets
            .insert(snap.to_string(), targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_app_info(mut self, snap: &str, display_name: &str, icon: Option<&str>) -> Self {
        self.apps.insert(
            snap.to_string(),
            AppInfo {
                display_name: display_name.to_string(),
                icon: icon.map(str::to_string),
            },
        );
        self
    }
}

impl DesktopLookup for StaticDesktopLookup {
    fn launcher_targets(&self, snap: &str) -> Vec<String> {
        self.targets.get(snap).cloned().unwrap_or_default()
    }

    fn app_info(&self, snap: &Snap) -> Option<AppInfo> {
        self.apps.get(&snap.name).cloned()
    }
}
