//! Dialog handle allocation and retirement.

use std::collections::HashSet;

use tracing::debug;

use crate::view::{AppInfo, DialogHandle, DialogHost};

/// Tracks which dialogs are live and forwards calls to the [`DialogHost`].
///
/// Retiring is idempotent: the host sees `retire_dialog` at most once per
/// handle, and progress for a retired handle is dropped.
pub struct DialogRegistry {
    host: Box<dyn DialogHost>,
    next_id: u64,
    live: HashSet<DialogHandle>,
}

impl DialogRegistry {
    pub fn new(host: Box<dyn DialogHost>) -> Self {
        Self {
            host,
            next_id: 1,
            live: HashSet::new(),
        }
    }

    /// Create a dialog for `snap` and return its handle.
    pub fn open(&mut self, snap: &str, app: &AppInfo) -> DialogHandle {
        let handle = DialogHandle::new(self.next_id);
        self.next_id += 1;
        self.live.insert(handle);
        self.host.create_dialog(handle, snap, app);
        debug!(%handle, snap, "dialog opened");
        handle
    }

    pub fn push_progress(&mut self, handle: DialogHandle, summary: &str, done: usize, total: usize) {
        if self.live.contains(&handle) {
            self.host.push_progress(handle, summary, done, total);
        }
    }

    /// Retire a dialog. Returns false if it was already retired.
    pub fn retire(&mut self, handle: DialogHandle) -> bool {
        if !self.live.remove(&handle) {
            return false;
        }
        self.host.retire_dialog(handle);
        debug!(%handle, "dialog retired");
        true
    }

    /// Retire every live dialog.
    pub fn retire_all(&mut self) {
        let mut handles: Vec<DialogHandle> = self.live.iter().copied().collect();
        handles.sort();
        for handle in handles {
            self.retire(handle);
        }
    }

    pub fn is_live(&self, handle: DialogHandle) -> bool {
        self.live.contains(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
