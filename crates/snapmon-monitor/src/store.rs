//! Per-snap tracked state.

use std::collections::HashMap;

use crate::view::DialogHandle;

/// State kept for one snap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapRecord {
    pub name: String,
    /// A refresh is held back by running apps
    pub inhibited: bool,
    /// The user asked not to be prompted for this snap
    pub ignored: bool,
    /// Feedback suppressed by the application
    pub hidden: bool,
    /// The user closed the refresh dialog
    pub manually_hidden: bool,
    /// Dialog currently bound to this snap, if any
    pub dialog: Option<DialogHandle>,
}

impl SnapRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether dialog feedback is suppressed for this snap.
    pub fn is_suppressed(&self) -> bool {
        self.hidden || self.manually_hidden
    }
}

/// Map from snap name to [`SnapRecord`].
#[derive(Debug, Default)]
pub struct SnapStore {
    records: HashMap<String, SnapRecord>,
}

impl SnapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&SnapRecord> {
        self.records.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SnapRecord> {
        self.records.get_mut(name)
    }

    /// Get the record for `name`, creating it if needed.
    pub fn get_or_create(&mut self, name: &str) -> &mut SnapRecord {
        self.records
            .entry(name.to_string())
            .or_insert_with(|| SnapRecord::new(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<SnapRecord> {
        self.records.remove(name)
    }

    /// Find the record a dialog is bound to.
    pub fn find_by_dialog(&mut self, handle: DialogHandle) -> Option<&mut SnapRecord> {
        self.records
            .values_mut()
            .find(|record| record.dialog == Some(handle))
    }

    /// Remove every record, returning the dialogs that were bound.
    pub fn drain_dialogs(&mut self) -> Vec<DialogHandle> {
        self.records
            .drain()
            .filter_map(|(_, record)| record.dialog)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
