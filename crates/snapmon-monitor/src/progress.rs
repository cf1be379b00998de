//! Per-snap launcher progress across running changes.
//!
//! Every change update runs one aggregation pass. Task counts are rebuilt
//! from the change's task list on each pass and reset after emitting, so
//! they always mirror the daemon's current view. An update is only sent
//! when the fraction moved, except that a terminal entry always emits.

use std::collections::HashMap;

use snapmon_core::Change;
use tracing::trace;

use crate::scheduler::ChangePhase;
use crate::view::{DesktopLookup, LauncherSink, LauncherUpdate};

/// Progress state of one snap.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    pub total_tasks: usize,
    pub done_tasks: usize,
    pub last_fraction: Option<f64>,
    /// Status of the last task seen for this snap in the current pass was terminal
    pub terminal: bool,
    /// Launcher entries captured when the entry was created
    pub targets: Vec<String>,
}

impl ProgressEntry {
    fn new(targets: Vec<String>) -> Self {
        Self {
            total_tasks: 0,
            done_tasks: 0,
            last_fraction: None,
            terminal: false,
            targets,
        }
    }
}

/// Aggregates task progress per snap and drives the launcher sink.
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    entries: HashMap<String, ProgressEntry>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one aggregation pass for `change`.
    pub fn update(
        &mut self,
        change: &Change,
        phase: ChangePhase,
        lookup: &dyn DesktopLookup,
        sink: &mut dyn LauncherSink,
    ) {
        let mut finished = Vec::new();

        for task in &change.tasks {
            let task_terminal = task.status.is_terminal();
            for snap in task.affected_snaps() {
                let entry = self
                    .entries
                    .entry(snap.clone())
                    .or_insert_with(|| ProgressEntry::new(lookup.launcher_targets(snap)));
                entry.total_tasks += 1;
                entry.terminal = task_terminal;
                if task_terminal {
                    entry.done_tasks += 1;
                }
                if phase.is_finished() {
                    finished.push(snap.clone());
                }
            }
        }

        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        for name in &names {
            if let Some(entry) = self.entries.get_mut(name) {
                Self::emit(name, entry, sink);
            }
        }

        for name in finished {
            self.entries.remove(&name);
        }
    }

    fn emit(name: &str, entry: &mut ProgressEntry, sink: &mut dyn LauncherSink) {
        if entry.total_tasks == 0 {
            return;
        }
        let fraction = entry.done_tasks as f64 / entry.total_tasks as f64;
        entry.done_tasks = 0;
        entry.total_tasks = 0;

        if entry.last_fraction == Some(fraction) && !entry.terminal {
            return;
        }
        entry.last_fraction = Some(fraction);

        let update = LauncherUpdate {
            progress: fraction,
            progress_visible: !entry.terminal,
            updating: !entry.terminal,
        };
        trace!(snap = name, progress = fraction, terminal = entry.terminal, "launcher progress");
        for target in &entry.targets {
            sink.emit_progress(target, update);
        }
    }

    pub fn get(&self, snap: &str) -> Option<&ProgressEntry> {
        self.entries.get(snap)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
