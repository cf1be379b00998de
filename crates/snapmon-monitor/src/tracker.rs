//! The refresh-tracking state machine.
//!
//! [`RefreshTracker`] owns every store and reacts to one input at a time:
//! a notice, a query result, a poll timer or a user action. It never awaits.
//! Work that needs the daemon or a timer is returned as [`Request`]s, which
//! the event loop in [`crate::monitor`] carries out and feeds back.

use std::time::Duration;

use chrono::{DateTime, Utc};
use snapmon_client::ClientError;
use snapmon_core::types::ChangeId;
use snapmon_core::{Change, ForcedRefreshConfig, Notice, Snap};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

use crate::dialogs::DialogRegistry;
use crate::dispatcher::{self, NoticeRoute};
use crate::events::RefreshEvent;
use crate::inhibit;
use crate::progress::ProgressAggregator;
use crate::scheduler::{ChangePhase, ChangeScheduler};
use crate::store::SnapStore;
use crate::view::{DesktopLookup, DialogHandle, DialogHost, LauncherSink};

/// Why a snap is being queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapPurpose {
    /// To open its refresh dialog
    Dialog,
    /// To announce its completed refresh
    Completion,
}

/// Asynchronous work requested by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    FetchChange(ChangeId),
    ListInhibited,
    FetchSnap { name: String, purpose: SnapPurpose },
    /// Arm a one-shot poll timer; report it back with `attach_poll_timer`
    SchedulePoll { change_id: ChangeId, delay: Duration },
}

/// View-layer collaborators used by the tracker.
pub struct Ports {
    pub dialogs: Box<dyn DialogHost>,
    pub launcher: Box<dyn LauncherSink>,
    pub desktop: Box<dyn DesktopLookup>,
}

/// Tracker tunables.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    pub forced_refresh: ForcedRefreshConfig,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            forced_refresh: ForcedRefreshConfig::default(),
        }
    }
}

pub struct RefreshTracker {
    store: SnapStore,
    scheduler: ChangeScheduler,
    progress: ProgressAggregator,
    dialogs: DialogRegistry,
    launcher: Box<dyn LauncherSink>,
    desktop: Box<dyn DesktopLookup>,
    events: mpsc::UnboundedSender<RefreshEvent>,
    settings: TrackerSettings,
}

impl RefreshTracker {
    pub fn new(
        ports: Ports,
        events: mpsc::UnboundedSender<RefreshEvent>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            store: SnapStore::new(),
            scheduler: ChangeScheduler::new(),
            progress: ProgressAggregator::new(),
            dialogs: DialogRegistry::new(ports.dialogs),
            launcher: ports.launcher,
            desktop: ports.desktop,
            events,
            settings,
        }
    }

    /// A notice arrived from the subscription.
    pub fn on_notice(&mut self, notice: &Notice, first_run: bool) -> Vec<Request> {
        match dispatcher::route(notice, first_run) {
            NoticeRoute::FetchChange(change_id) => {
                debug!(change_id = %change_id, kind = ?notice.kind(), "change updated");
                vec![Request::FetchChange(change_id)]
            }
            NoticeRoute::QueryInhibited => vec![Request::ListInhibited],
            NoticeRoute::Skip(reason) => {
                trace!(notice_id = %notice.id, notice_type = %notice.notice_type, ?reason, "notice skipped");
                Vec::new()
            }
        }
    }

    /// A change fetch resolved.
    ///
    /// A transient failure only drops this poll cycle: the change is polled
    /// again after the usual interval. Other failures stop tracking it.
    pub fn on_change_fetched(
        &mut self,
        change_id: &str,
        result: Result<Change, ClientError>,
    ) -> Vec<Request> {
        let change = match result {
            Ok(change) => change,
            Err(e) if e.is_cancelled() => return Vec::new(),
            Err(e) if e.is_retryable() => {
                warn!(change_id, error = %e, "failed to fetch change, polling again");
                return self.schedule_poll(change_id).into_iter().collect();
            }
            Err(e) => {
                warn!(change_id, error = %e, "failed to fetch change");
                return Vec::new();
            }
        };

        let Some(phase) = ChangePhase::classify(&change.status) else {
            debug!(change_id = %change.id, status = %change.status, "unexpected change status");
            return Vec::new();
        };
        trace!(change_id = %change.id, kind = %change.kind, ?phase, "change update");

        let mut requests = Vec::new();
        if change.is_auto_refresh() {
            requests.extend(inhibit::reconcile(
                &change,
                phase,
                &mut self.store,
                &mut self.dialogs,
            ));
        }
        self.progress
            .update(&change, phase, self.desktop.as_ref(), self.launcher.as_mut());

        if phase.is_finished() {
            self.scheduler.retire(&change.id);
        } else {
            requests.extend(self.schedule_poll(&change.id));
        }
        requests
    }

    fn schedule_poll(&mut self, change_id: &str) -> Option<Request> {
        self.scheduler.arm(change_id).then(|| Request::SchedulePoll {
            change_id: change_id.to_string(),
            delay: self.settings.poll_interval,
        })
    }

    /// The refresh-inhibited snap list resolved.
    pub fn on_inhibited_snaps(&mut self, result: Result<Vec<Snap>, ClientError>, now: DateTime<Utc>) {
        let snaps = match result {
            Ok(snaps) => snaps,
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                warn!(error = %e, "failed to list refresh-inhibited snaps");
                return;
            }
        };

        for event in inhibit::handle_inhibited(
            snaps,
            &mut self.store,
            now,
            &self.settings.forced_refresh,
        ) {
            self.emit(event);
        }
    }

    /// A snap query resolved.
    pub fn on_snap_fetched(&mut self, name: &str, purpose: SnapPurpose, result: Result<Snap, ClientError>) {
        match purpose {
            SnapPurpose::Dialog => {
                inhibit::bind_dialog(
                    name,
                    result,
                    &mut self.store,
                    &mut self.dialogs,
                    self.desktop.as_ref(),
                );
            }
            SnapPurpose::Completion => match result {
                Ok(snap) => self.emit(RefreshEvent::completed(snap)),
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    debug!(snap = name, error = %e, "snap query failed, announcing by name");
                    self.emit(RefreshEvent::completed_fallback(name));
                }
            },
        }
    }

    /// The poll timer for `change_id` fired.
    pub fn on_poll_due(&mut self, change_id: &str) -> Vec<Request> {
        if self.scheduler.take_due(change_id) {
            vec![Request::FetchChange(change_id.to_string())]
        } else {
            Vec::new()
        }
    }

    /// Hand over the timer armed for a [`Request::SchedulePoll`].
    pub fn attach_poll_timer(&mut self, change_id: &str, timer: AbortHandle) {
        self.scheduler.attach(change_id, timer);
    }

    /// The user asked not to be prompted about `name` again.
    pub fn ignore_snap(&mut self, name: &str) {
        info!(snap = name, "ignoring refreshes");
        self.store.get_or_create(name).ignored = true;
    }

    /// Suppress dialog feedback for `name`, closing any open dialog.
    pub fn hide_snap(&mut self, name: &str) {
        let record = self.store.get_or_create(name);
        record.hidden = true;
        if let Some(handle) = record.dialog.take() {
            self.dialogs.retire(handle);
        }
    }

    /// The view layer reports the user closed a dialog.
    pub fn dialog_dismissed(&mut self, handle: DialogHandle) {
        match self.store.find_by_dialog(handle) {
            Some(record) => {
                debug!(snap = %record.name, %handle, "dialog dismissed");
                record.manually_hidden = true;
                record.dialog = None;
            }
            None => trace!(%handle, "dismissed dialog is not bound"),
        }
        self.dialogs.retire(handle);
    }

    /// Drop all state: cancel poll timers and close every dialog.
    pub fn teardown(&mut self) {
        self.scheduler.cancel_all();
        for handle in self.store.drain_dialogs() {
            self.dialogs.retire(handle);
        }
        self.dialogs.retire_all();
        self.progress.clear();
    }

    fn emit(&self, event: RefreshEvent) {
        debug!(event = event.name(), snap = ?event.snap_name(), "refresh event");
        if self.events.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }

    pub fn store(&self) -> &SnapStore {
        &self.store
    }

    pub fn scheduler(&self) -> &ChangeScheduler {
        &self.scheduler
    }

    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    pub fn dialogs(&self) -> &DialogRegistry {
        &self.dialogs
    }
}
