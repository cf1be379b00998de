//! Inhibited-snap handling: the grouped prompt, dialog lifecycle and
//! dialog progress.
//!
//! Dialogs are only shown for snaps that were reported as refresh-inhibited
//! earlier, i.e. snaps the user was already prompted about.

use chrono::{DateTime, Utc};
use snapmon_client::ClientError;
use snapmon_core::{Change, ForcedRefreshConfig, Snap, Status};
use tracing::debug;

use crate::dialogs::DialogRegistry;
use crate::events::RefreshEvent;
use crate::forced::check_forced_refresh;
use crate::scheduler::ChangePhase;
use crate::store::SnapStore;
use crate::tracker::{Request, SnapPurpose};
use crate::view::{AppInfo, DesktopLookup, DialogHandle};

/// Dialog progress derived from a change's task list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress<'a> {
    /// Summary of the first task in `Doing`
    pub summary: &'a str,
    pub done: usize,
    pub total: usize,
}

/// Count terminal tasks and find the running one.
///
/// Returns `None` when no task is currently `Doing`.
pub fn task_progress(change: &Change) -> Option<TaskProgress<'_>> {
    let done = change
        .tasks
        .iter()
        .filter(|task| task.status.is_terminal())
        .count();
    change
        .tasks
        .iter()
        .find(|task| task.status == Status::Doing)
        .map(|task| TaskProgress {
            summary: &task.summary,
            done,
            total: change.tasks.len(),
        })
}

/// Bring dialogs in line with an auto-refresh change.
pub fn reconcile(
    change: &Change,
    phase: ChangePhase,
    store: &mut SnapStore,
    dialogs: &mut DialogRegistry,
) -> Vec<Request> {
    let mut requests = Vec::new();
    let Some(names) = change.snap_names() else {
        return requests;
    };

    for name in names {
        let Some(record) = store.get_mut(name) else {
            continue;
        };
        if !record.inhibited {
            continue;
        }

        if phase.is_finished() {
            if let Some(handle) = record.dialog.take() {
                dialogs.retire(handle);
            }
            store.remove(name);
            if phase.is_done() {
                requests.push(Request::FetchSnap {
                    name: name.clone(),
                    purpose: SnapPurpose::Completion,
                });
            }
            debug!(snap = %name, ?phase, "inhibited snap finished refreshing");
            continue;
        }

        if record.is_suppressed() {
            continue;
        }

        match record.dialog {
            None => {
                // Keeps further inhibit prompts quiet while the dialog is up
                record.ignored = true;
                requests.push(Request::FetchSnap {
                    name: name.clone(),
                    purpose: SnapPurpose::Dialog,
                });
            }
            Some(handle) => {
                if let Some(progress) = task_progress(change) {
                    dialogs.push_progress(handle, progress.summary, progress.done, progress.total);
                }
            }
        }
    }

    requests
}

/// Open and bind a dialog once the snap query for it resolved.
///
/// Query failures fall back to the raw snap name. Nothing is created if the
/// snap was retired, suppressed or already got a dialog while the query was
/// in flight.
pub fn bind_dialog(
    name: &str,
    result: Result<Snap, ClientError>,
    store: &mut SnapStore,
    dialogs: &mut DialogRegistry,
    lookup: &dyn DesktopLookup,
) -> Option<DialogHandle> {
    let app = match result {
        Ok(snap) => lookup
            .app_info(&snap)
            .unwrap_or_else(|| AppInfo::fallback(name)),
        Err(e) if e.is_cancelled() => return None,
        Err(e) => {
            debug!(snap = name, error = %e, "snap query failed, using raw name");
            AppInfo::fallback(name)
        }
    };

    let Some(record) = store.get_mut(name) else {
        debug!(snap = name, "snap retired before its dialog opened");
        return None;
    };
    if !record.inhibited || record.is_suppressed() || record.dialog.is_some() {
        debug!(snap = name, "dialog not needed anymore");
        return None;
    }

    let handle = dialogs.open(name, &app);
    record.dialog = Some(handle);
    Some(handle)
}

/// Record the snaps the daemon reports as refresh-inhibited.
///
/// Returns the events to publish: forced-refresh warnings, then the grouped
/// prompt if at least one listed snap is not ignored.
pub fn handle_inhibited(
    snaps: Vec<Snap>,
    store: &mut SnapStore,
    now: DateTime<Utc>,
    config: &ForcedRefreshConfig,
) -> Vec<RefreshEvent> {
    let mut events = Vec::new();
    let mut listed = Vec::new();
    let mut prompt = false;

    for snap in snaps {
        if snap.name.is_empty() {
            continue;
        }
        debug!(snap = %snap.name, "refresh inhibited");

        let record = store.get_or_create(&snap.name);
        record.inhibited = true;
        if !record.ignored {
            prompt = true;
        }
        if let Some(event) = check_forced_refresh(&snap, record.ignored, now, config) {
            events.push(event);
        }
        listed.push(snap);
    }

    if prompt {
        events.push(RefreshEvent::PendingRefresh { snaps: listed });
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingDialogHost, StaticDesktopLookup};
    use snapmon_core::Task;

    fn inhibited_store(names: &[&str]) -> SnapStore {
        let mut store = SnapStore::new();
        for name in names {
            store.get_or_create(name).inhibited = true;
        }
        store
    }

    fn auto_refresh(status: &str, snap: &str) -> Change {
        Change::new("5", "auto-refresh", status)
            .with_snap_names([snap])
            .with_task(Task::new("1", "Download", "Done").with_affected_snaps([snap]))
            .with_task(Task::new("2", "Stop apps", "Doing").with_affected_snaps([snap]))
            .with_task(Task::new("3", "Link", "Do").with_affected_snaps([snap]))
    }

    #[test]
    fn test_task_progress() {
        let change = auto_refresh("Doing", "p");
        let progress = task_progress(&change).unwrap();
        assert_eq!(progress.summary, "Stop apps");
        assert_eq!(progress.done, 1);
        assert_eq!(progress.total, 3);

        let idle = Change::new("5", "auto-refresh", "Doing").with_task(Task::new("1", "x", "Do"));
        assert!(task_progress(&idle).is_none());
    }

    #[test]
    fn test_first_update_requests_dialog_and_ignores() {
        let mut store = inhibited_store(&["p"]);
        let mut dialogs = DialogRegistry::new(Box::new(RecordingDialogHost::new()));

        let requests = reconcile(&auto_refresh("Doing", "p"), ChangePhase::Running, &mut store, &mut dialogs);
        assert_eq!(
            requests,
            vec![Request::FetchSnap {
                name: "p".into(),
                purpose: SnapPurpose::Dialog
            }]
        );
        assert!(store.get("p").unwrap().ignored);
    }

    #[test]
    fn test_unknown_and_uninhibited_snaps_are_skipped() {
        let mut store = SnapStore::new();
        store.get_or_create("q");
        let mut dialogs = DialogRegistry::new(Box::new(RecordingDialogHost::new()));

        assert!(reconcile(&auto_refresh("Doing", "p"), ChangePhase::Running, &mut store, &mut dialogs).is_empty());
        assert!(reconcile(&auto_refresh("Doing", "q"), ChangePhase::Running, &mut store, &mut dialogs).is_empty());
        assert!(!store.get("q").unwrap().ignored);
    }

    #[test]
    fn test_bound_dialog_gets_progress() {
        let host = RecordingDialogHost::new();
        let mut store = inhibited_store(&["p"]);
        let mut dialogs = DialogRegistry::new(Box::new(host.clone()));
        let handle = bind_dialog("p", Ok(Snap::new("p")), &mut store, &mut dialogs, &StaticDesktopLookup::new()).unwrap();

        let requests = reconcile(&auto_refresh("Doing", "p"), ChangePhase::Running, &mut store, &mut dialogs);
        assert!(requests.is_empty());
        assert_eq!(host.progress(), vec![(handle, "Stop apps".to_string(), 1, 3)]);
    }

    #[test]
    fn test_suppressed_snaps_get_nothing() {
        let mut store = inhibited_store(&["p"]);
        store.get_mut("p").unwrap().manually_hidden = true;
        let mut dialogs = DialogRegistry::new(Box::new(RecordingDialogHost::new()));

        assert!(reconcile(&auto_refresh("Doing", "p"), ChangePhase::Running, &mut store, &mut dialogs).is_empty());
        assert!(!store.get("p").unwrap().ignored);
    }

    #[test]
    fn test_done_retires_and_requests_completion() {
        let host = RecordingDialogHost::new();
        let mut store = inhibited_store(&["p"]);
        let mut dialogs = DialogRegistry::new(Box::new(host.clone()));
        let handle = bind_dialog("p", Err(ClientError::api(404, "nope")), &mut store, &mut dialogs, &StaticDesktopLookup::new()).unwrap();

        let requests = reconcile(&auto_refresh("Done", "p"), ChangePhase::Done, &mut store, &mut dialogs);
        assert_eq!(
            requests,
            vec![Request::FetchSnap {
                name: "p".into(),
                purpose: SnapPurpose::Completion
            }]
        );
        assert!(!store.contains("p"));
        assert_eq!(host.retired(), vec![handle]);
    }

    #[test]
    fn test_cancelled_retires_without_completion() {
        let mut store = inhibited_store(&["p"]);
        let mut dialogs = DialogRegistry::new(Box::new(RecordingDialogHost::new()));

        let requests = reconcile(&auto_refresh("Undoing", "p"), ChangePhase::Cancelled, &mut store, &mut dialogs);
        assert!(requests.is_empty());
        assert!(!store.contains("p"));
    }

    #[test]
    fn test_bind_dialog_uses_desktop_metadata() {
        let host = RecordingDialogHost::new();
        let mut store = inhibited_store(&["firefox"]);
        let mut dialogs = DialogRegistry::new(Box::new(host.clone()));
        let lookup = StaticDesktopLookup::new().with_app_info("firefox", "Firefox Web Browser", Some("firefox.png"));

        bind_dialog("firefox", Ok(Snap::new("firefox")), &mut store, &mut dialogs, &lookup).unwrap();
        match &host.calls()[0] {
            crate::testing::DialogCall::Create { display_name, icon, .. } => {
                assert_eq!(display_name, "Firefox Web Browser");
                assert_eq!(icon.as_deref(), Some("firefox.png"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_second_bind_is_noop() {
        let host = RecordingDialogHost::new();
        let mut store = inhibited_store(&["p"]);
        let mut dialogs = DialogRegistry::new(Box::new(host.clone()));
        let lookup = StaticDesktopLookup::new();

        let first = bind_dialog("p", Ok(Snap::new("p")), &mut store, &mut dialogs, &lookup);
        let second = bind_dialog("p", Ok(Snap::new("p")), &mut store, &mut dialogs, &lookup);
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(host.created().len(), 1);
        assert_eq!(store.get("p").unwrap().dialog, first);
    }

    #[test]
    fn test_bind_after_retirement_does_not_leak() {
        let host = RecordingDialogHost::new();
        let mut store = SnapStore::new();
        let mut dialogs = DialogRegistry::new(Box::new(host.clone()));

        assert!(bind_dialog("p", Ok(Snap::new("p")), &mut store, &mut dialogs, &StaticDesktopLookup::new()).is_none());
        assert!(bind_dialog("q", Err(ClientError::Cancelled), &mut store, &mut dialogs, &StaticDesktopLookup::new()).is_none());
        assert!(host.created().is_empty());
        assert!(!store.contains("p"));
    }

    #[test]
    fn test_grouped_prompt_includes_ignored_snaps() {
        let mut store = SnapStore::new();
        store.get_or_create("b").ignored = true;

        let events = handle_inhibited(
            vec![Snap::new("a"), Snap::new("b")],
            &mut store,
            Utc::now(),
            &ForcedRefreshConfig::default(),
        );
        assert_eq!(
            events,
            vec![RefreshEvent::PendingRefresh {
                snaps: vec![Snap::new("a"), Snap::new("b")]
            }]
        );
        assert!(store.get("a").unwrap().inhibited);
        assert!(store.get("b").unwrap().inhibited);
    }

    #[test]
    fn test_no_prompt_when_all_ignored() {
        let mut store = SnapStore::new();
        store.get_or_create("a").ignored = true;
        store.get_or_create("b").ignored = true;

        let events = handle_inhibited(
            vec![Snap::new("a"), Snap::new("b")],
            &mut store,
            Utc::now(),
            &ForcedRefreshConfig::default(),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_forced_warning_precedes_prompt() {
        let now = Utc::now();
        let mut store = SnapStore::new();
        let snap = Snap::new("a").with_proceed_time(now + chrono::Duration::seconds(120));

        let events = handle_inhibited(vec![snap, Snap::new("")], &mut store, now, &ForcedRefreshConfig::default());
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            RefreshEvent::PendingRefreshForced { warning_tier: true, .. }
        ));
        assert!(matches!(&events[1], RefreshEvent::PendingRefresh { snaps } if snaps.len() == 1));
        assert_eq!(store.len(), 1);
    }
}
