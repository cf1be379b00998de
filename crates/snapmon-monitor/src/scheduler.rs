//! Deduplicated polling of in-flight changes.
//!
//! A change id is pending while a poll timer for it is armed. Arming an id
//! that is already pending does nothing, so bursts of notices for the same
//! change never stack timers. When the timer fires the id is taken out of
//! the pending set before the change is re-fetched, which lets the fetch
//! result arm the next poll.

use std::collections::HashMap;

use snapmon_core::Status;
use snapmon_core::types::ChangeId;
use tokio::task::AbortHandle;
use tracing::trace;

/// Where a change stands, derived from its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangePhase {
    /// `Do` or `Doing`
    Running,
    /// `Done`
    Done,
    /// `Undo`, `Undoing`, `Undone` or `Error`
    Cancelled,
}

impl ChangePhase {
    /// Classify a change status; `None` for statuses a refresh should not be in.
    pub fn classify(status: &Status) -> Option<Self> {
        if *status == Status::Done {
            Some(Self::Done)
        } else if status.is_cancelled() {
            Some(Self::Cancelled)
        } else if status.is_working() {
            Some(Self::Running)
        } else {
            None
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The change will not be polled again.
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Set of changes with an armed poll timer.
#[derive(Debug, Default)]
pub struct ChangeScheduler {
    pending: HashMap<ChangeId, Option<AbortHandle>>,
}

impl ChangeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as pending. Returns false if a poll is already armed.
    pub fn arm(&mut self, id: &str) -> bool {
        if self.pending.contains_key(id) {
            trace!(change_id = id, "poll already pending");
            return false;
        }
        self.pending.insert(id.to_string(), None);
        true
    }

    /// Attach the timer backing the pending poll for `id`.
    pub fn attach(&mut self, id: &str, timer: AbortHandle) {
        match self.pending.get_mut(id) {
            Some(slot) => {
                if let Some(old) = slot.replace(timer) {
                    old.abort();
                }
            }
            None => timer.abort(),
        }
    }

    /// The poll timer for `id` fired. Returns false if the poll was retired
    /// in the meantime.
    pub fn take_due(&mut self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Stop polling `id`, cancelling its timer.
    pub fn retire(&mut self, id: &str) {
        if let Some(Some(timer)) = self.pending.remove(id) {
            timer.abort();
        }
    }

    /// Cancel every timer.
    pub fn cancel_all(&mut self) {
        for (_, timer) in self.pending.drain() {
            if let Some(timer) = timer {
                timer.abort();
            }
        }
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classify() {
        assert_eq!(ChangePhase::classify(&Status::Done), Some(ChangePhase::Done));
        assert_eq!(ChangePhase::classify(&Status::Doing), Some(ChangePhase::Running));
        assert_eq!(ChangePhase::classify(&Status::Do), Some(ChangePhase::Running));
        for cancelled in [Status::Undo, Status::Undoing, Status::Undone, Status::Error] {
            assert_eq!(ChangePhase::classify(&cancelled), Some(ChangePhase::Cancelled));
        }
        for unexpected in [Status::Hold, Status::Wait, Status::Abort, Status::Default] {
            assert_eq!(ChangePhase::classify(&unexpected), None);
        }
        assert_eq!(ChangePhase::classify(&Status::from("Exploding")), None);
    }

    #[test]
    fn test_arm_deduplicates() {
        let mut scheduler = ChangeScheduler::new();
        assert!(scheduler.arm("42"));
        assert!(!scheduler.arm("42"));
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn test_take_due_allows_rearm() {
        let mut scheduler = ChangeScheduler::new();
        scheduler.arm("42");
        assert!(scheduler.take_due("42"));
        assert!(!scheduler.take_due("42"));
        assert!(scheduler.arm("42"));
    }

    #[tokio::test]
    async fn test_retire_aborts_timer() {
        let mut scheduler = ChangeScheduler::new();
        scheduler.arm("42");
        let timer = tokio::spawn(tokio::time::sleep(Duration::from_secs(60)));
        scheduler.attach("42", timer.abort_handle());

        scheduler.retire("42");
        assert!(!scheduler.is_pending("42"));
        assert!(timer.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_attach_after_retire_aborts() {
        let mut scheduler = ChangeScheduler::new();
        let timer = tokio::spawn(tokio::time::sleep(Duration::from_secs(60)));
        scheduler.attach("7", timer.abort_handle());
        assert!(timer.await.unwrap_err().is_cancelled());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let mut scheduler = ChangeScheduler::new();
        scheduler.arm("1");
        scheduler.arm("2");
        let timer = tokio::spawn(tokio::time::sleep(Duration::from_secs(60)));
        scheduler.attach("1", timer.abort_handle());

        scheduler.cancel_all();
        assert_eq!(scheduler.pending_count(), 0);
        assert!(timer.await.unwrap_err().is_cancelled());
    }
}
