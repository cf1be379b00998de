//! Classification of incoming notices.

use snapmon_core::types::{ChangeId, KIND_AUTO_REFRESH, KIND_REFRESH_SNAP};
use snapmon_core::{Notice, NoticeType};

/// What to do with a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeRoute {
    /// Fetch the change and feed it to the poll scheduler
    FetchChange(ChangeId),
    /// List refresh-inhibited snaps
    QueryInhibited,
    /// Nothing to do
    Skip(SkipReason),
}

/// Why a notice was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Change update replayed from history at subscription start
    FirstRun,
    /// Change of a kind other than a refresh
    NotARefresh,
    /// Snap launch inhibition is not acted upon yet
    RunInhibit,
    /// Notice type unknown to this monitor
    UnknownType,
}

/// Decide how to handle `notice`.
pub fn route(notice: &Notice, first_run: bool) -> NoticeRoute {
    match notice.notice_type {
        NoticeType::ChangeUpdate => {
            if first_run {
                return NoticeRoute::Skip(SkipReason::FirstRun);
            }
            match notice.kind() {
                Some(KIND_AUTO_REFRESH) | Some(KIND_REFRESH_SNAP) => {
                    NoticeRoute::FetchChange(notice.key.clone())
                }
                _ => NoticeRoute::Skip(SkipReason::NotARefresh),
            }
        }
        NoticeType::RefreshInhibit => NoticeRoute::QueryInhibited,
        NoticeType::SnapRunInhibit => NoticeRoute::Skip(SkipReason::RunInhibit),
        NoticeType::Unknown => NoticeRoute::Skip(SkipReason::UnknownType),
    }
}
