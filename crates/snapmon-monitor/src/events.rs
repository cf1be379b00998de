//! Events the monitor publishes to the application layer.

use snapmon_core::Snap;

/// User-facing refresh events.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    /// Grouped prompt: these snaps have a refresh held back by running apps.
    ///
    /// Ignored snaps are listed too; the event only fires when at least one
    /// of them is not ignored.
    PendingRefresh { snaps: Vec<Snap> },

    /// The daemon will refresh `snap` in `remaining_secs` regardless of
    /// running apps.
    ///
    /// `warning_tier` is set for the early notice, which the user may ignore.
    /// The late alert has it unset and is sent even for ignored snaps.
    PendingRefreshForced {
        snap: Snap,
        remaining_secs: i64,
        warning_tier: bool,
    },

    /// An inhibited snap finished refreshing.
    ///
    /// Exactly one field is set: the fresh snap, or its name when the snap
    /// could not be queried.
    RefreshComplete {
        snap: Option<Snap>,
        fallback_name: Option<String>,
    },
}

impl RefreshEvent {
    pub fn completed(snap: Snap) -> Self {
        Self::RefreshComplete {
            snap: Some(snap),
            fallback_name: None,
        }
    }

    pub fn completed_fallback(name: impl Into<String>) -> Self {
        Self::RefreshComplete {
            snap: None,
            fallback_name: Some(name.into()),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PendingRefresh { .. } => "pending-refresh",
            Self::PendingRefreshForced { .. } => "pending-refresh-forced",
            Self::RefreshComplete { .. } => "refresh-complete",
        }
    }

    /// Name of the snap the event is about, for single-snap events.
    pub fn snap_name(&self) -> Option<&str> {
        match self {
            Self::PendingRefresh { .. } => None,
            Self::PendingRefreshForced { snap, .. } => Some(&snap.name),
            Self::RefreshComplete {
                snap,
                fallback_name,
            } => snap
                .as_ref()
                .map(|s| s.name.as_str())
                .or(fallback_name.as_deref()),
        }
    }
}
