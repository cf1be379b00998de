//! Warnings before the daemon force-refreshes a running snap.

use chrono::{DateTime, Utc};
use snapmon_core::{ForcedRefreshConfig, Snap};

use crate::events::RefreshEvent;

/// Decide whether `snap` needs a forced-refresh warning at `now`.
///
/// Inside the notice window a warning is raised unless the user ignored the
/// snap. Inside the shorter alert window it is raised regardless.
pub fn check_forced_refresh(
    snap: &Snap,
    ignored: bool,
    now: DateTime<Utc>,
    config: &ForcedRefreshConfig,
) -> Option<RefreshEvent> {
    let remaining_secs = snap.remaining_secs(now)?;

    let warning_tier = if remaining_secs <= config.notice_threshold_secs && !ignored {
        true
    } else if remaining_secs <= config.alert_threshold_secs {
        false
    } else {
        return None;
    };

    Some(RefreshEvent::PendingRefreshForced {
        snap: snap.clone(),
        remaining_secs,
        warning_tier,
    })
}
