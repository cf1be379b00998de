//! Daemon data model shared by the client and the monitor.
//!
//! These types mirror the JSON objects snapd returns for notices, changes,
//! tasks and snaps. Only the fields the monitor reads are modelled; unknown
//! fields are ignored on deserialization.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a daemon change.
pub type ChangeId = String;

/// Change kind for refreshes started by the daemon on its own schedule.
pub const KIND_AUTO_REFRESH: &str = "auto-refresh";

/// Change kind for refreshes requested explicitly by a user.
pub const KIND_REFRESH_SNAP: &str = "refresh-snap";

/// Type of a daemon notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeType {
    /// A change was created or changed status
    ChangeUpdate,
    /// The set of snaps whose refresh is held back by running apps changed
    RefreshInhibit,
    /// A snap launch was held back by an ongoing refresh
    SnapRunInhibit,
    /// Any notice type this monitor does not know about
    #[serde(other)]
    Unknown,
}

impl NoticeType {
    /// Wire name used in notice queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChangeUpdate => "change-update",
            Self::RefreshInhibit => "refresh-inhibit",
            Self::SnapRunInhibit => "snap-run-inhibit",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for NoticeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A push event from the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Notice {
    pub id: String,
    #[serde(rename = "type")]
    pub notice_type: NoticeType,
    /// For change-update notices this is the change id
    pub key: String,
    pub last_occurred: DateTime<Utc>,
    #[serde(default)]
    pub last_data: HashMap<String, String>,
}

impl Notice {
    /// Create a notice with no data attached.
    pub fn new(id: impl Into<String>, notice_type: NoticeType, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            notice_type,
            key: key.into(),
            last_occurred: Utc::now(),
            last_data: HashMap::new(),
        }
    }

    /// Create a change-update notice for `change_id` with the given change kind.
    pub fn change_update(id: impl Into<String>, change_id: impl Into<String>, kind: &str) -> Self {
        Self::new(id, NoticeType::ChangeUpdate, change_id).with_data("kind", kind)
    }

    /// Attach a `last-data` entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.last_data.insert(key.into(), value.into());
        self
    }

    /// Set the last occurrence time.
    pub fn with_last_occurred(mut self, at: DateTime<Utc>) -> Self {
        self.last_occurred = at;
        self
    }

    /// Change kind carried by change-update notices.
    pub fn kind(&self) -> Option<&str> {
        self.last_data.get("kind").map(String::as_str)
    }
}

/// Status of a change or task.
///
/// Strings the daemon may add in the future are kept verbatim in
/// [`Status::Other`] so they can be logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Default,
    Do,
    Doing,
    Done,
    Abort,
    Undo,
    Undoing,
    Undone,
    Hold,
    Error,
    Wait,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Default => "Default",
            Self::Do => "Do",
            Self::Doing => "Doing",
            Self::Done => "Done",
            Self::Abort => "Abort",
            Self::Undo => "Undo",
            Self::Undoing => "Undoing",
            Self::Undone => "Undone",
            Self::Hold => "Hold",
            Self::Error => "Error",
            Self::Wait => "Wait",
            Self::Other(other) => other,
        }
    }

    /// A status from which a task will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::Abort | Self::Error | Self::Hold | Self::Wait | Self::Undone
        )
    }

    /// A change status meaning the change is being (or has been) rolled back.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Undoing | Self::Undone | Self::Undo | Self::Error)
    }

    /// A change status of a change that is progressing normally.
    pub fn is_working(&self) -> bool {
        matches!(self, Self::Do | Self::Doing | Self::Done)
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Default" => Self::Default,
            "Do" => Self::Do,
            "Doing" => Self::Doing,
            "Done" => Self::Done,
            "Abort" => Self::Abort,
            "Undo" => Self::Undo,
            "Undoing" => Self::Undoing,
            "Undone" => Self::Undone,
            "Hold" => Self::Hold,
            "Error" => Self::Error,
            "Wait" => Self::Wait,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Status {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Status> for String {
    fn from(value: Status) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskData {
    #[serde(default)]
    pub affected_snaps: Vec<String>,
}

/// One step of a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub summary: String,
    pub status: Status,
    #[serde(default)]
    pub data: Option<TaskData>,
}

impl Task {
    pub fn new(id: impl Into<String>, summary: impl Into<String>, status: impl Into<Status>) -> Self {
        Self {
            id: id.into(),
            kind: String::new(),
            summary: summary.into(),
            status: status.into(),
            data: None,
        }
    }

    /// Attach the list of snaps this task works on.
    pub fn with_affected_snaps<I, S>(mut self, snaps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data = Some(TaskData {
            affected_snaps: snaps.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Snaps affected by this task; empty when the task carries no payload.
    pub fn affected_snaps(&self) -> &[String] {
        self.data
            .as_ref()
            .map(|data| data.affected_snaps.as_slice())
            .unwrap_or(&[])
    }
}

/// Payload attached to refresh changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChangeData {
    #[serde(default)]
    pub snap_names: Vec<String>,
    #[serde(default)]
    pub refresh_forced: Vec<String>,
}

/// A daemon-tracked multi-task operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub id: ChangeId,
    pub kind: String,
    #[serde(default)]
    pub summary: String,
    pub status: Status,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub data: Option<ChangeData>,
}

impl Change {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, status: impl Into<Status>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            summary: String::new(),
            status: status.into(),
            tasks: Vec::new(),
            ready: false,
            data: None,
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Attach the snap names carried by auto-refresh changes.
    pub fn with_snap_names<I, S>(mut self, snaps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let data = self.data.get_or_insert_with(ChangeData::default);
        data.snap_names = snaps.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_auto_refresh(&self) -> bool {
        self.kind == KIND_AUTO_REFRESH
    }

    /// Snap names from the change payload, if the change carries one.
    pub fn snap_names(&self) -> Option<&[String]> {
        self.data.as_ref().map(|data| data.snap_names.as_slice())
    }
}

/// Refresh hold-back information for an inhibited snap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RefreshInhibit {
    /// Time at which the daemon will refresh the snap regardless of running apps
    pub proceed_time: DateTime<Utc>,
}

/// An application exposed by a snap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapApp {
    pub name: String,
    #[serde(default)]
    pub desktop_file: Option<PathBuf>,
}

/// An installed snap as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Snap {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub refresh_inhibit: Option<RefreshInhibit>,
    #[serde(default)]
    pub apps: Vec<SnapApp>,
}

impl Snap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            version: None,
            refresh_inhibit: None,
            apps: Vec::new(),
        }
    }

    pub fn with_proceed_time(mut self, proceed_time: DateTime<Utc>) -> Self {
        self.refresh_inhibit = Some(RefreshInhibit { proceed_time });
        self
    }

    pub fn with_app(mut self, name: impl Into<String>, desktop_file: Option<PathBuf>) -> Self {
        self.apps.push(SnapApp {
            name: name.into(),
            desktop_file,
        });
        self
    }

    /// Seconds left until the daemon force-refreshes this snap.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.refresh_inhibit
            .as_ref()
            .map(|inhibit| (inhibit.proceed_time - now).num_seconds())
    }
}
