//! The [`SnapdClient`] trait abstracts the daemon REST API.
//!
//! ## Implementations
//!
//! - [`HttpSnapdClient`](crate::HttpSnapdClient) - snapd over its Unix socket (reqwest)
//! - [`MockSnapdClient`](crate::MockSnapdClient) - scripted responses for tests

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use snapmon_core::{Change, Notice, NoticeType, Snap};

use crate::error::Result;

/// Notice types the monitor subscribes to.
pub const MONITORED_NOTICE_TYPES: [NoticeType; 3] = [
    NoticeType::ChangeUpdate,
    NoticeType::RefreshInhibit,
    NoticeType::SnapRunInhibit,
];

/// Filter for listing snaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapsFilter {
    /// Every installed snap
    All,
    /// Snaps whose refresh is held back by running apps
    RefreshInhibited,
}

impl SnapsFilter {
    /// Value of the `select` query parameter, if any.
    pub fn select(&self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::RefreshInhibited => Some("refresh-inhibited"),
        }
    }
}

/// Parameters of one notices request.
#[derive(Debug, Clone, PartialEq)]
pub struct NoticesQuery {
    /// Only notices that occurred strictly after this time
    pub after: Option<DateTime<Utc>>,
    /// Long-poll wait; `None` returns immediately
    pub timeout: Option<Duration>,
    pub types: Vec<NoticeType>,
}

impl NoticesQuery {
    /// An immediate query for every monitored notice.
    pub fn initial() -> Self {
        Self {
            after: None,
            timeout: None,
            types: MONITORED_NOTICE_TYPES.to_vec(),
        }
    }

    /// A long poll for monitored notices newer than `after`.
    pub fn long_poll(after: Option<DateTime<Utc>>, timeout: Duration) -> Self {
        Self {
            after,
            timeout: Some(timeout),
            types: MONITORED_NOTICE_TYPES.to_vec(),
        }
    }
}

/// Access to the snapd REST API.
#[async_trait]
pub trait SnapdClient: Send + Sync {
    /// Fetch a change by id.
    async fn change(&self, id: &str) -> Result<Change>;

    /// Fetch one installed snap.
    async fn snap(&self, name: &str) -> Result<Snap>;

    /// List installed snaps.
    async fn snaps(&self, filter: SnapsFilter) -> Result<Vec<Snap>>;

    /// Fetch notices, waiting up to `query.timeout` for new ones.
    async fn notices(&self, query: &NoticesQuery) -> Result<Vec<Notice>>;

    /// Client name, for logs.
    fn name(&self) -> &str;
}
