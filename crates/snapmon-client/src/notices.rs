//! Notice subscription over the daemon's long-poll endpoint.
//!
//! [`NoticesMonitor`] runs a background task that first fetches every
//! existing notice (delivered with `first_run = true`, so callers can skip
//! stale history), then long-polls for notices newer than the latest one
//! seen. A request failure ends the stream with a single
//! [`NoticeStreamEvent::Error`]; restarting is the caller's job.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use snapmon_client::{HttpSnapdClient, NoticeStreamEvent, NoticesMonitor};
//! use snapmon_core::DaemonConfig;
//!
//! # async fn example() -> Result<(), snapmon_client::ClientError> {
//! let config = DaemonConfig::default();
//! let client = Arc::new(HttpSnapdClient::from_config(&config)?);
//! let (mut monitor, mut rx) = NoticesMonitor::start(client, config.notices_timeout());
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         NoticeStreamEvent::Notice { notice, first_run } => {
//!             println!("{} {} (first run: {})", notice.notice_type, notice.key, first_run);
//!         }
//!         NoticeStreamEvent::Error(e) => {
//!             eprintln!("notice stream failed: {}", e);
//!             break;
//!         }
//!     }
//! }
//! monitor.stop();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use snapmon_core::Notice;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::client::{NoticesQuery, SnapdClient};
use crate::error::ClientError;

/// Events produced by a notice subscription.
#[derive(Debug)]
pub enum NoticeStreamEvent {
    /// A notice, in arrival order
    Notice { notice: Notice, first_run: bool },
    /// The subscription failed and has stopped
    Error(ClientError),
}

/// A running notice subscription.
pub struct NoticesMonitor {
    task: Option<JoinHandle<()>>,
}

impl NoticesMonitor {
    /// Start polling `client` for notices.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        client: Arc<dyn SnapdClient>,
        poll_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<NoticeStreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(client, poll_timeout, tx));
        (Self { task: Some(task) }, rx)
    }

    /// Whether the polling task is still alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop polling. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("notice subscription stopped");
        }
    }
}

impl Drop for NoticesMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    client: Arc<dyn SnapdClient>,
    poll_timeout: Duration,
    tx: mpsc::UnboundedSender<NoticeStreamEvent>,
) {
    let mut after: Option<DateTime<Utc>> = None;
    let mut first_run = true;

    loop {
        let query = if first_run {
            NoticesQuery::initial()
        } else {
            NoticesQuery::long_poll(after, poll_timeout)
        };

        let notices = match client.notices(&query).await {
            Ok(notices) => notices,
            Err(e) => {
                let _ = tx.send(NoticeStreamEvent::Error(e));
                return;
            }
        };
        trace!(count = notices.len(), first_run, "notices received");

        for notice in notices {
            if after.is_none_or(|seen| notice.last_occurred > seen) {
                after = Some(notice.last_occurred);
            }
            if tx.send(NoticeStreamEvent::Notice { notice, first_run }).is_err() {
                debug!("notice receiver dropped, stopping subscription");
                return;
            }
        }
        first_run = false;
    }
}
