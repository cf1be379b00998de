//! Daemon connection lifecycle.
//!
//! The supervisor owns two kinds of daemon client. The notice subscription
//! gets a fresh client per connection; a failed subscription is torn down
//! and rebuilt from scratch after a fixed delay. Change, snap and snap-list
//! queries go through a separate query client that outlives subscription
//! failures, so a change poll that fires while the stream is reconnecting
//! still reaches the daemon.
//!
//! The reconnect timer itself is run by the event loop, which hands its
//! [`AbortHandle`] back so teardown can cancel it.

use std::sync::Arc;
use std::time::Duration;

use snapmon_client::{ClientError, NoticeStreamEvent, NoticesMonitor, SnapdClient};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Builds a daemon client.
pub type ClientFactory =
    Arc<dyn Fn() -> Result<Arc<dyn SnapdClient>, ClientError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

struct Subscription {
    monitor: NoticesMonitor,
    events: mpsc::UnboundedReceiver<NoticeStreamEvent>,
    client: Arc<dyn SnapdClient>,
    attached: bool,
}

impl Subscription {
    /// Stop the stream and stop listening to it. Idempotent.
    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        self.monitor.stop();
        self.events.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

pub struct ConnectionSupervisor {
    factory: ClientFactory,
    notices_timeout: Duration,
    reconnect_delay: Duration,
    subscription: Option<Subscription>,
    query_client: Option<Arc<dyn SnapdClient>>,
    reconnect_timer: Option<AbortHandle>,
    connects: u64,
}

impl ConnectionSupervisor {
    pub fn new(factory: ClientFactory, notices_timeout: Duration, reconnect_delay: Duration) -> Self {
        Self {
            factory,
            notices_timeout,
            reconnect_delay,
            subscription: None,
            query_client: None,
            reconnect_timer: None,
            connects: 0,
        }
    }

    /// Enter the connected state with a new client and subscription.
    ///
    /// Does nothing when already connected. Must be called from within a
    /// tokio runtime.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        if self.subscription.is_some() {
            return Ok(());
        }
        let client = (self.factory)()?;
        let (monitor, events) = NoticesMonitor::start(Arc::clone(&client), self.notices_timeout);
        self.connects += 1;
        info!(client = client.name(), attempt = self.connects, "connected to snapd");
        self.subscription = Some(Subscription {
            monitor,
            events,
            client,
            attached: true,
        });
        Ok(())
    }

    /// The client of the current subscription.
    pub fn client(&self) -> Option<Arc<dyn SnapdClient>> {
        self.subscription.as_ref().map(|sub| Arc::clone(&sub.client))
    }

    /// The client for one-off queries, built on first use.
    ///
    /// Unlike the subscription client it survives [`on_failure`](Self::on_failure),
    /// so queries keep working between a stream failure and the reconnect.
    /// A factory error is returned and the next call tries again.
    pub fn query_client(&mut self) -> Result<Arc<dyn SnapdClient>, ClientError> {
        if let Some(client) = &self.query_client {
            return Ok(Arc::clone(client));
        }
        let client = (self.factory)()?;
        debug!(client = client.name(), "query client created");
        self.query_client = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Wait for the next subscription event.
    ///
    /// Cancel-safe. Never resolves while disconnected. A stream that closes
    /// without reporting an error is reported as a connection failure.
    pub async fn next_event(&mut self) -> NoticeStreamEvent {
        match self.subscription.as_mut() {
            Some(sub) => sub.events.recv().await.unwrap_or_else(|| {
                NoticeStreamEvent::Error(ClientError::ConnectionFailed(
                    "notice stream closed".to_string(),
                ))
            }),
            None => std::future::pending().await,
        }
    }

    /// Drop the connection after `err`. Returns the delay before the next
    /// connection attempt, which the caller schedules.
    pub fn on_failure(&mut self, err: &ClientError) -> Duration {
        if let Some(mut sub) = self.subscription.take() {
            sub.detach();
        }
        warn!(
            error = %err,
            retry_in_ms = self.reconnect_delay.as_millis() as u64,
            "snapd connection lost"
        );
        self.reconnect_delay
    }

    /// Hand over the timer armed after [`on_failure`](Self::on_failure).
    pub fn set_reconnect_timer(&mut self, timer: AbortHandle) {
        if let Some(old) = self.reconnect_timer.replace(timer) {
            old.abort();
        }
    }

    /// The reconnect timer fired.
    pub fn reconnect_due(&mut self) {
        self.reconnect_timer = None;
        debug!("reconnecting to snapd");
    }

    /// Leave the connected state for good: stop the subscription, cancel a
    /// pending reconnect and release the query client.
    pub fn shutdown(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.query_client = None;
        if let Some(mut sub) = self.subscription.take() {
            sub.detach();
            debug!("snapd connection closed");
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.subscription.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn has_reconnect_pending(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    /// Number of successful connections so far.
    pub fn connects(&self) -> u64 {
        self.connects
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
