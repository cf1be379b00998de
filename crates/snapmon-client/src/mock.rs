//! Scripted in-memory daemon for tests.
//!
//! Responses are queued per endpoint and handed out in order. Once a queue
//! runs dry the last successful response keeps being returned, so a change
//! that was scripted as `Doing` stays `Doing` until a new response is pushed.
//! Notice requests with nothing queued wait until [`MockSnapdClient::push_notices`]
//! is called, like a long poll would.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use snapmon_core::{Change, Notice, Snap};
use tokio::sync::{Mutex, Notify};

use crate::client::{NoticesQuery, SnapdClient, SnapsFilter};
use crate::error::{ClientError, Result};

/// A request the mock received.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Change(String),
    Snap(String),
    Snaps(SnapsFilter),
    Notices(NoticesQuery),
}

struct Script<T> {
    queue: VecDeque<Result<T>>,
    last_ok: Option<T>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            last_ok: None,
        }
    }
}

impl<T: Clone> Script<T> {
    fn push(&mut self, reply: Result<T>) {
        self.queue.push_back(reply);
    }

    fn next(&mut self) -> Option<Result<T>> {
        match self.queue.pop_front() {
            Some(Ok(value)) => {
                self.last_ok = Some(value.clone());
                Some(Ok(value))
            }
            Some(Err(e)) => Some(Err(e)),
            None => self.last_ok.clone().map(Ok),
        }
    }
}

#[derive(Default)]
struct MockState {
    changes: HashMap<String, Script<Change>>,
    snaps: HashMap<String, Script<Snap>>,
    inhibited: Script<Vec<Snap>>,
    notices: VecDeque<Result<Vec<Notice>>>,
    calls: Vec<MockCall>,
}

/// Mock daemon client that returns scripted responses.
#[derive(Default)]
pub struct MockSnapdClient {
    state: Mutex<MockState>,
    notices_ready: Notify,
    delay: Option<Duration>,
}

impl MockSnapdClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response for `change(id)`.
    pub async fn push_change(&self, id: impl Into<String>, reply: Result<Change>) {
        self.state
            .lock()
            .await
            .changes
            .entry(id.into())
            .or_default()
            .push(reply);
    }

    /// Queue a response for `snap(name)`.
    pub async fn push_snap(&self, name: impl Into<String>, reply: Result<Snap>) {
        self.state
            .lock()
            .await
            .snaps
            .entry(name.into())
            .or_default()
            .push(reply);
    }

    /// Queue a response for `snaps(RefreshInhibited)`.
    pub async fn push_inhibited(&self, reply: Result<Vec<Snap>>) {
        self.state.lock().await.inhibited.push(reply);
    }

    /// Queue a response for the next notices request and wake a waiting one.
    pub async fn push_notices(&self, reply: Result<Vec<Notice>>) {
        self.state.lock().await.notices.push_back(reply);
        self.notices_ready.notify_one();
    }

    /// Every request received so far.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of `change(id)` requests received.
    pub async fn change_calls(&self, id: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| matches!(call, MockCall::Change(c) if c == id))
            .count()
    }

    /// Number of `snap(name)` requests received.
    pub async fn snap_calls(&self, name: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| matches!(call, MockCall::Snap(s) if s == name))
            .count()
    }

    /// Number of notices requests received.
    pub async fn notices_calls(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| matches!(call, MockCall::Notices(_)))
            .count()
    }

    async fn record(&self, call: MockCall) {
        self.state.lock().await.calls.push(call);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SnapdClient for MockSnapdClient {
    async fn change(&self, id: &str) -> Result<Change> {
        self.record(MockCall::Change(id.to_string())).await;
        self.pause().await;
        let reply = self
            .state
            .lock()
            .await
            .changes
            .get_mut(id)
            .and_then(Script::next);
        reply.unwrap_or_else(|| Err(ClientError::api(404, format!("cannot find change with id \"{id}\""))))
    }

    async fn snap(&self, name: &str) -> Result<Snap> {
        self.record(MockCall::Snap(name.to_string())).await;
        self.pause().await;
        let reply = self
            .state
            .lock()
            .await
            .snaps
            .get_mut(name)
            .and_then(Script::next);
        reply.unwrap_or_else(|| {
            Err(ClientError::Api {
                status: 404,
                kind: Some("snap-not-found".to_string()),
                message: format!("snap \"{name}\" is not installed"),
            })
        })
    }

    async fn snaps(&self, filter: SnapsFilter) -> Result<Vec<Snap>> {
        self.record(MockCall::Snaps(filter)).await;
        self.pause().await;
        match filter {
            SnapsFilter::RefreshInhibited => self
                .state
                .lock()
                .await
                .inhibited
                .next()
                .unwrap_or_else(|| Ok(Vec::new())),
            SnapsFilter::All => Ok(self
                .state
                .lock()
                .await
                .snaps
                .values()
                .filter_map(|script| script.last_ok.clone())
                .collect()),
        }
    }

    async fn notices(&self, query: &NoticesQuery) -> Result<Vec<Notice>> {
        self.record(MockCall::Notices(query.clone())).await;
        self.pause().await;
        loop {
            if let Some(reply) = self.state.lock().await.notices.pop_front() {
                return reply;
            }
            // notify_one stores a permit, so a push between the check and
            // this await is not lost
            self.notices_ready.notified().await;
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
