//! The refresh monitor: one event loop owning all tracking state.
//!
//! Notices, query results, timers and user actions are all handled on a
//! single tokio task. Daemon queries and timers run as spawned tasks in
//! `JoinSet`s and their results come back through the same `select!`, so the
//! stores are never shared.
//!
//! On shutdown in-flight queries are cancelled rather than aborted: each one
//! resolves to [`ClientError::Cancelled`] and is handed to the tracker like
//! any other result before the tracker is torn down.
//!
//! ## Example
//!
//! ```no_run
//! use snapmon_core::MonitorConfig;
//! use snapmon_monitor::RefreshMonitor;
//!
//! # async fn example() {
//! let (mut monitor, mut events) = RefreshMonitor::from_config(&MonitorConfig::default());
//! monitor.start();
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! monitor.shutdown().await;
//! # }
//! ```

use std::sync::Arc;

use chrono::Utc;
use snapmon_client::{ClientError, HttpSnapdClient, NoticeStreamEvent, SnapdClient, SnapsFilter};
use snapmon_core::types::ChangeId;
use snapmon_core::{Change, MonitorConfig, Snap};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, trace};

use crate::desktop::FsDesktopLookup;
use crate::events::RefreshEvent;
use crate::supervisor::{ClientFactory, ConnectionSupervisor};
use crate::tracker::{Ports, RefreshTracker, Request, SnapPurpose, TrackerSettings};
use crate::view::{DesktopLookup, DialogHandle, DialogHost, LauncherSink, LogDialogHost, LogLauncherSink};

/// Everything the monitor talks to.
pub struct Collaborators {
    pub client_factory: ClientFactory,
    pub dialogs: Box<dyn DialogHost>,
    pub launcher: Box<dyn LauncherSink>,
    pub desktop: Box<dyn DesktopLookup>,
}

enum Command {
    Start,
    IgnoreSnap(String),
    HideSnap(String),
    DialogDismissed(DialogHandle),
    Shutdown(Option<oneshot::Sender<()>>),
}

enum Completion {
    Change {
        change_id: ChangeId,
        result: Result<Change, ClientError>,
    },
    Inhibited(Result<Vec<Snap>, ClientError>),
    Snap {
        name: String,
        purpose: SnapPurpose,
        result: Result<Snap, ClientError>,
    },
}

impl Completion {
    fn is_cancelled(&self) -> bool {
        let err = match self {
            Completion::Change { result, .. } => result.as_ref().err(),
            Completion::Inhibited(result) => result.as_ref().err(),
            Completion::Snap { result, .. } => result.as_ref().err(),
        };
        err.is_some_and(ClientError::is_cancelled)
    }
}

enum Timer {
    Poll(ChangeId),
    Reconnect,
}

/// Owner of the monitor's event loop.
///
/// Dropping it stops the loop; [`shutdown`](Self::shutdown) does the same and
/// waits for teardown to finish.
pub struct RefreshMonitor {
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
    started: bool,
}

impl RefreshMonitor {
    /// Spawn the event loop. Nothing connects until [`start`](Self::start).
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &MonitorConfig,
        collaborators: Collaborators,
    ) -> (Self, mpsc::UnboundedReceiver<RefreshEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();

        let tracker = RefreshTracker::new(
            Ports {
                dialogs: collaborators.dialogs,
                launcher: collaborators.launcher,
                desktop: collaborators.desktop,
            },
            events_tx,
            TrackerSettings {
                poll_interval: config.poll_interval(),
                forced_refresh: config.forced_refresh.clone(),
            },
        );
        let supervisor = ConnectionSupervisor::new(
            collaborators.client_factory,
            config.daemon.notices_timeout(),
            config.reconnect_delay(),
        );

        let event_loop = EventLoop {
            tracker,
            supervisor,
            queries: JoinSet::new(),
            timers: JoinSet::new(),
            cancel: watch::Sender::new(false),
            started: false,
        };
        let task = tokio::spawn(event_loop.run(commands_rx));

        (
            Self {
                commands,
                task: Some(task),
                started: false,
            },
            events_rx,
        )
    }

    /// Monitor talking HTTP to snapd, with log-only view collaborators.
    pub fn from_config(config: &MonitorConfig) -> (Self, mpsc::UnboundedReceiver<RefreshEvent>) {
        let daemon = config.daemon.clone();
        let client_factory: ClientFactory = Arc::new(move || {
            let client: Arc<dyn SnapdClient> = Arc::new(HttpSnapdClient::from_config(&daemon)?);
            Ok(client)
        });

        Self::new(
            config,
            Collaborators {
                client_factory,
                dialogs: Box::new(LogDialogHost),
                launcher: Box::new(LogLauncherSink),
                desktop: Box::new(FsDesktopLookup::new(&config.desktop_dir)),
            },
        )
    }

    /// Connect and begin tracking. Returns false if already started.
    pub fn start(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        self.send(Command::Start);
        true
    }

    /// A cloneable handle for user actions.
    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            commands: self.commands.clone(),
        }
    }

    /// Stop the loop and wait until every timer, query and dialog is released.
    pub async fn shutdown(mut self) {
        let (ack, done) = oneshot::channel();
        self.send(Command::Shutdown(Some(ack)));
        let _ = done.await;
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && !e.is_cancelled()
        {
            error!(error = %e, "monitor loop panicked");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("monitor loop already stopped");
        }
    }
}

impl Drop for RefreshMonitor {
    fn drop(&mut self) {
        if self.task.take().is_some() {
            self.send(Command::Shutdown(None));
        }
    }
}

/// User actions forwarded to a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl MonitorHandle {
    /// Stop prompting about `name`.
    pub fn ignore_snap(&self, name: impl Into<String>) {
        let _ = self.commands.send(Command::IgnoreSnap(name.into()));
    }

    /// Stop showing dialogs for `name`.
    pub fn hide_snap(&self, name: impl Into<String>) {
        let _ = self.commands.send(Command::HideSnap(name.into()));
    }

    /// Report that the user closed the dialog `handle`.
    pub fn dialog_dismissed(&self, handle: DialogHandle) {
        let _ = self.commands.send(Command::DialogDismissed(handle));
    }
}

struct EventLoop {
    tracker: RefreshTracker,
    supervisor: ConnectionSupervisor,
    queries: JoinSet<Completion>,
    timers: JoinSet<Timer>,
    cancel: watch::Sender<bool>,
    started: bool,
}

impl EventLoop {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown(ack)) => {
                        self.teardown().await;
                        if let Some(ack) = ack {
                            let _ = ack.send(());
                        }
                        return;
                    }
                    Some(command) => self.on_command(command),
                    None => {
                        self.teardown().await;
                        return;
                    }
                },
                event = self.supervisor.next_event(), if self.supervisor.is_connected() => {
                    self.on_stream_event(event);
                }
                Some(done) = self.queries.join_next(), if !self.queries.is_empty() => match done {
                    Ok(completion) => self.on_completion(completion),
                    Err(e) => Self::on_join_error("query", e),
                },
                Some(fired) = self.timers.join_next(), if !self.timers.is_empty() => match fired {
                    Ok(timer) => self.on_timer(timer),
                    Err(e) => Self::on_join_error("timer", e),
                },
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Start => {
                if !self.started {
                    self.started = true;
                    info!("refresh monitor started");
                    self.connect();
                }
            }
            Command::IgnoreSnap(name) => self.tracker.ignore_snap(&name),
            Command::HideSnap(name) => self.tracker.hide_snap(&name),
            Command::DialogDismissed(handle) => self.tracker.dialog_dismissed(handle),
            // handled by the loop
            Command::Shutdown(_) => {}
        }
    }

    fn on_stream_event(&mut self, event: NoticeStreamEvent) {
        match event {
            NoticeStreamEvent::Notice { notice, first_run } => {
                let requests = self.tracker.on_notice(&notice, first_run);
                self.dispatch(requests);
            }
            NoticeStreamEvent::Error(e) => self.schedule_reconnect(&e),
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Change { change_id, result } => {
                let requests = self.tracker.on_change_fetched(&change_id, result);
                self.dispatch(requests);
            }
            Completion::Inhibited(result) => self.tracker.on_inhibited_snaps(result, Utc::now()),
            Completion::Snap {
                name,
                purpose,
                result,
            } => self.tracker.on_snap_fetched(&name, purpose, result),
        }
    }

    fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Poll(change_id) => {
                let requests = self.tracker.on_poll_due(&change_id);
                self.dispatch(requests);
            }
            Timer::Reconnect => {
                self.supervisor.reconnect_due();
                self.connect();
            }
        }
    }

    fn on_join_error(what: &str, e: JoinError) {
        if !e.is_cancelled() {
            error!(task = what, error = %e, "monitor task panicked");
        }
    }

    fn connect(&mut self) {
        if let Err(e) = self.supervisor.connect() {
            self.schedule_reconnect(&e);
        }
    }

    fn schedule_reconnect(&mut self, err: &ClientError) {
        let delay = self.supervisor.on_failure(err);
        let timer = self.timers.spawn(async move {
            tokio::time::sleep(delay).await;
            Timer::Reconnect
        });
        self.supervisor.set_reconnect_timer(timer);
    }

    fn dispatch(&mut self, requests: Vec<Request>) {
        for request in requests {
            match request {
                Request::SchedulePoll { change_id, delay } => {
                    let id = change_id.clone();
                    let timer = self.timers.spawn(async move {
                        tokio::time::sleep(delay).await;
                        Timer::Poll(id)
                    });
                    self.tracker.attach_poll_timer(&change_id, timer);
                }
                Request::FetchChange(change_id) => {
                    let client = self.supervisor.query_client();
                    let cancel = self.cancel.subscribe();
                    self.queries.spawn(async move {
                        let result = cancellable(cancel, async {
                            client?.change(&change_id).await
                        })
                        .await;
                        Completion::Change { change_id, result }
                    });
                }
                Request::ListInhibited => {
                    let client = self.supervisor.query_client();
                    let cancel = self.cancel.subscribe();
                    self.queries.spawn(async move {
                        let result = cancellable(cancel, async {
                            client?.snaps(SnapsFilter::RefreshInhibited).await
                        })
                        .await;
                        Completion::Inhibited(result)
                    });
                }
                Request::FetchSnap { name, purpose } => {
                    let client = self.supervisor.query_client();
                    let cancel = self.cancel.subscribe();
                    self.queries.spawn(async move {
                        let result =
                            cancellable(cancel, async { client?.snap(&name).await }).await;
                        Completion::Snap {
                            name,
                            purpose,
                            result,
                        }
                    });
                }
            }
        }
    }

    async fn teardown(&mut self) {
        self.supervisor.shutdown();

        self.cancel.send_replace(true);
        while let Some(done) = self.queries.join_next().await {
            match done {
                Ok(completion) if completion.is_cancelled() => self.on_completion(completion),
                Ok(_) => trace!("dropping query result that raced shutdown"),
                Err(e) => Self::on_join_error("query", e),
            }
        }

        self.tracker.teardown();
        self.timers.abort_all();
        info!("refresh monitor stopped");
    }
}

/// Run `query` until it finishes or `cancel` turns true, whichever is first.
///
/// A dropped sender counts as cancellation.
async fn cancellable<T>(
    mut cancel: watch::Receiver<bool>,
    query: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    tokio::select! {
        result = query => result,
        _ = cancel.wait_for(|cancelled| *cancelled) => Err(ClientError::Cancelled),
    }
}
