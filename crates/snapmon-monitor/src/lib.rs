//! # snapmon-monitor
//!
//! Tracks snap refreshes reported by snapd and drives refresh feedback.
//!
//! - [`RefreshMonitor`] - event loop wiring the daemon to the tracker
//! - [`RefreshTracker`] - the state machine itself, free of I/O
//! - [`ConnectionSupervisor`] - subscription lifecycle and reconnects
//! - [`ProgressAggregator`] - per-snap launcher progress
//! - [`view`] - traits the presentation layer implements

pub mod desktop;
pub mod dialogs;
pub mod dispatcher;
pub mod events;
pub mod forced;
pub mod inhibit;
pub mod monitor;
pub mod progress;
pub mod scheduler;
pub mod store;
pub mod supervisor;
pub mod testing;
pub mod tracker;
pub mod view;

pub use desktop::FsDesktopLookup;
pub use dialogs::DialogRegistry;
pub use events::RefreshEvent;
pub use monitor::{Collaborators, MonitorHandle, RefreshMonitor};
pub use progress::ProgressAggregator;
pub use scheduler::{ChangePhase, ChangeScheduler};
pub use store::{SnapRecord, SnapStore};
pub use supervisor::{ClientFactory, ConnectionState, ConnectionSupervisor};
pub use tracker::{Ports, RefreshTracker, Request, SnapPurpose, TrackerSettings};
pub use view::{
    AppInfo, DesktopLookup, DialogHandle, DialogHost, LauncherSink, LauncherUpdate, LogDialogHost,
    LogLauncherSink,
};
