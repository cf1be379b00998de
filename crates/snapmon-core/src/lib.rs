//! # snapmon-core
//!
//! Core types, errors, and utilities for the snapmon refresh monitor.
//!
//! This crate provides:
//! - [`SnapmonError`] - Error type for configuration, I/O and logging setup
//! - [`logging`] - Tracing setup and log directory helpers
//! - [`types`] - Daemon data model shared by the client and the monitor
//! - [`config`] - Monitor configuration, loaded from YAML
//!
//! ## Example
//!
//! ```no_run
//! use snapmon_core::{MonitorConfig, logging};
//!
//! fn main() -> snapmon_core::Result<()> {
//!     let _guard = logging::init_logging(None, false)?;
//!
//!     let config = MonitorConfig::load(None)?;
//!     config.validate()?;
//!     tracing::info!(socket = %config.daemon.socket().display(), "config loaded");
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export main types for convenience
pub use config::{DaemonConfig, ForcedRefreshConfig, MonitorConfig};
pub use error::{Result, SnapmonError};
pub use logging::{LogGuard, init_logging};
pub use types::{Change, ChangeData, Notice, NoticeType, Snap, SnapApp, Status, Task, TaskData};
