//! # snapmon-client
//!
//! Client side of the conversation with snapd.
//!
//! - [`SnapdClient`] - async trait over the REST endpoints the monitor needs
//! - [`HttpSnapdClient`] - reqwest implementation over the daemon socket
//! - [`MockSnapdClient`] - scripted implementation for tests
//! - [`NoticesMonitor`] - long-poll notice subscription with an error channel

pub mod client;
pub mod error;
pub mod http;
pub mod mock;
pub mod notices;

pub use client::{MONITORED_NOTICE_TYPES, NoticesQuery, SnapdClient, SnapsFilter};
pub use error::{ClientError, Result};
pub use http::HttpSnapdClient;
pub use mock::{MockCall, MockSnapdClient};
pub use notices::{NoticeStreamEvent, NoticesMonitor};
