//! Download Handoff Core Library
//!
//! Intercepts browser downloads and hands them to a local download manager
//! (the "agent", e.g. JDownloader's HTTP API on `localhost:3128`), falling
//! back to the browser's own downloader whenever the agent is unavailable
//! or rejects the link.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`engine`] - Per-download interception decision
//! - [`controller`] - Mode toggling, startup and direct submission
//! - [`agent`] - HTTP client for the agent's API
//! - [`availability`] - Failure cooldown and periodic probe policies
//! - [`redirect`] - Redirect chain bookkeeping
//! - [`fallback`] - Re-entrancy guards for reissued and in-flight downloads
//! - [`host`] - Capabilities the engine needs from the browser
//! - [`bridge`] - Native-messaging host implementing those capabilities
//! - [`store`] / [`db`] - Persisted mode setting

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod availability;
pub mod bridge;
pub mod constants;
pub mod controller;
pub mod db;
pub mod engine;
pub mod fallback;
pub mod filename;
pub mod host;
pub mod mode;
pub mod redirect;
pub mod store;

// Re-export commonly used types
pub use agent::{AgentApi, AgentClient, AgentError, EndpointStyle};
pub use availability::{AvailabilityMonitor, AvailabilityPolicy};
pub use bridge::{Bridge, BridgeError, BridgeHost};
pub use controller::ModeController;
pub use db::{Database, DbError};
pub use engine::{CheckOrder, EngineSettings, InterceptOutcome, InterceptionEngine, PassReason};
pub use host::{BrowserDownloads, DownloadId, DownloadItem, HostError, HostUi, SuspendStrategy};
pub use mode::{Mode, SharedMode};
pub use redirect::{RedirectEvent, RedirectTracker, ResourceType};
pub use store::{MemoryModeStore, ModeStore, SqliteModeStore, StoreError};
