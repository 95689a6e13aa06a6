//! Capabilities the engine needs from the browser host.
//!
//! Browser targets differ in how a native download can be held while the
//! agent is asked: some can pause and resume it, others can only cancel it
//! and start a fresh download on failure. [`BrowserDownloads::strategy`]
//! tells the engine which one applies; the engine itself is written once.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mode::Mode;

/// Browser-assigned download identifier.
pub type DownloadId = u64;

/// A download as reported by the browser's download-created event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadItem {
    pub id: DownloadId,
    /// Final (post-redirect) URL.
    pub url: String,
    /// Target path the browser picked, often empty at creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

impl DownloadItem {
    #[must_use]
    pub fn new(id: DownloadId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            filename: None,
            mime: None,
        }
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// How a native download is held while the agent is asked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SuspendStrategy {
    /// Cancel and erase right away; on failure start a new native download.
    #[default]
    Cancel,
    /// Pause; cancel and erase on success, resume on failure.
    Pause,
}

impl FromStr for SuspendStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancel" => Ok(Self::Cancel),
            "pause" => Ok(Self::Pause),
            other => Err(format!(
                "unknown suspend strategy '{other}' (expected cancel or pause)"
            )),
        }
    }
}

impl fmt::Display for SuspendStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cancel => "cancel",
            Self::Pause => "pause",
        })
    }
}

/// A browser API call was rejected or never answered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The browser reported an error, e.g. the download already finished.
    #[error("browser rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    /// No answer arrived in time.
    #[error("browser did not answer {operation} in time")]
    Timeout { operation: &'static str },

    /// The connection to the browser is gone.
    #[error("browser connection closed during {operation}")]
    Disconnected { operation: &'static str },

    /// The request could not be sent, e.g. it exceeds the message size limit.
    #[error("could not send {operation} to browser: {message}")]
    Unsendable {
        operation: &'static str,
        message: String,
    },
}

impl HostError {
    pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            message: message.into(),
        }
    }
}

/// Download control and event subscription.
#[async_trait]
pub trait BrowserDownloads: Send + Sync {
    /// How this host suspends a native download.
    fn strategy(&self) -> SuspendStrategy;

    async fn cancel(&self, id: DownloadId) -> Result<(), HostError>;

    async fn erase(&self, id: DownloadId) -> Result<(), HostError>;

    async fn pause(&self, id: DownloadId) -> Result<(), HostError>;

    async fn resume(&self, id: DownloadId) -> Result<(), HostError>;

    /// Starts a new native download. `filename` must be a bare name.
    async fn download(&self, url: &str, filename: Option<&str>) -> Result<(), HostError>;

    /// Attaches or detaches the download-created listener.
    async fn set_created_listener(&self, attached: bool) -> Result<(), HostError>;
}

/// Visible surface: toolbar indicator and notifications.
#[async_trait]
pub trait HostUi: Send + Sync {
    /// Shows the icon and tooltip for `mode`.
    async fn show_mode(&self, mode: Mode) -> Result<(), HostError>;

    async fn notify(&self, title: &str, message: &str) -> Result<(), HostError>;
}
