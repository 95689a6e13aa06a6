//! Messages exchanged with the browser-side shim.

use serde::{Deserialize, Serialize};

use crate::host::{DownloadId, DownloadItem};
use crate::redirect::RedirectEvent;

/// Correlates a command with its reply.
pub type RequestId = u64;

/// Message received from the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Incoming {
    DownloadCreated(DownloadItem),
    BeforeRedirect(RedirectEvent),
    ToolbarClicked,
    /// Context-menu "send link"/"send page".
    SendLink { url: String },
    Reply(Reply),
}

/// Outcome of a command, as reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reply {
    pub request_id: RequestId,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Message sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outgoing {
    Command {
        request_id: RequestId,
        #[serde(flatten)]
        command: Command,
    },
}

/// A browser API call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Cancel { id: DownloadId },
    Erase { id: DownloadId },
    Pause { id: DownloadId },
    Resume { id: DownloadId },
    Download {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    SetListener { attached: bool },
    SetIndicator { icon: String, title: String },
    Notify { title: String, message: String },
}

impl Command {
    /// Operation name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cancel { .. } => "cancel",
            Self::Erase { .. } => "erase",
            Self::Pause { .. } => "pause",
            Self::Resume { .. } => "resume",
            Self::Download { .. } => "download",
            Self::SetListener { .. } => "set_listener",
            Self::SetIndicator { .. } => "set_indicator",
            Self::Notify { .. } => "notify",
        }
    }
}
