//! The external download manager ("agent") and its local HTTP API.
//!
//! # Architecture
//!
//! - [`AgentApi`] - Async trait the engine talks to (probe + submit)
//! - [`AgentClient`] - `reqwest` implementation against the agent's HTTP endpoints
//! - [`AgentError`] - Why a call failed; callers treat every variant the same
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use handoff_core::agent::{AgentApi, AgentClient, EndpointStyle};
//! use handoff_core::Mode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let agent = AgentClient::new("http://localhost:3128", EndpointStyle::LinkCollector)?;
//! agent.ping(Duration::from_millis(500)).await?;
//! agent
//!     .submit("https://example.com/file.iso", Mode::Auto, Duration::from_secs(10))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{ADD_AND_START_PATH, ADD_LINKS_PATH, AgentClient, FLASH_ADD_PATH, PING_PATH};
pub use error::AgentError;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;

use crate::mode::Mode;

/// Which add endpoint family the agent exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EndpointStyle {
    /// `GET /linkcollector/addLinks[AndStartDownload]?links=...`
    #[default]
    LinkCollector,
    /// `POST /flash/add` with form fields `urls` and `autostart`.
    Flash,
}

impl FromStr for EndpointStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "link-collector" => Ok(Self::LinkCollector),
            "flash" => Ok(Self::Flash),
            other => Err(format!(
                "unknown endpoint style '{other}' (expected link-collector or flash)"
            )),
        }
    }
}

impl fmt::Display for EndpointStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LinkCollector => "link-collector",
            Self::Flash => "flash",
        })
    }
}

/// Operations the engine needs from the agent.
///
/// Implementations must honour `timeout` and report every failure (refused
/// connection, timeout, non-2xx status) as an error.
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Liveness probe.
    async fn ping(&self, timeout: Duration) -> Result<(), AgentError>;

    /// Hands `link` to the agent, started or not depending on `mode`.
    async fn submit(&self, link: &str, mode: Mode, timeout: Duration) -> Result<(), AgentError>;
}
