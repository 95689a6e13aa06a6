//! Error types for talking to the agent.
//!
//! Callers only care that a call failed; the variants exist so logs say why.

use thiserror::Error;

/// Errors from the agent's HTTP API.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Connection refused, DNS failure, reset connection and the like.
    #[error("network error calling agent at {url}: {source}")]
    Network {
        /// Request URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// No response within the call's timeout.
    #[error("timeout calling agent at {url}")]
    Timeout {
        /// Request URL.
        url: String,
    },

    /// The agent answered with a non-success status.
    #[error("agent returned HTTP {status} for {url}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The configured base URL and path do not form a valid URL.
    #[error("invalid agent URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build agent HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl AgentError {
    /// Creates a network error, folding reqwest timeouts into [`AgentError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}
