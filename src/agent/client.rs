//! HTTP client for the agent's local API.
//!
//! Every call carries its own timeout; the caller picks it depending on
//! whether availability was already checked. Requests are independent, the
//! pooled connection inside [`reqwest::Client`] is an implementation detail.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use url::Url;

use super::error::AgentError;
use super::{AgentApi, EndpointStyle};
use crate::constants::{AGENT_CONNECT_TIMEOUT, DEFAULT_AGENT_URL};
use crate::mode::Mode;

/// Liveness probe path.
pub const PING_PATH: &str = "/device/ping";
/// Add links without starting them.
pub const ADD_LINKS_PATH: &str = "/linkcollector/addLinks";
/// Add links and start downloading.
pub const ADD_AND_START_PATH: &str = "/linkcollector/addLinksAndStartDownload";
/// Alternate form-based add endpoint.
pub const FLASH_ADD_PATH: &str = "/flash/add";

/// Client for the agent's HTTP API.
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: Client,
    base_url: Url,
    style: EndpointStyle,
}

impl AgentClient {
    /// Creates a client for the agent at `base_url`.
    ///
    /// System proxies are bypassed; the agent always listens locally.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidUrl`] for an unparseable or non-HTTP base
    /// URL and [`AgentError::Client`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, style: EndpointStyle) -> Result<Self, AgentError> {
        let base_url = Url::parse(base_url).map_err(|_| AgentError::invalid_url(base_url))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(AgentError::invalid_url(base_url.as_str()));
        }

        let client = Client::builder()
            .connect_timeout(AGENT_CONNECT_TIMEOUT)
            .user_agent(user_agent())
            .no_proxy()
            .build()
            .map_err(AgentError::Client)?;

        Ok(Self {
            client,
            base_url,
            style,
        })
    }

    /// Creates a client for [`DEFAULT_AGENT_URL`] using the link-collector endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Client`] if the HTTP client cannot be built.
    pub fn with_defaults() -> Result<Self, AgentError> {
        Self::new(DEFAULT_AGENT_URL, EndpointStyle::default())
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn style(&self) -> EndpointStyle {
        self.style
    }

    /// Builds the link-collector URL for `link`.
    ///
    /// The link is percent-encoded the way the agent's own browser
    /// integrations send it; the remaining parameters are sent empty.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidUrl`] if the result does not parse.
    pub fn link_collector_url(&self, link: &str, mode: Mode) -> Result<Url, AgentError> {
        let path = if mode.autostart() {
            ADD_AND_START_PATH
        } else {
            ADD_LINKS_PATH
        };
        let raw = format!(
            "{}?links={}&packageName=&extractPassword=&downloadPassword=",
            self.endpoint(path)?,
            urlencoding::encode(link)
        );
        Url::parse(&raw).map_err(|_| AgentError::invalid_url(raw))
    }

    fn endpoint(&self, path: &str) -> Result<Url, AgentError> {
        self.base_url
            .join(path)
            .map_err(|_| AgentError::invalid_url(format!("{}{path}", self.base_url)))
    }

    #[instrument(level = "debug", skip(self), fields(link = %link))]
    async fn submit_link_collector(
        &self,
        link: &str,
        mode: Mode,
        timeout: Duration,
    ) -> Result<(), AgentError> {
        let url = self.link_collector_url(link, mode)?;
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AgentError::network(url.as_str(), e))?;
        check_status(url.as_str(), response.status())
    }

    #[instrument(level = "debug", skip(self), fields(link = %link))]
    async fn submit_flash(&self, link: &str, mode: Mode, timeout: Duration) -> Result<(), AgentError> {
        let url = self.endpoint(FLASH_ADD_PATH)?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("urls", link)
            .append_pair("autostart", if mode.autostart() { "1" } else { "0" })
            .finish();
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AgentError::network(url.as_str(), e))?;
        check_status(url.as_str(), response.status())
    }
}

#[async_trait]
impl AgentApi for AgentClient {
    #[instrument(level = "debug", skip(self))]
    async fn ping(&self, timeout: Duration) -> Result<(), AgentError> {
        let url = self.endpoint(PING_PATH)?;
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AgentError::network(url.as_str(), e))?;
        check_status(url.as_str(), response.status())
    }

    async fn submit(&self, link: &str, mode: Mode, timeout: Duration) -> Result<(), AgentError> {
        match self.style {
            EndpointStyle::LinkCollector => self.submit_link_collector(link, mode, timeout).await,
            EndpointStyle::Flash => self.submit_flash(link, mode, timeout).await,
        }
    }
}

fn check_status(url: &str, status: reqwest::StatusCode) -> Result<(), AgentError> {
    if status.is_success() {
        debug!(url, status = status.as_u16(), "agent accepted request");
        Ok(())
    } else {
        Err(AgentError::http_status(url, status.as_u16()))
    }
}

fn user_agent() -> String {
    format!("handoff/{}", env!("CARGO_PKG_VERSION"))
}
