//! Interception decision engine.
//!
//! For every download-created event the engine decides whether the download
//! goes to the agent or stays with the browser:
//!
//! ```text
//! Observed ─► Eligible? ─► AvailabilityChecked ─► Intercepted ─► Submitted
//!    │            │                │                    │
//!    └────────────┴────────────────┴─► PassedThrough    └─► FallbackRecovered
//! ```
//!
//! Each event is processed linearly by one task. Different downloads may be
//! in flight at the same time; the shared tables are concurrent maps and no
//! lock is held across an await point. A task that has started runs to
//! completion with the mode it observed first, even if the mode is toggled
//! meanwhile.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use handoff_core::engine::{EngineSettings, InterceptionEngine};
//! use handoff_core::host::{BrowserDownloads, DownloadItem, HostUi};
//! use handoff_core::agent::AgentClient;
//! use handoff_core::{AvailabilityPolicy, SharedMode};
//!
//! # async fn example(
//! #     browser: Arc<dyn BrowserDownloads>,
//! #     ui: Arc<dyn HostUi>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let agent = Arc::new(AgentClient::with_defaults()?);
//! let engine = InterceptionEngine::new(
//!     browser,
//!     ui,
//!     agent,
//!     Arc::new(SharedMode::default()),
//!     AvailabilityPolicy::FailureCooldown,
//!     EngineSettings::default(),
//! );
//! let outcome = engine
//!     .handle_download_created(&DownloadItem::new(1, "https://example.com/file.iso"))
//!     .await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::agent::{AgentApi, AgentError};
use crate::availability::{AvailabilityMonitor, AvailabilityPolicy};
use crate::constants::SUBMIT_TIMEOUT;
use crate::fallback::{FallbackMarkers, PendingDownloads};
use crate::filename::{filename_from_url, reissue_filename};
use crate::host::{BrowserDownloads, DownloadItem, HostError, HostUi, SuspendStrategy};
use crate::mode::{Mode, SharedMode};
use crate::redirect::{RedirectEvent, RedirectTracker};

/// Schemes the agent can fetch on its own.
const ELIGIBLE_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// When availability is consulted relative to suspending the native download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckOrder {
    /// Check first; an unavailable agent leaves the native download untouched.
    #[default]
    CheckFirst,
    /// Suspend first to stop bandwidth use; undo the suspension if unavailable.
    InterceptFirst,
}

impl FromStr for CheckOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check-first" => Ok(Self::CheckFirst),
            "intercept-first" => Ok(Self::InterceptFirst),
            other => Err(format!(
                "unknown check order '{other}' (expected check-first or intercept-first)"
            )),
        }
    }
}

impl fmt::Display for CheckOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CheckFirst => "check-first",
            Self::InterceptFirst => "intercept-first",
        })
    }
}

/// Engine tuning.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub check_order: CheckOrder,
    /// Submission timeout; availability has always been checked before.
    pub submit_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            check_order: CheckOrder::default(),
            submit_timeout: SUBMIT_TIMEOUT,
        }
    }
}

/// Why a download was left to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    Disabled,
    /// Scheme the agent cannot fetch (blob, data, file, internal pages, ...).
    Ineligible,
    /// The event was caused by our own fallback reissue.
    OwnFallback,
    /// Another event for the same download id is still being decided.
    AlreadyPending,
    /// Agent unavailable, native download never touched.
    AgentUnavailable,
}

/// Terminal state of one download-created event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptOutcome {
    /// The agent accepted the link; the native download is gone.
    Submitted,
    /// The browser keeps the download untouched.
    PassedThrough(PassReason),
    /// Interception was undone; the browser downloads it after all.
    FallbackRecovered,
    /// Suspending the native download failed; nothing else was done.
    Aborted,
    /// The native download was cancelled and could not be restarted. The user was notified.
    Lost,
}

/// Decides, per download, between the agent and the browser.
pub struct InterceptionEngine {
    browser: Arc<dyn BrowserDownloads>,
    ui: Arc<dyn HostUi>,
    agent: Arc<dyn AgentApi>,
    mode: Arc<SharedMode>,
    redirects: RedirectTracker,
    availability: Arc<AvailabilityMonitor>,
    markers: FallbackMarkers,
    pending: PendingDownloads,
    settings: EngineSettings,
}

impl fmt::Debug for InterceptionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionEngine")
            .field("mode", &self.mode.get())
            .field("strategy", &self.browser.strategy())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl InterceptionEngine {
    #[must_use]
    pub fn new(
        browser: Arc<dyn BrowserDownloads>,
        ui: Arc<dyn HostUi>,
        agent: Arc<dyn AgentApi>,
        mode: Arc<SharedMode>,
        policy: AvailabilityPolicy,
        settings: EngineSettings,
    ) -> Self {
        Self::with_monitor(
            browser,
            ui,
            agent,
            mode,
            Arc::new(AvailabilityMonitor::new(policy)),
            settings,
        )
    }

    /// Like [`new`](Self::new), with an externally built availability monitor.
    #[must_use]
    pub fn with_monitor(
        browser: Arc<dyn BrowserDownloads>,
        ui: Arc<dyn HostUi>,
        agent: Arc<dyn AgentApi>,
        mode: Arc<SharedMode>,
        availability: Arc<AvailabilityMonitor>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            browser,
            ui,
            agent,
            mode,
            redirects: RedirectTracker::new(),
            availability,
            markers: FallbackMarkers::new(),
            pending: PendingDownloads::new(),
            settings,
        }
    }

    #[must_use]
    pub fn mode(&self) -> &Arc<SharedMode> {
        &self.mode
    }

    #[must_use]
    pub fn availability(&self) -> &Arc<AvailabilityMonitor> {
        &self.availability
    }

    #[must_use]
    pub fn agent(&self) -> &Arc<dyn AgentApi> {
        &self.agent
    }

    #[must_use]
    pub fn browser(&self) -> &Arc<dyn BrowserDownloads> {
        &self.browser
    }

    #[must_use]
    pub fn ui(&self) -> &Arc<dyn HostUi> {
        &self.ui
    }

    #[must_use]
    pub fn redirects(&self) -> &RedirectTracker {
        &self.redirects
    }

    #[must_use]
    pub fn markers(&self) -> &FallbackMarkers {
        &self.markers
    }

    /// Feeds a redirect observed by the browser's network layer.
    pub fn observe_redirect(&self, event: &RedirectEvent) {
        self.redirects.record(event);
    }

    /// Runs the decision for one download-created event.
    #[instrument(skip(self, item), fields(id = item.id, url = %item.url))]
    pub async fn handle_download_created(&self, item: &DownloadItem) -> InterceptOutcome {
        let mode = self.mode.get();
        if !mode.intercepts() {
            return InterceptOutcome::PassedThrough(PassReason::Disabled);
        }

        if !is_eligible_url(&item.url) {
            debug!("scheme not handled by agent");
            return InterceptOutcome::PassedThrough(PassReason::Ineligible);
        }

        let original = self.redirects.resolve_original(&item.url);
        if self.markers.consume(&item.url, &original) {
            debug!("download is our own fallback reissue");
            return InterceptOutcome::PassedThrough(PassReason::OwnFallback);
        }

        let Some(_claim) = self.pending.claim(item.id) else {
            debug!("download already being processed");
            return InterceptOutcome::PassedThrough(PassReason::AlreadyPending);
        };

        let outcome = self.intercept(item, &original, mode).await;
        info!(?outcome, original = %original, "download handled");
        outcome
    }

    async fn intercept(&self, item: &DownloadItem, original: &str, mode: Mode) -> InterceptOutcome {
        match self.settings.check_order {
            CheckOrder::CheckFirst => {
                if !self.availability.check(self.agent.as_ref()).await {
                    return InterceptOutcome::PassedThrough(PassReason::AgentUnavailable);
                }
                if let Err(error) = self.suspend(item).await {
                    warn!(error = %error, "could not suspend native download; leaving it alone");
                    return InterceptOutcome::Aborted;
                }
            }
            CheckOrder::InterceptFirst => {
                if let Err(error) = self.suspend(item).await {
                    warn!(error = %error, "could not suspend native download; leaving it alone");
                    return InterceptOutcome::Aborted;
                }
                if !self.availability.check(self.agent.as_ref()).await {
                    info!("agent unavailable; handing download back to browser");
                    return self.recover(item, original).await;
                }
            }
        }

        match self.submit(original, mode).await {
            Ok(()) => {
                self.availability.mark_succeeded();
                self.finalize(item).await;
                InterceptOutcome::Submitted
            }
            Err(error) => {
                warn!(error = %error, "agent submission failed; falling back to browser");
                self.availability.mark_failed();
                self.recover(item, original).await
            }
        }
    }

    async fn submit(&self, link: &str, mode: Mode) -> Result<(), AgentError> {
        let timeout = self.settings.submit_timeout;
        tokio::time::timeout(timeout, self.agent.submit(link, mode, timeout))
            .await
            .unwrap_or_else(|_| Err(AgentError::timeout(link)))
    }

    /// Stops the native transfer. Errors mean the event is abandoned.
    async fn suspend(&self, item: &DownloadItem) -> Result<(), HostError> {
        match self.browser.strategy() {
            SuspendStrategy::Pause => self.browser.pause(item.id).await,
            SuspendStrategy::Cancel => {
                self.browser.cancel(item.id).await?;
                // The transfer is already stopped; a stale list entry is harmless.
                if let Err(error) = self.browser.erase(item.id).await {
                    debug!(error = %error, "erase after cancel failed");
                }
                Ok(())
            }
        }
    }

    /// Turns a successful hand-off into a discarded native download.
    async fn finalize(&self, item: &DownloadItem) {
        if self.browser.strategy() == SuspendStrategy::Cancel {
            return;
        }
        if let Err(error) = self.browser.cancel(item.id).await {
            warn!(error = %error, "could not cancel paused download after hand-off");
            return;
        }
        if let Err(error) = self.browser.erase(item.id).await {
            debug!(error = %error, "erase after cancel failed");
        }
    }

    /// Gives the download back to the browser.
    async fn recover(&self, item: &DownloadItem, original: &str) -> InterceptOutcome {
        if self.browser.strategy() == SuspendStrategy::Pause {
            match self.browser.resume(item.id).await {
                Ok(()) => return InterceptOutcome::FallbackRecovered,
                Err(error) => {
                    warn!(error = %error, "resume failed; restarting download instead");
                }
            }
        }
        self.reissue(item, original).await
    }

    async fn reissue(&self, item: &DownloadItem, original: &str) -> InterceptOutcome {
        let filename = reissue_filename(item.filename.as_deref(), &item.url)
            .or_else(|| filename_from_url(original));

        self.markers.mark([item.url.as_str(), original]);
        match self.browser.download(original, filename.as_deref()).await {
            Ok(()) => {
                info!(filename = filename.as_deref().unwrap_or(""), "download restarted in browser");
                InterceptOutcome::FallbackRecovered
            }
            Err(error) => {
                warn!(error = %error, "could not restart download in browser");
                let message = format!(
                    "The download manager did not accept this download and the browser could not restart it. Please retry manually: {original}"
                );
                if let Err(error) = self.ui.notify("Download failed", &message).await {
                    debug!(error = %error, "notification failed");
                }
                InterceptOutcome::Lost
            }
        }
    }
}

/// Whether the agent can fetch `url` itself.
///
/// In-memory (`blob:`, `data:`), local (`file:`), script and browser or
/// extension internal URLs are not; neither is anything that does not parse.
#[must_use]
pub fn is_eligible_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| ELIGIBLE_SCHEMES.contains(&parsed.scheme()))
}
