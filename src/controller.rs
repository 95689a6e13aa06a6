//! Mode controller: startup, toolbar toggle and direct submission.
//!
//! The controller is the only writer of the shared [`Mode`]. Each transition
//! updates, in order, the shared mode, the availability monitor, the
//! download-created listener, the store and the toolbar indicator.
//! Transitions are serialized so that two fast clicks always advance the
//! cycle by two.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::agent::{AgentApi, AgentError};
use crate::availability::AvailabilityMonitor;
use crate::constants::DIRECT_SUBMIT_TIMEOUT;
use crate::engine::{InterceptionEngine, is_eligible_url};
use crate::host::{BrowserDownloads, HostUi};
use crate::mode::{Mode, SharedMode};
use crate::store::ModeStore;

/// Owns mode transitions and the user-initiated submission path.
pub struct ModeController {
    mode: Arc<SharedMode>,
    availability: Arc<AvailabilityMonitor>,
    agent: Arc<dyn AgentApi>,
    browser: Arc<dyn BrowserDownloads>,
    ui: Arc<dyn HostUi>,
    store: Arc<dyn ModeStore>,
    transition: Mutex<()>,
    direct_timeout: Duration,
}

impl fmt::Debug for ModeController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeController")
            .field("mode", &self.mode.get())
            .field("direct_timeout", &self.direct_timeout)
            .finish_non_exhaustive()
    }
}

impl ModeController {
    /// Builds a controller sharing the engine's mode, monitor and host handles.
    #[must_use]
    pub fn new(engine: &InterceptionEngine, store: Arc<dyn ModeStore>) -> Self {
        Self {
            mode: Arc::clone(engine.mode()),
            availability: Arc::clone(engine.availability()),
            agent: Arc::clone(engine.agent()),
            browser: Arc::clone(engine.browser()),
            ui: Arc::clone(engine.ui()),
            store,
            transition: Mutex::new(()),
            direct_timeout: DIRECT_SUBMIT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_direct_timeout(mut self, timeout: Duration) -> Self {
        self.direct_timeout = timeout;
        self
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode.get()
    }

    /// Loads the persisted mode into the shared mode.
    ///
    /// Must complete before the first download event is handled; no host
    /// call is made.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Mode {
        let _guard = self.transition.lock().await;
        let mode = self.store.load().await;
        self.mode.set(mode);
        info!(%mode, "mode restored");
        mode
    }

    /// Brings listener and indicator in line with the current mode.
    #[instrument(skip(self))]
    pub async fn announce(&self) -> Mode {
        let _guard = self.transition.lock().await;
        let mode = self.mode.get();
        self.apply(mode).await;
        mode
    }

    /// [`restore`](Self::restore) followed by [`announce`](Self::announce).
    pub async fn start(&self) -> Mode {
        self.restore().await;
        self.announce().await
    }

    /// Advances Disabled → Manual → Auto → Disabled and persists the result.
    #[instrument(skip(self))]
    pub async fn toggle(&self) -> Mode {
        let _guard = self.transition.lock().await;
        let mode = self.mode.get().next();
        self.transition_to(mode).await;
        mode
    }

    /// Jumps straight to `mode`.
    #[instrument(skip(self))]
    pub async fn set_mode(&self, mode: Mode) -> Mode {
        let _guard = self.transition.lock().await;
        self.transition_to(mode).await;
        mode
    }

    async fn transition_to(&self, mode: Mode) {
        self.mode.set(mode);
        self.availability.reset();
        self.apply(mode).await;
        match self.store.save(mode).await {
            Ok(()) => {}
            Err(error) if error.is_busy_or_locked() => {
                warn!(error = %error, %mode, "settings database busy; mode not persisted");
            }
            Err(error) => error!(error = %error, %mode, "could not persist mode"),
        }
        info!(%mode, "mode changed");
    }

    async fn apply(&self, mode: Mode) {
        if let Err(error) = self.browser.set_created_listener(mode.intercepts()).await {
            warn!(error = %error, %mode, "could not update download listener");
        }
        if let Err(error) = self.ui.show_mode(mode).await {
            warn!(error = %error, %mode, "could not update indicator");
        }
    }

    /// Sends `url` straight to the agent, as from a context-menu action.
    ///
    /// No availability pre-check is made. The user is notified on failure.
    ///
    /// # Errors
    ///
    /// Returns the [`AgentError`] that made the submission fail.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn send_link(&self, url: &str) -> Result<(), AgentError> {
        let result = self.submit_direct(url).await;
        match &result {
            Ok(()) => info!("link sent to agent"),
            Err(error) => {
                warn!(error = %error, "direct submission failed");
                let message = format!("Could not send the link to the download manager: {url}");
                if let Err(error) = self.ui.notify("Send failed", &message).await {
                    warn!(error = %error, "notification failed");
                }
            }
        }
        result
    }

    async fn submit_direct(&self, url: &str) -> Result<(), AgentError> {
        if !is_eligible_url(url) {
            return Err(AgentError::invalid_url(url));
        }

        let mode = self.mode.get();
        let timeout = self.direct_timeout;
        let result = tokio::time::timeout(timeout, self.agent.submit(url, mode, timeout))
            .await
            .unwrap_or_else(|_| Err(AgentError::timeout(url)));

        match result {
            Ok(()) => self.availability.mark_succeeded(),
            Err(_) => self.availability.mark_failed(),
        }
        result
    }
}
