//! Recording fakes for the browser, the toolbar and the agent.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use handoff_core::{
    AgentApi, AgentError, AvailabilityPolicy, BrowserDownloads, CheckOrder, DownloadId,
    EngineSettings, HostError, HostUi, InterceptionEngine, Mode, SharedMode, SuspendStrategy,
};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCall {
    Cancel(DownloadId),
    Erase(DownloadId),
    Pause(DownloadId),
    Resume(DownloadId),
    Download {
        url: String,
        filename: Option<String>,
    },
    Listener(bool),
}

pub struct FakeBrowser {
    strategy: SuspendStrategy,
    calls: Mutex<Vec<BrowserCall>>,
    pub fail_cancel: AtomicBool,
    pub fail_pause: AtomicBool,
    pub fail_resume: AtomicBool,
    pub fail_download: AtomicBool,
}

impl FakeBrowser {
    pub fn new(strategy: SuspendStrategy) -> Arc<Self> {
        Arc::new(Self {
            strategy,
            calls: Mutex::new(Vec::new()),
            fail_cancel: AtomicBool::new(false),
            fail_pause: AtomicBool::new(false),
            fail_resume: AtomicBool::new(false),
            fail_download: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> Vec<BrowserCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: BrowserCall, fail: &AtomicBool, operation: &'static str) -> Result<(), HostError> {
        self.calls.lock().unwrap().push(call);
        if fail.load(Ordering::SeqCst) {
            Err(HostError::rejected(operation, "refused by test"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BrowserDownloads for FakeBrowser {
    fn strategy(&self) -> SuspendStrategy {
        self.strategy
    }

    async fn cancel(&self, id: DownloadId) -> Result<(), HostError> {
        self.record(BrowserCall::Cancel(id), &self.fail_cancel, "cancel")
    }

    async fn erase(&self, id: DownloadId) -> Result<(), HostError> {
        self.record(BrowserCall::Erase(id), &AtomicBool::new(false), "erase")
    }

    async fn pause(&self, id: DownloadId) -> Result<(), HostError> {
        self.record(BrowserCall::Pause(id), &self.fail_pause, "pause")
    }

    async fn resume(&self, id: DownloadId) -> Result<(), HostError> {
        self.record(BrowserCall::Resume(id), &self.fail_resume, "resume")
    }

    async fn download(&self, url: &str, filename: Option<&str>) -> Result<(), HostError> {
        self.record(
            BrowserCall::Download {
                url: url.to_string(),
                filename: filename.map(str::to_string),
            },
            &self.fail_download,
            "download",
        )
    }

    async fn set_created_listener(&self, attached: bool) -> Result<(), HostError> {
        self.record(BrowserCall::Listener(attached), &AtomicBool::new(false), "set_listener")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCall {
    ShowMode(Mode),
    Notify { title: String, message: String },
}

#[derive(Default)]
pub struct FakeUi {
    calls: Mutex<Vec<UiCall>>,
}

impl FakeUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<UiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, UiCall::Notify { .. }))
            .count()
    }
}

#[async_trait]
impl HostUi for FakeUi {
    async fn show_mode(&self, mode: Mode) -> Result<(), HostError> {
        self.calls.lock().unwrap().push(UiCall::ShowMode(mode));
        Ok(())
    }

    async fn notify(&self, title: &str, message: &str) -> Result<(), HostError> {
        self.calls.lock().unwrap().push(UiCall::Notify {
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

pub struct FakeAgent {
    pub alive: AtomicBool,
    pub accepts: AtomicBool,
    pings: AtomicUsize,
    submissions: Mutex<Vec<(String, Mode)>>,
    gate: Option<Semaphore>,
}

impl FakeAgent {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::with_state(true, true, None))
    }

    pub fn down() -> Arc<Self> {
        Arc::new(Self::with_state(false, false, None))
    }

    /// Answers pings but rejects every submission.
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self::with_state(true, false, None))
    }

    /// Healthy, but each submission waits for a permit from [`FakeAgent::release`].
    pub fn gated() -> Arc<Self> {
        Arc::new(Self::with_state(true, true, Some(Semaphore::new(0))))
    }

    fn with_state(alive: bool, accepts: bool, gate: Option<Semaphore>) -> Self {
        Self {
            alive: AtomicBool::new(alive),
            accepts: AtomicBool::new(accepts),
            pings: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            gate,
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<(String, Mode)> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentApi for FakeAgent {
    async fn ping(&self, _timeout: Duration) -> Result<(), AgentError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AgentError::http_status("http://localhost:3128/device/ping", 503))
        }
    }

    async fn submit(&self, link: &str, mode: Mode, _timeout: Duration) -> Result<(), AgentError> {
        self.submissions
            .lock()
            .unwrap()
            .push((link.to_string(), mode));
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.accepts.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AgentError::http_status(
                "http://localhost:3128/linkcollector/addLinks",
                500,
            ))
        }
    }
}

pub struct Harness {
    pub browser: Arc<FakeBrowser>,
    pub ui: Arc<FakeUi>,
    pub agent: Arc<FakeAgent>,
    pub engine: Arc<InterceptionEngine>,
}

impl Harness {
    pub fn new(
        strategy: SuspendStrategy,
        agent: Arc<FakeAgent>,
        mode: Mode,
        check_order: CheckOrder,
    ) -> Self {
        Self::with_policy(strategy, agent, mode, check_order, AvailabilityPolicy::FailureCooldown)
    }

    pub fn with_policy(
        strategy: SuspendStrategy,
        agent: Arc<FakeAgent>,
        mode: Mode,
        check_order: CheckOrder,
        policy: AvailabilityPolicy,
    ) -> Self {
        let browser = FakeBrowser::new(strategy);
        let ui = FakeUi::new();
        let engine = Arc::new(InterceptionEngine::new(
            browser.clone(),
            ui.clone(),
            agent.clone(),
            Arc::new(SharedMode::new(mode)),
            policy,
            EngineSettings {
                check_order,
                ..EngineSettings::default()
            },
        ));
        Self {
            browser,
            ui,
            agent,
            engine,
        }
    }
}
