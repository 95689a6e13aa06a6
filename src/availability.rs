//! Agent availability tracking.
//!
//! Two policies are supported; a running instance uses exactly one:
//!
//! - [`AvailabilityPolicy::FailureCooldown`]: the agent is assumed available
//!   until a failure is observed, then assumed down for [`FAILURE_COOLDOWN`].
//!   The cooldown lapses lazily on the next check. Outside the cooldown a
//!   quick ping still runs before every interception.
//! - [`AvailabilityPolicy::PeriodicProbe`]: the result of an explicit probe
//!   is cached for [`PROBE_INTERVAL`]; an older result triggers a new probe.
//!
//! Network errors, non-2xx responses and timeouts all count as "unavailable".
//! A check never waits longer than the policy's probe timeout.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::agent::AgentApi;
use crate::constants::{FAILURE_COOLDOWN, PROBE_INTERVAL, PROBE_TIMEOUT, QUICK_PING_TIMEOUT};

/// How availability is decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AvailabilityPolicy {
    /// Assume available; back off for a cooldown after a failure.
    #[default]
    FailureCooldown,
    /// Re-probe whenever the cached probe result is older than the interval.
    PeriodicProbe,
}

impl FromStr for AvailabilityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cooldown" => Ok(Self::FailureCooldown),
            "probe" => Ok(Self::PeriodicProbe),
            other => Err(format!(
                "unknown availability policy '{other}' (expected cooldown or probe)"
            )),
        }
    }
}

impl fmt::Display for AvailabilityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FailureCooldown => "cooldown",
            Self::PeriodicProbe => "probe",
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct State {
    available: bool,
    /// Time of the last failure (cooldown) or the last probe result (probe).
    last_event: Option<Instant>,
}

/// Tracks whether the agent is currently reachable.
#[derive(Debug)]
pub struct AvailabilityMonitor {
    policy: AvailabilityPolicy,
    window: Duration,
    probe_timeout: Duration,
    state: Mutex<State>,
}

impl AvailabilityMonitor {
    /// Creates a monitor with the policy's default window and probe timeout.
    #[must_use]
    pub fn new(policy: AvailabilityPolicy) -> Self {
        let (window, probe_timeout) = match policy {
            AvailabilityPolicy::FailureCooldown => (FAILURE_COOLDOWN, QUICK_PING_TIMEOUT),
            AvailabilityPolicy::PeriodicProbe => (PROBE_INTERVAL, PROBE_TIMEOUT),
        };
        Self::with_timing(policy, window, probe_timeout)
    }

    #[must_use]
    pub fn with_timing(policy: AvailabilityPolicy, window: Duration, probe_timeout: Duration) -> Self {
        Self {
            policy,
            window,
            probe_timeout,
            state: Mutex::new(State {
                available: true,
                last_event: None,
            }),
        }
    }

    #[must_use]
    pub fn policy(&self) -> AvailabilityPolicy {
        self.policy
    }

    /// True while a marked failure is younger than the cooldown window.
    ///
    /// Once the window has elapsed the state is reset to available.
    #[must_use]
    pub fn is_in_cooldown(&self) -> bool {
        let mut state = self.lock();
        let last_event = state.last_event;
        match last_event {
            Some(at) if !state.available => {
                if at.elapsed() < self.window {
                    true
                } else {
                    state.available = true;
                    state.last_event = None;
                    false
                }
            }
            _ => false,
        }
    }

    /// Cached probe result, if still younger than the probe interval.
    #[must_use]
    pub fn cached(&self) -> Option<bool> {
        let state = self.lock();
        state
            .last_event
            .filter(|at| at.elapsed() < self.window)
            .map(|_| state.available)
    }

    /// Current belief without probing.
    #[must_use]
    pub fn reports_available(&self) -> bool {
        match self.policy {
            AvailabilityPolicy::FailureCooldown => !self.is_in_cooldown(),
            AvailabilityPolicy::PeriodicProbe => self.cached().unwrap_or(true),
        }
    }

    /// Records a failed call to the agent.
    pub fn mark_failed(&self) {
        let mut state = self.lock();
        if state.available {
            info!(policy = %self.policy, "agent marked unavailable");
        }
        state.available = false;
        state.last_event = Some(Instant::now());
    }

    /// Records a successful call to the agent.
    pub fn mark_succeeded(&self) {
        let mut state = self.lock();
        state.available = true;
        state.last_event = match self.policy {
            AvailabilityPolicy::FailureCooldown => None,
            AvailabilityPolicy::PeriodicProbe => Some(Instant::now()),
        };
    }

    /// Forgets everything and assumes the agent is available.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.available = true;
        state.last_event = None;
    }

    /// Decides whether an interception should be attempted right now.
    ///
    /// May run one probe against `agent`, bounded by the probe timeout.
    #[instrument(level = "debug", skip(self, agent), fields(policy = %self.policy))]
    pub async fn check(&self, agent: &dyn AgentApi) -> bool {
        match self.policy {
            AvailabilityPolicy::FailureCooldown => {
                if self.is_in_cooldown() {
                    debug!("agent in failure cooldown");
                    return false;
                }
            }
            AvailabilityPolicy::PeriodicProbe => {
                if let Some(available) = self.cached() {
                    debug!(available, "using cached probe result");
                    return available;
                }
            }
        }

        let alive = self.probe(agent).await;
        if alive {
            self.mark_succeeded();
        } else {
            self.mark_failed();
        }
        alive
    }

    async fn probe(&self, agent: &dyn AgentApi) -> bool {
        match tokio::time::timeout(self.probe_timeout, agent.ping(self.probe_timeout)).await {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                debug!(error = %error, "agent probe failed");
                false
            }
            Err(_) => {
                debug!(timeout_ms = self.probe_timeout.as_millis(), "agent probe timed out");
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
