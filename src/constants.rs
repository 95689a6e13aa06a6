//! Timing windows, timeouts and defaults shared across the crate.

use std::time::Duration;

/// Default base URL of the agent's local HTTP API.
pub const DEFAULT_AGENT_URL: &str = "http://localhost:3128";

/// How long a recorded redirect edge stays resolvable.
pub const REDIRECT_TTL: Duration = Duration::from_secs(60);

/// How long a fallback marker suppresses the matching download-created event.
pub const FALLBACK_MARKER_TTL: Duration = Duration::from_secs(10);

/// Window after a failure during which the agent is assumed unavailable.
pub const FAILURE_COOLDOWN: Duration = Duration::from_secs(30);

/// Maximum age of a cached probe result (periodic-probe policy).
pub const PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Timeout of the cheap ping run right before a submission (cooldown policy).
pub const QUICK_PING_TIMEOUT: Duration = Duration::from_millis(500);

/// Timeout of a fresh liveness probe (periodic-probe policy).
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Submission timeout when availability was checked just before.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Submission timeout for direct (context menu / CLI) submissions.
pub const DIRECT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum wait for the browser to answer a bridged command.
pub const HOST_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP connect timeout for the agent client. The agent is local, so this is short.
pub const AGENT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
