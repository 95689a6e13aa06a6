//! Short-lived redirect bookkeeping.
//!
//! Download-created events only carry the final, post-redirect URL. Mirrors
//! and CDNs often hand out signed or expiring targets, so the agent gets the
//! URL the user actually clicked whenever it is still known.
//!
//! Edges live in a timestamped map and expire [`REDIRECT_TTL`] after they are
//! recorded. Expired entries are ignored on lookup and swept on the next write.
//!
//! # Example
//!
//! ```
//! use handoff_core::redirect::RedirectTracker;
//!
//! let tracker = RedirectTracker::new();
//! tracker.record_redirect("https://a.example/dl", "https://b.example/x");
//! tracker.record_redirect("https://b.example/x", "https://cdn.example/y");
//! assert_eq!(tracker.resolve_original("https://cdn.example/y"), "https://a.example/dl");
//! ```

use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::trace;

use crate::constants::REDIRECT_TTL;

/// Request type reported with a redirect, as the browser's web-request layer names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Xmlhttprequest,
    Media,
    Other,
    #[serde(other)]
    Unknown,
}

impl ResourceType {
    /// Top-level and frame navigations are page loads, not downloads.
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(self, Self::MainFrame | Self::SubFrame)
    }
}

/// A redirect observed by the browser's network layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectEvent {
    /// URL that answered with the redirect.
    pub url: String,
    /// Redirect target.
    pub redirect_url: String,
    /// Request type of the redirected request.
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone)]
struct RedirectEdge {
    original: String,
    recorded_at: Instant,
}

/// Maps post-redirect URLs back to the earliest known ancestor.
#[derive(Debug)]
pub struct RedirectTracker {
    ttl: Duration,
    edges: DashMap<String, RedirectEdge>,
}

impl Default for RedirectTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RedirectTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(REDIRECT_TTL)
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            edges: DashMap::new(),
        }
    }

    /// Records a browser redirect event. Document navigations are ignored.
    pub fn record(&self, event: &RedirectEvent) {
        if event.resource_type.is_document() {
            return;
        }
        self.record_redirect(&event.url, &event.redirect_url);
    }

    /// Records `from → to`, collapsing chains onto the first URL.
    pub fn record_redirect(&self, from: &str, to: &str) {
        let now = Instant::now();
        self.sweep(now);

        let original = self.resolve_at(from, now);
        trace!(from, to, original = %original, "recording redirect");
        self.edges.insert(
            to.to_string(),
            RedirectEdge {
                original,
                recorded_at: now,
            },
        );
    }

    /// Returns the tracked original for `url`, or `url` itself.
    #[must_use]
    pub fn resolve_original(&self, url: &str) -> String {
        self.resolve_at(url, Instant::now())
    }

    fn resolve_at(&self, url: &str, now: Instant) -> String {
        match self.edges.get(url) {
            Some(edge) if now.duration_since(edge.recorded_at) < self.ttl => edge.original.clone(),
            _ => url.to_string(),
        }
    }

    fn sweep(&self, now: Instant) {
        self.edges
            .retain(|_, edge| now.duration_since(edge.recorded_at) < self.ttl);
    }
}
