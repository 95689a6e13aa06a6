//! Re-entrancy guards for the interception engine.
//!
//! [`FallbackMarkers`] remembers URLs the engine itself handed back to the
//! browser, so the download-created event caused by that reissue is let
//! through instead of being intercepted again. [`PendingDownloads`] keeps a
//! second event for a download id that is still being decided from starting
//! a parallel attempt.

use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::time::Instant;
use tracing::debug;

use crate::constants::FALLBACK_MARKER_TTL;
use crate::host::DownloadId;

/// URLs recently reissued to the browser's native downloader.
#[derive(Debug)]
pub struct FallbackMarkers {
    ttl: Duration,
    marked: DashMap<String, Instant>,
}

impl Default for FallbackMarkers {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackMarkers {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(FALLBACK_MARKER_TTL)
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            marked: DashMap::new(),
        }
    }

    /// Marks every given URL form as a pending reissue.
    pub fn mark<'a>(&self, urls: impl IntoIterator<Item = &'a str>) {
        let now = Instant::now();
        self.marked
            .retain(|_, marked_at| now.duration_since(*marked_at) < self.ttl);
        for url in urls {
            self.marked.insert(url.to_string(), now);
        }
    }

    /// Consumes the marker for either URL form.
    ///
    /// Returns `true` when the event belongs to one of our own reissues. Both
    /// forms are cleared so a later, user-initiated download of the same URL
    /// is intercepted normally.
    pub fn consume(&self, final_url: &str, original_url: &str) -> bool {
        let now = Instant::now();
        let live = |url: &str| {
            self.marked
                .get(url)
                .is_some_and(|marked_at| now.duration_since(*marked_at) < self.ttl)
        };
        let hit = live(final_url) || live(original_url);

        self.marked.remove(final_url);
        self.marked.remove(original_url);
        if hit {
            debug!(final_url, original_url, "consumed fallback marker");
        }
        hit
    }

    #[must_use]
    pub fn is_marked(&self, url: &str) -> bool {
        let now = Instant::now();
        self.marked
            .get(url)
            .is_some_and(|marked_at| now.duration_since(*marked_at) < self.ttl)
    }
}

/// Download ids whose interception decision is in flight.
#[derive(Debug, Default)]
pub struct PendingDownloads {
    ids: DashSet<DownloadId>,
}

impl PendingDownloads {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `id`. Returns `None` when another task already holds it.
    ///
    /// The claim is released when the returned guard drops, so every exit
    /// path of the decision releases it.
    #[must_use]
    pub fn claim(&self, id: DownloadId) -> Option<PendingGuard<'_>> {
        self.ids.insert(id).then_some(PendingGuard { owner: self, id })
    }
}

/// Releases a pending claim on drop.
#[derive(Debug)]
pub struct PendingGuard<'a> {
    owner: &'a PendingDownloads,
    id: DownloadId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.owner.ids.remove(&self.id);
    }
}
