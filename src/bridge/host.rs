//! Browser capabilities backed by native-messaging commands.
//!
//! Every call becomes a [`Command`] frame with a fresh request id and waits
//! for the matching [`Reply`]. A reply that never comes counts as a failed
//! browser call after the reply timeout.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use super::codec;
use super::message::{Command, Outgoing, Reply, RequestId};
use crate::constants::HOST_REPLY_TIMEOUT;
use crate::host::{BrowserDownloads, DownloadId, HostError, HostUi, SuspendStrategy};
use crate::mode::Mode;

/// Request/reply correlating adapter for the browser on the other end of the pipe.
#[derive(Debug)]
pub struct BridgeHost {
    strategy: SuspendStrategy,
    reply_timeout: Duration,
    next_request: AtomicU64,
    pending: DashMap<RequestId, oneshot::Sender<Reply>>,
    frames: mpsc::Sender<Vec<u8>>,
    closed: AtomicBool,
}

impl BridgeHost {
    /// Creates the adapter; encoded frames are handed to `frames` for the writer task.
    #[must_use]
    pub fn new(strategy: SuspendStrategy, frames: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            strategy,
            reply_timeout: HOST_REPLY_TIMEOUT,
            next_request: AtomicU64::new(1),
            pending: DashMap::new(),
            frames,
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Routes a reply to its waiting call. Returns `false` for unknown or late replies.
    pub fn complete(&self, reply: Reply) -> bool {
        match self.pending.remove(&reply.request_id) {
            Some((_, waiter)) => waiter.send(reply).is_ok(),
            None => {
                debug!(request_id = reply.request_id, "reply for unknown request");
                false
            }
        }
    }

    /// Fails every waiting call and refuses new ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pending.clear();
    }

    /// Number of calls waiting for a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    async fn call(&self, command: Command) -> Result<(), HostError> {
        let operation = command.name();
        if self.closed.load(Ordering::SeqCst) {
            return Err(HostError::Disconnected { operation });
        }

        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let frame = codec::encode(&Outgoing::Command {
            request_id,
            command,
        })
        .map_err(|e| HostError::Unsendable {
            operation,
            message: e.to_string(),
        })?;

        let (waiter, reply) = oneshot::channel();
        self.pending.insert(request_id, waiter);
        // `close` may have cleared the table before the insert.
        if self.closed.load(Ordering::SeqCst) {
            self.pending.remove(&request_id);
            return Err(HostError::Disconnected { operation });
        }
        trace!(request_id, operation, "sending command");
        if self.frames.send(frame).await.is_err() {
            self.pending.remove(&request_id);
            return Err(HostError::Disconnected { operation });
        }

        match tokio::time::timeout(self.reply_timeout, reply).await {
            Ok(Ok(reply)) if reply.ok => Ok(()),
            Ok(Ok(reply)) => Err(HostError::rejected(
                operation,
                reply.error.unwrap_or_else(|| "unspecified error".to_string()),
            )),
            Ok(Err(_)) => Err(HostError::Disconnected { operation }),
            Err(_) => {
                self.pending.remove(&request_id);
                Err(HostError::Timeout { operation })
            }
        }
    }
}

#[async_trait]
impl BrowserDownloads for BridgeHost {
    fn strategy(&self) -> SuspendStrategy {
        self.strategy
    }

    async fn cancel(&self, id: DownloadId) -> Result<(), HostError> {
        self.call(Command::Cancel { id }).await
    }

    async fn erase(&self, id: DownloadId) -> Result<(), HostError> {
        self.call(Command::Erase { id }).await
    }

    async fn pause(&self, id: DownloadId) -> Result<(), HostError> {
        self.call(Command::Pause { id }).await
    }

    async fn resume(&self, id: DownloadId) -> Result<(), HostError> {
        self.call(Command::Resume { id }).await
    }

    async fn download(&self, url: &str, filename: Option<&str>) -> Result<(), HostError> {
        self.call(Command::Download {
            url: url.to_string(),
            filename: filename.map(str::to_string),
        })
        .await
    }

    async fn set_created_listener(&self, attached: bool) -> Result<(), HostError> {
        self.call(Command::SetListener { attached }).await
    }
}

#[async_trait]
impl HostUi for BridgeHost {
    async fn show_mode(&self, mode: Mode) -> Result<(), HostError> {
        self.call(Command::SetIndicator {
            icon: mode.icon().to_string(),
            title: mode.title().to_string(),
        })
        .await
    }

    async fn notify(&self, title: &str, message: &str) -> Result<(), HostError> {
        self.call(Command::Notify {
            title: title.to_string(),
            message: message.to_string(),
        })
        .await
    }
}
