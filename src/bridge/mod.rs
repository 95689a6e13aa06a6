//! Native-messaging host: the browser talks to the engine over stdin/stdout.
//!
//! # Architecture
//!
//! - [`codec`] - Length-prefixed JSON framing
//! - [`message`] - Incoming events and outgoing commands
//! - [`BridgeHost`] - [`BrowserDownloads`](crate::host::BrowserDownloads) and
//!   [`HostUi`](crate::host::HostUi) over commands and replies
//! - [`Bridge`] - Reader loop, event dispatch and the writer task
//!
//! One task reads frames. Replies are routed inline to the waiting call;
//! every other event runs in its own task. One writer task owns the output
//! stream. The persisted mode is loaded before the first frame is read.
//! End of input stops the loop once in-flight events are done.

pub mod codec;
mod host;
pub mod message;

pub use host::BridgeHost;
pub use message::{Command, Incoming, Outgoing, Reply, RequestId};

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::controller::ModeController;
use crate::engine::InterceptionEngine;

/// Frames buffered between callers and the writer task.
pub const OUTGOING_QUEUE: usize = 64;

/// Errors on the native-messaging channel.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("native messaging I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("stream ended inside a frame")]
    Truncated,

    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wires the engine and controller to a native-messaging stream.
#[derive(Debug)]
pub struct Bridge {
    host: Arc<BridgeHost>,
    engine: Arc<InterceptionEngine>,
    controller: Arc<ModeController>,
}

impl Bridge {
    /// `host` must be the browser and UI handle the engine was built with.
    #[must_use]
    pub fn new(
        host: Arc<BridgeHost>,
        engine: Arc<InterceptionEngine>,
        controller: Arc<ModeController>,
    ) -> Self {
        Self {
            host,
            engine,
            controller,
        }
    }

    /// Serves until `reader` reaches end of stream.
    ///
    /// `frames` is the receiving end of the channel `host` was created with.
    /// The persisted mode is restored before reading starts. Listener and
    /// indicator updates run concurrently, since their calls need the reader
    /// loop to deliver the replies.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] when the input stream is broken or carries
    /// an oversized frame. Individual malformed messages are skipped.
    #[instrument(skip_all)]
    pub async fn run<R, W>(
        &self,
        mut reader: R,
        mut writer: W,
        mut frames: mpsc::Receiver<Vec<u8>>,
    ) -> Result<(), BridgeError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if let Err(error) = codec::write_frame(&mut writer, &frame).await {
                    warn!(error = %error, "could not write to browser; stopping writer");
                    break;
                }
            }
        });

        // Events already queued on the input must see the persisted mode.
        self.controller.restore().await;

        let mut tasks = JoinSet::new();
        {
            let controller = Arc::clone(&self.controller);
            tasks.spawn(async move {
                controller.announce().await;
            });
        }

        let result = loop {
            match codec::read_frame(&mut reader).await {
                Ok(Some(payload)) => match codec::decode::<Incoming>(&payload) {
                    Ok(message) => self.dispatch(message, &mut tasks),
                    Err(error) => warn!(error = %error, "skipping malformed message"),
                },
                Ok(None) => {
                    info!("browser closed the connection");
                    break Ok(());
                }
                Err(error) => break Err(error),
            }
            while tasks.try_join_next().is_some() {}
        };

        self.host.close();
        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                warn!(error = %error, "event task failed");
            }
        }
        writer_task.abort();
        result
    }

    fn dispatch(&self, message: Incoming, tasks: &mut JoinSet<()>) {
        match message {
            Incoming::Reply(reply) => {
                self.host.complete(reply);
            }
            Incoming::BeforeRedirect(event) => {
                self.engine.observe_redirect(&event);
            }
            Incoming::DownloadCreated(item) => {
                let engine = Arc::clone(&self.engine);
                tasks.spawn(async move {
                    engine.handle_download_created(&item).await;
                });
            }
            Incoming::ToolbarClicked => {
                let controller = Arc::clone(&self.controller);
                tasks.spawn(async move {
                    controller.toggle().await;
                });
            }
            Incoming::SendLink { url } => {
                let controller = Arc::clone(&self.controller);
                tasks.spawn(async move {
                    if let Err(error) = controller.send_link(&url).await {
                        debug!(error = %error, "send link finished with error");
                    }
                });
            }
        }
    }
}
