//! Native-messaging framing: a 4-byte length in native byte order, then
//! that many bytes of UTF-8 JSON.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::BridgeError;

/// Largest frame accepted from the browser.
pub const MAX_INCOMING_FRAME: usize = 64 * 1024 * 1024;

/// Largest frame the browser accepts from a host.
pub const MAX_OUTGOING_FRAME: usize = 1024 * 1024;

/// Reads one frame. Returns `Ok(None)` on a clean end of stream.
///
/// # Errors
///
/// [`BridgeError::Truncated`] if the stream ends inside a frame,
/// [`BridgeError::FrameTooLarge`] for an oversized length prefix and
/// [`BridgeError::Io`] for read failures.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, BridgeError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(BridgeError::Truncated)
            };
        }
        filled += n;
    }

    let len = u32::from_ne_bytes(prefix) as usize;
    if len > MAX_INCOMING_FRAME {
        return Err(BridgeError::FrameTooLarge {
            len,
            max: MAX_INCOMING_FRAME,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            BridgeError::Truncated
        } else {
            BridgeError::Io(e)
        }
    })?;
    Ok(Some(payload))
}

/// Writes one frame and flushes.
///
/// # Errors
///
/// [`BridgeError::FrameTooLarge`] above [`MAX_OUTGOING_FRAME`], otherwise
/// [`BridgeError::Io`].
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    check_outgoing_len(payload.len())?;
    let len = u32::try_from(payload.len()).map_err(|_| BridgeError::FrameTooLarge {
        len: payload.len(),
        max: MAX_OUTGOING_FRAME,
    })?;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Serializes `message` into a frame payload, enforcing the outgoing limit.
///
/// # Errors
///
/// [`BridgeError::Json`] or [`BridgeError::FrameTooLarge`].
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, BridgeError> {
    let payload = serde_json::to_vec(message)?;
    check_outgoing_len(payload.len())?;
    Ok(payload)
}

/// Parses a frame payload.
///
/// # Errors
///
/// [`BridgeError::Json`] for malformed or unknown messages.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, BridgeError> {
    Ok(serde_json::from_slice(payload)?)
}

fn check_outgoing_len(len: usize) -> Result<(), BridgeError> {
    if len > MAX_OUTGOING_FRAME {
        return Err(BridgeError::FrameTooLarge {
            len,
            max: MAX_OUTGOING_FRAME,
        });
    }
    Ok(())
}
