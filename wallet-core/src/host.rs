//! Native-messaging framing: a 4-byte little-endian length, then UTF-8 JSON.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::api::{Envelope, Response};
use crate::errors::{WalletError, WalletResult};
use crate::service::BackgroundService;

/// Largest message accepted in either direction.
pub const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Read one frame. `Ok(None)` means the peer closed the pipe between frames.
pub async fn read_frame<R>(reader: &mut R) -> WalletResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let length = u32::from_le_bytes(header) as usize;
    if length > MAX_MESSAGE_SIZE {
        return Err(WalletError::ValidationError(format!(
            "Message of {length} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit"
        )));
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> WalletResult<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(WalletError::ValidationError(format!(
            "Response of {} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit",
            payload.len()
        )));
    }

    writer
        .write_all(&(payload.len() as u32).to_le_bytes())
        .await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Answer frames until the peer hangs up.
///
/// A malformed message gets a failure response; an oversized one ends the
/// loop since the stream can no longer be resynchronised.
pub async fn serve<R, W>(service: &BackgroundService, reader: &mut R, writer: &mut W) -> WalletResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = read_frame(reader).await? {
        let response = match serde_json::from_slice::<Envelope>(&frame) {
            Ok(envelope) => service.handle(envelope.origin, envelope.request).await,
            Err(err) => {
                tracing::warn!(error = %err, "discarding malformed message");
                Response::failure(&WalletError::ValidationError(
                    "Malformed message".to_string(),
                ))
            }
        };

        let encoded = serde_json::to_vec(&response)?;
        write_frame(writer, &encoded).await?;
    }

    tracing::info!("extension closed the message pipe");
    Ok(())
}
