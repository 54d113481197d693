// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Newline-delimited JSON framing for control messages.

use std::time::Duration;

use handoff_core::MessagePayload;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum accepted frame length, terminator included.
pub const MAX_FRAME: usize = 1024 * 1024;

/// Errors from encoding, decoding, and stream I/O.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame exceeds {MAX_FRAME} bytes")]
    FrameTooLarge,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a message as one JSON frame with a trailing newline.
///
/// Compact JSON encoding cannot emit a raw newline, so the terminator is
/// always the frame's only one.
pub fn encode(msg: &MessagePayload) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = serde_json::to_vec(msg)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Decode one frame. Trailing whitespace (including the terminator) is
/// tolerated.
pub fn decode(frame: &[u8]) -> Result<MessagePayload, ProtocolError> {
    Ok(serde_json::from_slice(frame)?)
}

/// Read one frame, up to and including its `\n` terminator.
///
/// Frames longer than [`MAX_FRAME`] are rejected; EOF before any byte is
/// [`ProtocolError::ConnectionClosed`], as is EOF mid-frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<MessagePayload, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = reader.take(MAX_FRAME as u64 + 1);
    limited.read_until(b'\n', &mut buf).await?;

    if buf.len() > MAX_FRAME {
        return Err(ProtocolError::FrameTooLarge);
    }
    if !buf.ends_with(b"\n") {
        return Err(ProtocolError::ConnectionClosed);
    }
    decode(&buf)
}

/// Write one encoded frame and flush.
pub async fn write_frame<W>(writer: &mut W, msg: &MessagePayload) -> Result<usize, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode(msg)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(buf.len())
}

/// [`read_frame`] with a deadline.
pub async fn read_frame_timeout<R>(
    reader: &mut R,
    timeout: Duration,
) -> Result<MessagePayload, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    match tokio::time::timeout(timeout, read_frame(reader)).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout(timeout)),
    }
}

/// [`write_frame`] with a deadline.
pub async fn write_frame_timeout<W>(
    writer: &mut W,
    msg: &MessagePayload,
    timeout: Duration,
) -> Result<usize, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    match tokio::time::timeout(timeout, write_frame(writer, msg)).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout(timeout)),
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
