//! Wire codec (spec §4.1, §6) — a fixed 6-byte header followed by a
//! UTF-8 JSON body.
//!
//! ```text
//! +--------+---------+------------------+-----------------+
//! | type:1 | options:1 | length:4 (BE) | body: length bytes |
//! +--------+---------+------------------+-----------------+
//! ```
//!
//! Receive is length-strict: a short read, an oversize frame or an
//! unknown type byte all fail with `ProtocolError` rather than leaving
//! the stream in a partially-consumed state. Send is the inverse;
//! `AsyncWriteExt::write_all` already retries partial writes, so a
//! frame is emitted atomically at the framing level.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default ceiling on body length — a frame claiming to be larger than
/// this is rejected before any body bytes are read.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 1024 * 1024;

/// Bit 0 — no options set. Other bits are reserved (e.g. compression).
pub const OPTION_NONE: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Check = 0,
    CheckReply = 1,
    Test = 2,
    TestReply = 3,
}

impl MessageType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(MessageType::Check),
            1 => Some(MessageType::CheckReply),
            2 => Some(MessageType::Test),
            3 => Some(MessageType::TestReply),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("short read: connection closed mid-frame")]
    ShortRead,
    #[error("unknown message type byte: {0}")]
    UnknownType(u8),
    #[error("frame of {len} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { len: u32, max: u32 },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct Frame {
    pub msg_type: MessageType,
    pub options: u8,
    pub body: Vec<u8>,
}

/// Read exactly one frame. Fails closed: any of a short read, an
/// oversize length, or an unrecognized type byte returns
/// `ProtocolError` without buffering further bytes.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_len: u32,
) -> Result<Frame, ProtocolError> {
    let mut header = [0u8; 6];
    reader
        .read_exact(&mut header)
        .await
        .map_err(map_read_error)?;

    let msg_type = MessageType::from_u8(header[0]).ok_or(ProtocolError::UnknownType(header[0]))?;
    let options = header[1];
    let len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);

    if len > max_frame_len {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: max_frame_len,
        });
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await.map_err(map_read_error)?;

    Ok(Frame {
        msg_type,
        options,
        body,
    })
}

fn map_read_error(e: std::io::Error) -> ProtocolError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::ShortRead
    } else {
        ProtocolError::Io(e)
    }
}

/// Write exactly one frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg_type: MessageType,
    options: u8,
    body: &[u8],
) -> Result<(), ProtocolError> {
    let mut buf = Vec::with_capacity(6 + body.len());
    buf.push(msg_type as u8);
    buf.push(options);
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(body);
    writer.write_all(&buf).await?;
    Ok(())
}

/// Serialize `payload` as JSON and send it as a single frame.
pub async fn send_json<W: AsyncWrite + Unpin, T: Serialize>(
    writer: &mut W,
    msg_type: MessageType,
    payload: &T,
) -> Result<(), ProtocolError> {
    let body = serde_json::to_vec(payload)?;
    write_frame(writer, msg_type, OPTION_NONE, &body).await
}

/// Read one frame and parse its body as JSON.
pub async fn receive_json<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_len: u32,
) -> Result<(MessageType, Value), ProtocolError> {
    let frame = read_frame(reader, max_frame_len).await?;
    let value: Value = serde_json::from_slice(&frame.body)?;
    Ok((frame.msg_type, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, MessageType::CheckReply, OPTION_NONE, b"{\"id\":1}")
            .await
            .unwrap();

        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        assert_eq!(frame.msg_type, MessageType::CheckReply);
        assert_eq!(frame.body, b"{\"id\":1}");
    }

    #[tokio::test]
    async fn rejects_oversize_frame_without_buffering_body() {
        let mut buf = Vec::new();
        buf.push(MessageType::Check as u8);
        buf.push(OPTION_NONE);
        buf.extend_from_slice(&100u32.to_be_bytes());
        // Note: no body bytes follow — a strict reader must fail on the
        // length check alone, before attempting to read 100 bytes.
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor, 10).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { len: 100, max: 10 }));
    }

    #[tokio::test]
    async fn rejects_unknown_type_byte() {
        let mut buf = vec![9u8, OPTION_NONE];
        buf.extend_from_slice(&0u32.to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN).await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(9)));
    }

    #[tokio::test]
    async fn rejects_short_read() {
        let buf = vec![0u8, OPTION_NONE, 0, 0, 0, 5]; // claims 5 body bytes, sends none
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ShortRead));
    }

    #[tokio::test]
    async fn send_json_round_trips_through_receive_json() {
        let mut buf = Vec::new();
        send_json(&mut buf, MessageType::Check, &serde_json::json!([{"id": 1, "path": "a.sh"}]))
            .await
            .unwrap();

        let mut cursor = Cursor::new(buf);
        let (msg_type, value) = receive_json(&mut cursor, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        assert_eq!(msg_type, MessageType::Check);
        assert_eq!(value[0]["path"], "a.sh");
    }
}
