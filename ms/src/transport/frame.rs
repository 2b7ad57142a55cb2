//! TCP framing
//!
//! Every frame is a big-endian `u32` body length followed by the body.
//!
//! - Request body: endpoint name (length-prefixed string), then the payload.
//! - Response body: status byte `0` (ack, nothing follows) or `1` (failure,
//!   followed by a length-prefixed error message).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::TransportError;
use crate::codec::{MessageError, get_string, put_string};

/// Default upper bound on a frame body (64KB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

const STATUS_ACK: u8 = 0;
const STATUS_FAILURE: u8 = 1;

/// A frame that could not be built is malformed, not a decode failure
fn encode_failure(e: MessageError) -> TransportError {
    TransportError::MalformedFrame(format!("cannot encode frame: {}", e))
}

/// Request addressed to an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub endpoint: String,
    pub payload: Bytes,
}

impl RequestFrame {
    pub fn encode(&self) -> Result<Bytes, TransportError> {
        let mut buf = BytesMut::with_capacity(self.endpoint.len() + self.payload.len() + 5);
        put_string(&mut buf, &self.endpoint).map_err(encode_failure)?;
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    pub fn decode(mut body: Bytes) -> Result<Self, TransportError> {
        let endpoint =
            get_string(&mut body, "endpoint").map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
        Ok(Self { endpoint, payload: body })
    }
}

/// Outcome of a request as seen on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFrame {
    Ack,
    Failure(String),
}

impl ResponseFrame {
    pub fn encode(&self) -> Result<Bytes, TransportError> {
        let mut buf = BytesMut::new();
        match self {
            ResponseFrame::Ack => buf.put_u8(STATUS_ACK),
            ResponseFrame::Failure(message) => {
                buf.put_u8(STATUS_FAILURE);
                put_string(&mut buf, message).map_err(encode_failure)?;
            }
        }
        Ok(buf.freeze())
    }

    pub fn decode(mut body: Bytes) -> Result<Self, TransportError> {
        if !body.has_remaining() {
            return Err(TransportError::MalformedFrame("empty response".to_string()));
        }
        match body.get_u8() {
            STATUS_ACK if !body.has_remaining() => Ok(ResponseFrame::Ack),
            STATUS_ACK => Err(TransportError::MalformedFrame(format!(
                "acknowledgment carries {} unexpected bytes",
                body.remaining()
            ))),
            STATUS_FAILURE => {
                let message =
                    get_string(&mut body, "error message").map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
                Ok(ResponseFrame::Failure(message))
            }
            other => Err(TransportError::MalformedFrame(format!("unknown response status {}", other))),
        }
    }
}

/// Write one length-prefixed frame
pub async fn write_frame<W>(writer: &mut W, body: &[u8], max_frame_size: usize) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if body.len() > max_frame_size {
        return Err(TransportError::FrameTooLarge {
            size: body.len(),
            max: max_frame_size,
        });
    }
    let len = u32::try_from(body.len()).map_err(|_| TransportError::FrameTooLarge {
        size: body.len(),
        max: max_frame_size,
    })?;
    writer.write_u32(len).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    debug!(len, "write_frame: sent frame");
    Ok(())
}

/// Read one length-prefixed frame, rejecting bodies over `max_frame_size`
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Bytes, TransportError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len > max_frame_size {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    debug!(len, "read_frame: received frame");
    Ok(Bytes::from(body))
}
