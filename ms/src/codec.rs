//! Wire primitives for notification messages
//!
//! Strings are written as a variable-length integer byte count followed by the
//! UTF-8 bytes. The length uses 7 bits per byte, least significant group first,
//! with the high bit set on every byte except the last (at most 5 bytes).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Maximum number of bytes a 32-bit vint may occupy
const MAX_VINT_BYTES: usize = 5;

/// Errors raised while building or decoding a message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("resource name must not be empty")]
    EmptyResourceName,

    #[error("truncated length prefix")]
    TruncatedLength,

    #[error("length prefix does not fit in 32 bits")]
    LengthOverflow,

    #[error("truncated {field}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("string of {0} bytes is too long to encode")]
    StringTooLong(usize),

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

/// Append a variable-length unsigned integer
pub fn put_vint(buf: &mut BytesMut, mut value: u32) {
    while value & !0x7F != 0 {
        buf.put_u8(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Read a variable-length unsigned integer
pub fn get_vint(buf: &mut Bytes) -> Result<u32, MessageError> {
    let mut value: u32 = 0;
    for index in 0..MAX_VINT_BYTES {
        if !buf.has_remaining() {
            return Err(MessageError::TruncatedLength);
        }
        let byte = buf.get_u8();
        let shift = 7 * index as u32;
        // The fifth byte may only carry the top 4 bits
        if index == MAX_VINT_BYTES - 1 && byte & 0xF0 != 0 {
            return Err(MessageError::LengthOverflow);
        }
        value |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(MessageError::LengthOverflow)
}

/// Append a length-prefixed UTF-8 string
pub fn put_string(buf: &mut BytesMut, value: &str) -> Result<(), MessageError> {
    let len = u32::try_from(value.len()).map_err(|_| MessageError::StringTooLong(value.len()))?;
    put_vint(buf, len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Read a length-prefixed UTF-8 string; `field` names it in errors
pub fn get_string(buf: &mut Bytes, field: &'static str) -> Result<String, MessageError> {
    let needed = get_vint(buf)? as usize;
    if buf.remaining() < needed {
        return Err(MessageError::Truncated {
            field,
            needed,
            remaining: buf.remaining(),
        });
    }
    let raw = buf.split_to(needed);
    String::from_utf8(raw.to_vec()).map_err(|_| MessageError::InvalidUtf8 { field })
}
