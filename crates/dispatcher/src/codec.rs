//! OSC float message codec
//!
//! One datagram carries exactly one message with a single float argument:
//!
//! ```text
//! ┌──────────────────────────┬──────────────────┬──────────────────┐
//! │ address + NUL padding    │ ",f" + NUL pad   │ f32 big-endian   │
//! │ (multiple of 4, >= 1 NUL)│ (4 bytes)        │ (4 bytes)        │
//! └──────────────────────────┴──────────────────┴──────────────────┘
//! ```
//!
//! There is no length prefix; the datagram boundary is the message boundary.

use bytes::{Buf, BufMut, Bytes};

use crate::error::{DecodeError, EncodeError};

/// Type tag string for a single float argument
pub const FLOAT_TYPE_TAG: &str = ",f";

/// OSC fields are aligned to 4 bytes
const ALIGNMENT: usize = 4;

/// Size of the float argument
const FLOAT_LEN: usize = 4;

/// Length of a NUL terminated, zero padded string field.
///
/// Smallest multiple of 4 strictly greater than `len`.
pub fn padded_len(len: usize) -> usize {
    (len / ALIGNMENT + 1) * ALIGNMENT
}

/// Total datagram size for `address`
pub fn encoded_len(address: &str) -> usize {
    padded_len(address.len()) + padded_len(FLOAT_TYPE_TAG.len()) + FLOAT_LEN
}

/// Encode a single-float OSC message.
///
/// The buffer is sized up front; an allocation failure is reported instead of
/// aborting, so only this message is lost.
pub fn encode_float_message(address: &str, value: f32) -> Result<Bytes, EncodeError> {
    if address.is_empty() {
        return Err(EncodeError::EmptyAddress);
    }
    if address.as_bytes().contains(&0) {
        return Err(EncodeError::InvalidAddress {
            address: address.escape_default().to_string(),
        });
    }

    let size = encoded_len(address);
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|source| EncodeError::Alloc { size, source })?;

    put_padded_str(&mut buf, address);
    put_padded_str(&mut buf, FLOAT_TYPE_TAG);
    buf.put_f32(value);

    debug_assert_eq!(buf.len(), size);
    Ok(Bytes::from(buf))
}

fn put_padded_str(buf: &mut Vec<u8>, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_bytes(0, padded_len(s.len()) - s.len());
}

/// A decoded single-float message
#[derive(Debug, Clone, PartialEq)]
pub struct FloatMessage {
    pub address: String,
    pub value: f32,
}

/// Decode a datagram produced by [`encode_float_message`]
pub fn decode_float_message(mut src: &[u8]) -> Result<FloatMessage, DecodeError> {
    let address = take_padded_str(&mut src)?;
    let type_tag = take_padded_str(&mut src)?;
    if type_tag != FLOAT_TYPE_TAG {
        return Err(DecodeError::UnsupportedTypeTag(type_tag));
    }

    if src.remaining() < FLOAT_LEN {
        return Err(DecodeError::Truncated {
            needed: FLOAT_LEN,
            available: src.remaining(),
        });
    }
    let value = src.get_f32();

    if src.has_remaining() {
        return Err(DecodeError::TrailingBytes(src.remaining()));
    }

    Ok(FloatMessage { address, value })
}

fn take_padded_str(src: &mut &[u8]) -> Result<String, DecodeError> {
    let nul = src
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::MissingTerminator)?;
    let field_len = padded_len(nul);
    if src.len() < field_len {
        return Err(DecodeError::Truncated {
            needed: field_len,
            available: src.len(),
        });
    }
    if src[nul..field_len].iter().any(|&b| b != 0) {
        return Err(DecodeError::NonZeroPadding);
    }

    let s = std::str::from_utf8(&src[..nul])
        .map_err(|_| DecodeError::InvalidUtf8)?
        .to_owned();
    src.advance(field_len);
    Ok(s)
}
