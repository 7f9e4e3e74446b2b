//! OSC scalar codec
//!
//! Encodes and decodes single argument values to and from the padded,
//! big-endian OSC layout:
//!
//! | tag | payload |
//! |-----|---------|
//! | `i` | 4 bytes, big-endian two's complement |
//! | `f` | 4 bytes, big-endian IEEE 754 |
//! | `s` | bytes, NUL terminator, NUL padding to a multiple of 4 |
//! | `b` | 4 byte big-endian length `L`, `L` bytes, NUL padding to a multiple of 8 |
//! | `m` | 4 bytes: port, status, data1, data2 |
//! | `T` `F` `N` `I` | nothing, the tag is the value |

use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

use crate::types::{tag, MidiMessage, OscValue};
use crate::{Error, Result, TextCodec};

/// Padding unit for strings, addresses and type tag strings
pub const STRING_ALIGN: usize = 4;

/// Padding unit for blob payloads
pub const BLOB_ALIGN: usize = 8;

/// Round `len` up to the next multiple of `unit`
///
/// Exact multiples are returned unchanged; callers padding a NUL terminated
/// string pass the length including its terminator, so a string always
/// consumes at least one NUL.
#[inline]
pub fn padded(len: usize, unit: usize) -> usize {
    unit * (len / unit + usize::from(len % unit != 0))
}

/// Per-call cache of encoded text, so repeated strings in one message are
/// encoded once
pub type EncodeCache<'a> = HashMap<&'a str, Vec<u8>>;

// ============================================================================
// ENCODING
// ============================================================================

/// Append `bytes` as a NUL terminated string padded to 4 bytes
#[inline]
pub fn write_string(buf: &mut BytesMut, bytes: &[u8]) {
    let total = padded(bytes.len() + 1, STRING_ALIGN);
    buf.reserve(total);
    buf.extend_from_slice(bytes);
    buf.put_bytes(0, total - bytes.len());
}

/// Append a length prefixed blob padded to 8 bytes
#[inline]
pub fn write_blob(buf: &mut BytesMut, bytes: &[u8]) -> Result<()> {
    let len = i32::try_from(bytes.len())
        .map_err(|_| Error::UnsupportedValueType(format!("blob of {} bytes", bytes.len())))?;
    let total = padded(bytes.len(), BLOB_ALIGN);
    buf.reserve(4 + total);
    buf.put_i32(len);
    buf.extend_from_slice(bytes);
    buf.put_bytes(0, total - bytes.len());
    Ok(())
}

/// Append the wire payload of `value`, returning its type tag
///
/// Text values need a codec; encoded text is memoised in `cache`.
pub fn encode_value<'a>(
    buf: &mut BytesMut,
    value: &'a OscValue,
    text: Option<&TextCodec>,
    cache: &mut EncodeCache<'a>,
) -> Result<u8> {
    match value {
        OscValue::Float(f) => buf.put_f32(*f),
        OscValue::Int(i) => buf.put_i32(*i),
        OscValue::String(bytes) => write_string(buf, bytes),
        OscValue::Text(s) => {
            let codec = text.ok_or_else(|| {
                Error::Encoding("cannot format text without an encoding".to_string())
            })?;
            if !cache.contains_key(s.as_str()) {
                let encoded = codec.encode(s)?;
                cache.insert(s.as_str(), encoded);
            }
            if let Some(encoded) = cache.get(s.as_str()) {
                write_string(buf, encoded);
            }
        }
        OscValue::Blob(bytes) => write_blob(buf, bytes)?,
        OscValue::Midi(m) => buf.extend_from_slice(&m.to_bytes()),
        OscValue::True | OscValue::False | OscValue::Nil | OscValue::Infinitum => {}
    }
    Ok(value.tag())
}

// ============================================================================
// DECODING
// ============================================================================

#[inline]
fn take<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(Error::BufferTooSmall {
            needed: offset + N,
            have: data.len(),
        })
}

/// Read a big-endian int32 at `offset`
#[inline]
pub fn read_i32(data: &[u8], offset: usize) -> Result<i32> {
    take::<4>(data, offset).map(i32::from_be_bytes)
}

/// Read a big-endian uint32 at `offset`
#[inline]
pub fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    take::<4>(data, offset).map(u32::from_be_bytes)
}

/// Read a NUL terminated string at `offset`
///
/// Returns the bytes before the terminator and the padded length consumed.
pub fn read_string(data: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let rest = data.get(offset..).ok_or(Error::BufferTooSmall {
        needed: offset + 1,
        have: data.len(),
    })?;
    let end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::BufferTooSmall {
            needed: data.len() + 1,
            have: data.len(),
        })?;
    Ok((&rest[..end], padded(end + 1, STRING_ALIGN)))
}

/// Read a length prefixed blob at `offset`
///
/// Returns the payload and the length consumed, prefix included.
pub fn read_blob(data: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let len = read_i32(data, offset)?;
    let len = usize::try_from(len)
        .map_err(|_| Error::MalformedPacket(format!("negative blob length {}", len)))?;
    let start = offset + 4;
    let payload = data.get(start..start + len).ok_or(Error::BufferTooSmall {
        needed: start + len,
        have: data.len(),
    })?;
    Ok((payload, 4 + padded(len, BLOB_ALIGN)))
}

/// Decode one value of type `tag` at `offset`
///
/// Returns the value and the number of bytes consumed. Strings are decoded
/// with `text` when given and returned as raw bytes otherwise.
pub fn decode_value(
    tag: u8,
    data: &[u8],
    offset: usize,
    text: Option<&TextCodec>,
) -> Result<(OscValue, usize)> {
    match tag {
        tag::INT => Ok((OscValue::Int(read_i32(data, offset)?), 4)),
        tag::FLOAT => {
            let raw = take::<4>(data, offset)?;
            Ok((OscValue::Float(f32::from_be_bytes(raw)), 4))
        }
        tag::STRING => {
            let (bytes, consumed) = read_string(data, offset)?;
            let value = match text {
                Some(codec) => OscValue::Text(codec.decode(bytes)?),
                None => OscValue::String(bytes.to_vec()),
            };
            Ok((value, consumed))
        }
        tag::BLOB => {
            let (bytes, consumed) = read_blob(data, offset)?;
            Ok((OscValue::Blob(bytes.to_vec()), consumed))
        }
        tag::MIDI => {
            let raw = take::<4>(data, offset)?;
            Ok((OscValue::Midi(MidiMessage::from_bytes(raw)), 4))
        }
        tag::TRUE => Ok((OscValue::True, 0)),
        tag::FALSE => Ok((OscValue::False, 0)),
        tag::NIL => Ok((OscValue::Nil, 0)),
        tag::INFINITUM => Ok((OscValue::Infinitum, 0)),
        _ => Err(Error::UnknownTypeTag { tag, offset }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
