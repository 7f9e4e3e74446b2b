//! OSC message framing
//!
//! ```text
//! <address, NUL, pad4> <",", tags, NUL, pad4> <arg1> <arg2> ...
//! ```

use bytes::{Bytes, BytesMut};

use crate::codec::{self, EncodeCache};
use crate::{Error, OscValue, Result, Stats, TextCodec};

/// A decoded message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Address bytes, without terminator
    pub address: Vec<u8>,
    /// Type tags, without the leading `,`
    pub tags: Vec<u8>,
    pub values: Vec<OscValue>,
}

impl Message {
    pub fn new(address: impl Into<Vec<u8>>, values: Vec<OscValue>) -> Self {
        let tags = values.iter().map(OscValue::tag).collect();
        Self {
            address: address.into(),
            tags,
            values,
        }
    }

    /// Address as text, lossily converted
    pub fn address_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.address)
    }

    /// Type tags as text
    pub fn tags_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.tags)
    }

    /// Encode this message
    pub fn encode(&self, text: Option<&TextCodec>) -> Result<Bytes> {
        format_message(&self.address, &self.values, text).map(|(bytes, _)| bytes)
    }
}

/// Encode a message to bytes
///
/// The type tag string is inferred from `values`. A trailing NUL on `address`
/// is tolerated. Returns the encoded message and the stats describing it.
pub fn format_message(
    address: &[u8],
    values: &[OscValue],
    text: Option<&TextCodec>,
) -> Result<(Bytes, Stats)> {
    let address = address.strip_suffix(b"\0").unwrap_or(address);

    let mut payload = BytesMut::with_capacity(values.len() * 8);
    let mut tags = Vec::with_capacity(values.len() + 1);
    tags.push(b',');

    let mut cache = EncodeCache::new();
    for value in values {
        tags.push(codec::encode_value(&mut payload, value, text, &mut cache)?);
    }

    let mut buf = BytesMut::with_capacity(
        codec::padded(address.len() + 1, 4) + codec::padded(tags.len() + 1, 4) + payload.len(),
    );
    codec::write_string(&mut buf, address);
    codec::write_string(&mut buf, &tags);
    buf.extend_from_slice(&payload);

    let stats = Stats::for_message(buf.len(), &tags[1..]);
    Ok((buf.freeze(), stats))
}

/// Decode a message starting at `offset`
///
/// Works both on standalone messages and on messages inside a bundle. Returns
/// the message and the number of bytes it occupied.
pub fn read_message(
    data: &[u8],
    offset: usize,
    text: Option<&TextCodec>,
) -> Result<(Message, usize)> {
    let (address, size) = codec::read_string(data, offset)?;
    if !address.starts_with(b"/") {
        return Err(Error::MalformedPacket(format!(
            "address {:?} doesn't start with a '/'",
            String::from_utf8_lossy(address)
        )));
    }
    let mut index = size;

    let (tags, size) = codec::read_string(data, offset + index)?;
    let tags = tags.strip_prefix(b",").ok_or_else(|| {
        Error::MalformedPacket(format!(
            "tag string {:?} doesn't start with a ','",
            String::from_utf8_lossy(tags)
        ))
    })?;
    index += size;

    let mut values = Vec::with_capacity(tags.len());
    for &tag in tags {
        let (value, consumed) = codec::decode_value(tag, data, offset + index, text)?;
        values.push(value);
        index += consumed;
    }

    Ok((
        Message {
            address: address.to_vec(),
            tags: tags.to_vec(),
            values,
        },
        index,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oscillator_frequency_bytes() {
        let (bytes, stats) =
            format_message(b"/oscillator/4/frequency", &[OscValue::Float(440.0)], None).unwrap();
        let expected: &[u8] = &[
            0x2f, 0x6f, 0x73, 0x63, 0x69, 0x6c, 0x6c, 0x61, 0x74, 0x6f, 0x72, 0x2f, 0x34, 0x2f,
            0x66, 0x72, 0x65, 0x71, 0x75, 0x65, 0x6e, 0x63, 0x79, 0x00, 0x2c, 0x66, 0x00, 0x00,
            0x43, 0xdc, 0x00, 0x00,
        ];
        assert_eq!(&bytes[..], expected);
        assert_eq!(stats.bytes, 32);
        assert_eq!(stats.params, 1);

        let (msg, consumed) = read_message(&bytes, 0, None).unwrap();
        assert_eq!(consumed, 32);
        assert_eq!(msg.address, b"/oscillator/4/frequency");
        assert_eq!(msg.tags, b"f");
        assert_eq!(msg.values, vec![OscValue::Float(440.0)]);
    }

    #[test]
    fn test_no_arguments() {
        let (bytes, _) = format_message(b"/ping", &[], None).unwrap();
        assert_eq!(&bytes[..], b"/ping\0\0\0,\0\0\0");
        let (msg, consumed) = read_message(&bytes, 0, None).unwrap();
        assert!(msg.values.is_empty());
        assert!(msg.tags.is_empty());
        assert_eq!(consumed, 12);
    }

    #[test]
    fn test_terminated_address_accepted() {
        let (a, _) = format_message(b"/a\0", &[OscValue::Int(1)], None).unwrap();
        let (b, _) = format_message(b"/a", &[OscValue::Int(1)], None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bad_address() {
        let err = read_message(b"abc\0,\0\0\0", 0, None).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket(_)));
    }

    #[test]
    fn test_bad_tag_string() {
        let err = read_message(b"/abc\0\0\0\0i\0\0\0", 0, None).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket(_)));
    }

    #[test]
    fn test_message_struct_roundtrip() {
        let msg = Message::new("/synth/1", vec![OscValue::Int(3), OscValue::True]);
        assert_eq!(msg.tags, b"iT");
        let bytes = msg.encode(None).unwrap();
        let (decoded, _) = read_message(&bytes, 0, None).unwrap();
        assert_eq!(decoded, msg);
    }
}
