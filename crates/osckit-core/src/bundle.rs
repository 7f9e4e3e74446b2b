//! OSC bundle framing and packet detection
//!
//! ```text
//! "#bundle\0" <timetag: u32 seconds, u32 fraction> (<len: i32> <message>)*
//! ```
//!
//! Only flat bundles of messages are produced and accepted.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::codec;
use crate::message::{format_message, read_message, Message};
use crate::time::{self, Timetag};
use crate::{Error, OscValue, Result, Stats, TextCodec, BUNDLE_HEADER};

/// Encode a bundle of `(address, values)` messages
///
/// `timetag` is a Unix time in seconds; `None` means "immediately". The
/// returned stats sum the stats of the contained messages.
pub fn format_bundle<A: AsRef<[u8]>>(
    messages: &[(A, Vec<OscValue>)],
    timetag: Option<f64>,
    text: Option<&TextCodec>,
) -> Result<(Bytes, Stats)> {
    let mut buf = BytesMut::with_capacity(16 + messages.len() * 32);
    buf.extend_from_slice(BUNDLE_HEADER);
    buf.extend_from_slice(&time::time_to_timetag(timetag).to_be_bytes());

    let mut stats = Stats::new();
    for (address, values) in messages {
        let (msg, st) = format_message(address.as_ref(), values, text)?;
        let len = i32::try_from(msg.len())
            .map_err(|_| Error::UnsupportedValueType(format!("message of {} bytes", msg.len())))?;
        buf.put_i32(len);
        buf.extend_from_slice(&msg);
        stats += st;
    }

    Ok((buf.freeze(), stats))
}

/// Decode a bundle keeping the raw timetag
pub fn parse_bundle(
    data: &[u8],
    text: Option<&TextCodec>,
) -> Result<(Timetag, Vec<(Message, usize)>)> {
    match data.get(..7) {
        Some(header) if header == &BUNDLE_HEADER[..7] => {}
        Some(header) => {
            return Err(Error::MalformedPacket(format!(
                "the message doesn't start with '#bundle': {:?}",
                String::from_utf8_lossy(header)
            )))
        }
        None => {
            return Err(Error::BufferTooSmall {
                needed: 16,
                have: data.len(),
            })
        }
    }

    let raw: [u8; 8] = data
        .get(8..16)
        .and_then(|s| s.try_into().ok())
        .ok_or(Error::BufferTooSmall {
            needed: 16,
            have: data.len(),
        })?;
    let timetag = Timetag::from_be_bytes(raw);

    let mut offset = 16;
    let mut messages = Vec::new();
    while offset < data.len() {
        // the declared size is only checked, the message parser computes its own
        let declared = codec::read_i32(data, offset)?;
        offset += 4;
        let (message, consumed) = read_message(data, offset, text)?;
        if declared as usize != consumed {
            debug!(
                "bundle element declares {} bytes but decodes as {}",
                declared, consumed
            );
        }
        offset += consumed;
        messages.push((message, offset));
    }

    Ok((timetag, messages))
}

/// Decode a bundle into its Unix time and messages
///
/// Each message is paired with the offset just past it.
pub fn read_bundle(data: &[u8], text: Option<&TextCodec>) -> Result<(f64, Vec<(Message, usize)>)> {
    let (timetag, messages) = parse_bundle(data, text)?;
    Ok((time::timetag_to_time(timetag), messages))
}

/// Decode a datagram that holds either a message or a bundle
///
/// Always returns a list. With `drop_late`, a bundle whose timetag is already
/// in the past is discarded whole and an empty list is returned; immediate
/// bundles are never late.
pub fn read_packet(
    data: &[u8],
    drop_late: bool,
    text: Option<&TextCodec>,
) -> Result<Vec<(Message, usize)>> {
    match data.first() {
        Some(b'/') => {
            let (message, consumed) = read_message(data, 0, text)?;
            Ok(vec![(message, consumed)])
        }
        Some(b'#') => {
            let (timetag, messages) = parse_bundle(data, text)?;
            if drop_late && !timetag.is_immediate() && time::now() > time::timetag_to_time(timetag)
            {
                debug!("dropping late bundle of {} messages", messages.len());
                return Ok(Vec::new());
            }
            Ok(messages)
        }
        Some(_) => Err(Error::MalformedPacket(
            "packet is not a message or a bundle".to_string(),
        )),
        None => Err(Error::BufferTooSmall { needed: 1, have: 0 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<(&'static str, Vec<OscValue>)> {
        vec![
            ("/create", vec![OscValue::string("name"), OscValue::Int(1)]),
            ("/select", vec![OscValue::string("name")]),
            ("/delete", vec![]),
        ]
    }

    #[test]
    fn test_bundle_layout() {
        let (bytes, stats) = format_bundle(&sample(), Some(0.0), None).unwrap();
        assert_eq!(&bytes[..8], b"#bundle\0");
        assert_eq!(&bytes[8..12], &(time::NTP_DELTA as u32).to_be_bytes());
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
        assert_eq!(stats.calls, 3);
        assert_eq!(stats.params, 3);

        let (first, _) = format_message(b"/create", &sample()[0].1, None).unwrap();
        assert_eq!(&bytes[16..20], &(first.len() as i32).to_be_bytes());
        assert_eq!(&bytes[20..20 + first.len()], &first[..]);
    }

    #[test]
    fn test_read_bundle_offsets() {
        let (bytes, _) = format_bundle(&sample(), None, None).unwrap();
        let (when, messages) = read_bundle(&bytes, None).unwrap();
        assert!((when - time::now()).abs() < 1.0);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].0.address, b"/create");
        assert_eq!(messages[2].0.address, b"/delete");
        assert_eq!(messages[2].1, bytes.len());
        assert!(messages[0].1 < messages[1].1);
    }

    #[test]
    fn test_bad_header() {
        let err = read_bundle(b"#bundlX\0\0\0\0\0\0\0\0\0", None).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket(_)));
    }

    #[test]
    fn test_packet_detection() {
        let (msg, _) = format_message(b"/a", &[OscValue::Int(1)], None).unwrap();
        assert_eq!(read_packet(&msg, false, None).unwrap().len(), 1);

        let (bundle, _) = format_bundle(&sample(), None, None).unwrap();
        assert_eq!(read_packet(&bundle, true, None).unwrap().len(), 3);

        let err = read_packet(b"xyz\0", false, None).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket(_)));
        assert!(read_packet(b"", false, None).is_err());
    }

    #[test]
    fn test_drop_late() {
        let past = time::now() - 1.0;
        let future = time::now() + 1.0;

        let (late, _) = format_bundle(&sample(), Some(past), None).unwrap();
        assert!(read_packet(&late, true, None).unwrap().is_empty());
        assert_eq!(read_packet(&late, false, None).unwrap().len(), 3);

        let (early, _) = format_bundle(&sample(), Some(future), None).unwrap();
        assert_eq!(read_packet(&early, true, None).unwrap().len(), 3);
    }
}
