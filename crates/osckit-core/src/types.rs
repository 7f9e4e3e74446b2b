//! OSC argument values

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Type tag bytes, one per argument kind
pub mod tag {
    pub const INT: u8 = b'i';
    pub const FLOAT: u8 = b'f';
    pub const STRING: u8 = b's';
    pub const BLOB: u8 = b'b';
    pub const MIDI: u8 = b'm';
    pub const TRUE: u8 = b'T';
    pub const FALSE: u8 = b'F';
    pub const NIL: u8 = b'N';
    pub const INFINITUM: u8 = b'I';
}

/// A four byte MIDI message: port id, status byte and two data bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MidiMessage {
    pub port: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiMessage {
    pub fn new(port: u8, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            port,
            status,
            data1,
            data2,
        }
    }

    /// Build from wider integers, keeping the low 8 bits of each
    pub fn truncating(port: u32, status: u32, data1: u32, data2: u32) -> Self {
        Self::new(port as u8, status as u8, data1 as u8, data2 as u8)
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.port, self.status, self.data1, self.data2]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

/// A single OSC argument
///
/// The variant decides the wire encoding; callers pick it explicitly instead of
/// relying on the host numeric type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OscValue {
    Int(i32),
    Float(f32),
    /// Raw string bytes, without terminator
    String(Vec<u8>),
    /// Text to be encoded with the configured [`TextCodec`](crate::TextCodec)
    Text(String),
    Blob(Vec<u8>),
    Midi(MidiMessage),
    True,
    False,
    Nil,
    Infinitum,
}

impl OscValue {
    /// The type tag written for this value
    pub fn tag(&self) -> u8 {
        match self {
            OscValue::Float(_) => tag::FLOAT,
            OscValue::Int(_) => tag::INT,
            OscValue::String(_) | OscValue::Text(_) => tag::STRING,
            OscValue::Blob(_) => tag::BLOB,
            OscValue::Midi(_) => tag::MIDI,
            OscValue::True => tag::TRUE,
            OscValue::False => tag::FALSE,
            OscValue::Nil => tag::NIL,
            OscValue::Infinitum => tag::INFINITUM,
        }
    }

    pub fn bool(b: bool) -> Self {
        if b {
            OscValue::True
        } else {
            OscValue::False
        }
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        OscValue::String(bytes.into())
    }

    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        OscValue::Blob(bytes.into())
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            OscValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            OscValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String contents as bytes, for both raw and decoded strings
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            OscValue::String(b) | OscValue::Blob(b) => Some(b),
            OscValue::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscValue::Text(s) => Some(s),
            OscValue::String(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OscValue::True => Some(true),
            OscValue::False => Some(false),
            _ => None,
        }
    }

    /// Parse a command-line style literal
    ///
    /// Integers become `Int`, decimals become `Float`, `True`/`False`/`None`
    /// become the matching markers, `b'...'` becomes raw string bytes and
    /// anything else is `Text`. Container literals are rejected.
    pub fn from_literal(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        if let Ok(i) = trimmed.parse::<i64>() {
            return i32::try_from(i).map(OscValue::Int).map_err(|_| {
                Error::UnsupportedValueType(format!("{} (integer out of int32 range)", trimmed))
            });
        }
        if trimmed.contains(|c: char| c.is_ascii_digit()) {
            if let Ok(f) = trimmed.parse::<f32>() {
                return Ok(OscValue::Float(f));
            }
        }

        match trimmed {
            "True" | "true" => return Ok(OscValue::True),
            "False" | "false" => return Ok(OscValue::False),
            "None" | "nil" => return Ok(OscValue::Nil),
            _ => {}
        }

        for quote in ['\'', '"'] {
            if let Some(inner) = trimmed
                .strip_prefix('b')
                .and_then(|r| r.strip_prefix(quote))
                .and_then(|r| r.strip_suffix(quote))
            {
                return Ok(OscValue::String(inner.as_bytes().to_vec()));
            }
        }

        if let (Some(first), Some(last)) = (trimmed.chars().next(), trimmed.chars().last()) {
            if matches!((first, last), ('[', ']') | ('(', ')') | ('{', '}')) {
                return Err(Error::UnsupportedValueType(format!(
                    "{} (containers have no OSC 1.0 type tag)",
                    trimmed
                )));
            }
        }

        Ok(OscValue::Text(s.to_string()))
    }
}

impl fmt::Display for OscValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscValue::Int(i) => write!(f, "{}", i),
            OscValue::Float(v) => write!(f, "{}", v),
            OscValue::String(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            OscValue::Text(s) => f.write_str(s),
            OscValue::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
            OscValue::Midi(m) => write!(
                f,
                "midi({}, 0x{:02x}, {}, {})",
                m.port, m.status, m.data1, m.data2
            ),
            OscValue::True => f.write_str("True"),
            OscValue::False => f.write_str("False"),
            OscValue::Nil => f.write_str("Nil"),
            OscValue::Infinitum => f.write_str("Infinitum"),
        }
    }
}

impl From<i32> for OscValue {
    fn from(i: i32) -> Self {
        OscValue::Int(i)
    }
}

impl From<f32> for OscValue {
    fn from(f: f32) -> Self {
        OscValue::Float(f)
    }
}

impl From<bool> for OscValue {
    fn from(b: bool) -> Self {
        OscValue::bool(b)
    }
}

impl From<&str> for OscValue {
    fn from(s: &str) -> Self {
        OscValue::Text(s.to_string())
    }
}

impl From<String> for OscValue {
    fn from(s: String) -> Self {
        OscValue::Text(s)
    }
}

impl From<&[u8]> for OscValue {
    fn from(b: &[u8]) -> Self {
        OscValue::String(b.to_vec())
    }
}

impl From<MidiMessage> for OscValue {
    fn from(m: MidiMessage) -> Self {
        OscValue::Midi(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(OscValue::Int(1).tag(), b'i');
        assert_eq!(OscValue::Float(1.0).tag(), b'f');
        assert_eq!(OscValue::from("x").tag(), b's');
        assert_eq!(OscValue::string("x").tag(), b's');
        assert_eq!(OscValue::blob(vec![1]).tag(), b'b');
        assert_eq!(OscValue::Midi(MidiMessage::default()).tag(), b'm');
        assert_eq!(OscValue::bool(true).tag(), b'T');
        assert_eq!(OscValue::bool(false).tag(), b'F');
        assert_eq!(OscValue::Nil.tag(), b'N');
        assert_eq!(OscValue::Infinitum.tag(), b'I');
    }

    #[test]
    fn test_midi_truncation() {
        let m = MidiMessage::truncating(0x101, 0x190, 60, 0x17f);
        assert_eq!(m.to_bytes(), [0x01, 0x90, 60, 0x7f]);
    }

    #[test]
    fn test_from_literal() {
        assert_eq!(OscValue::from_literal("42").unwrap(), OscValue::Int(42));
        assert_eq!(OscValue::from_literal("-1").unwrap(), OscValue::Int(-1));
        assert_eq!(OscValue::from_literal("1.5").unwrap(), OscValue::Float(1.5));
        assert_eq!(OscValue::from_literal("True").unwrap(), OscValue::True);
        assert_eq!(
            OscValue::from_literal("b'raw'").unwrap(),
            OscValue::String(b"raw".to_vec())
        );
        assert_eq!(
            OscValue::from_literal("hello").unwrap(),
            OscValue::Text("hello".to_string())
        );
        assert_eq!(
            OscValue::from_literal("inf").unwrap(),
            OscValue::Text("inf".to_string())
        );
        assert!(matches!(
            OscValue::from_literal("[1, 2]"),
            Err(Error::UnsupportedValueType(_))
        ));
        assert!(matches!(
            OscValue::from_literal("4294967296"),
            Err(Error::UnsupportedValueType(_))
        ));
    }
}
