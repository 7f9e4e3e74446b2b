//! Text encodings for OSC string arguments
//!
//! OSC strings are byte strings on the wire. When a [`TextCodec`] is
//! configured, `s` arguments are decoded to Rust strings and text values are
//! encoded before framing; without one, strings travel as raw bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Supported character encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "ascii")]
    Ascii,
    #[serde(rename = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

/// What to do with code units the encoding cannot represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingErrors {
    /// Fail with [`Error::Encoding`]
    #[default]
    Strict,
    /// Drop the offending code units
    Ignore,
    /// Substitute `?` when encoding, U+FFFD when decoding
    Replace,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    /// Highest code point representable in a single byte, if the encoding is
    /// single-byte
    fn byte_limit(&self) -> Option<u32> {
        match self {
            TextEncoding::Utf8 => None,
            TextEncoding::Ascii => Some(0x7f),
            TextEncoding::Latin1 => Some(0xff),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(Error::Encoding(format!("unknown encoding: {}", other))),
        }
    }
}

impl FromStr for EncodingErrors {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(EncodingErrors::Strict),
            "ignore" => Ok(EncodingErrors::Ignore),
            "replace" => Ok(EncodingErrors::Replace),
            other => Err(Error::Encoding(format!(
                "unknown error policy: {} (expected strict, ignore or replace)",
                other
            ))),
        }
    }
}

/// An encoding paired with its error policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCodec {
    pub encoding: TextEncoding,
    #[serde(default)]
    pub errors: EncodingErrors,
}

impl TextCodec {
    pub fn new(encoding: TextEncoding, errors: EncodingErrors) -> Self {
        Self { encoding, errors }
    }

    /// UTF-8 with strict error handling
    pub fn utf8() -> Self {
        Self::new(TextEncoding::Utf8, EncodingErrors::Strict)
    }

    /// Encode text to bytes
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let limit = match self.encoding.byte_limit() {
            None => return Ok(text.as_bytes().to_vec()),
            Some(limit) => limit,
        };

        let mut out = Vec::with_capacity(text.len());
        for (pos, c) in text.chars().enumerate() {
            let code = c as u32;
            if code <= limit {
                out.push(code as u8);
                continue;
            }
            match self.errors {
                EncodingErrors::Strict => {
                    return Err(Error::Encoding(format!(
                        "'{}' codec can't encode character {:?} in position {}",
                        self.encoding, c, pos
                    )))
                }
                EncodingErrors::Ignore => {}
                EncodingErrors::Replace => out.push(b'?'),
            }
        }
        Ok(out)
    }

    /// Decode bytes to text
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self.encoding {
            TextEncoding::Utf8 => self.decode_utf8(bytes),
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::Ascii => {
                let mut out = String::with_capacity(bytes.len());
                for (pos, &b) in bytes.iter().enumerate() {
                    if b.is_ascii() {
                        out.push(char::from(b));
                        continue;
                    }
                    match self.errors {
                        EncodingErrors::Strict => {
                            return Err(Error::Encoding(format!(
                                "'ascii' codec can't decode byte 0x{:02x} in position {}",
                                b, pos
                            )))
                        }
                        EncodingErrors::Ignore => {}
                        EncodingErrors::Replace => out.push(char::REPLACEMENT_CHARACTER),
                    }
                }
                Ok(out)
            }
        }
    }

    fn decode_utf8(&self, bytes: &[u8]) -> Result<String> {
        match self.errors {
            EncodingErrors::Replace => Ok(String::from_utf8_lossy(bytes).into_owned()),
            EncodingErrors::Strict => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| Error::Encoding(format!("'utf-8' codec can't decode: {}", e))),
            EncodingErrors::Ignore => {
                let mut out = String::with_capacity(bytes.len());
                let mut rest = bytes;
                loop {
                    match std::str::from_utf8(rest) {
                        Ok(valid) => {
                            out.push_str(valid);
                            return Ok(out);
                        }
                        Err(e) => {
                            let (valid, after) = rest.split_at(e.valid_up_to());
                            // prefix up to `valid_up_to` is always UTF-8
                            out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                            let skip = e.error_len().unwrap_or(after.len());
                            rest = &after[skip..];
                        }
                    }
                }
            }
        }
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::utf8()
    }
}
