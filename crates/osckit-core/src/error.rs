//! Error types for the OSC codec and matcher

use thiserror::Error;

/// Result type alias for codec and matcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Codec and matcher errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Packet does not start with `/` or `#`, address lacks its leading `/`,
    /// or the type tag string lacks its leading `,`
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// A type tag byte with no registered decoder
    #[error("no known parser for type tag {:?} at offset {offset}", char::from(*tag))]
    UnknownTypeTag { tag: u8, offset: usize },

    /// Text could not be encoded or decoded under the configured policy
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A value matched no entry of the value-to-tag table
    #[error("unable to find a writer for value {0}")]
    UnsupportedValueType(String),

    /// Input ended before a field was complete
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    /// Address pattern whose glob syntax does not compile
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::InvalidPattern(e.to_string())
    }
}
