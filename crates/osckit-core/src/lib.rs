//! osckit core
//!
//! Wire-level building blocks for Open Sound Control 1.0.
//!
//! This crate provides:
//! - Argument values and their type tags ([`OscValue`], [`MidiMessage`])
//! - Scalar encode/decode with OSC alignment rules ([`codec`])
//! - Whole message and bundle framing ([`message`], [`bundle`])
//! - NTP timetags ([`Timetag`])
//! - Address pattern compilation and matching ([`SmartAddress`], [`PatternCache`])
//! - Traffic accounting ([`Stats`])
//!
//! Nothing here owns a socket. The codec is stateless and safe to call from any
//! number of threads; the only shared state is the pattern cache.

pub mod address;
pub mod bundle;
pub mod codec;
pub mod error;
pub mod message;
pub mod stats;
pub mod text;
pub mod time;
pub mod types;

pub use address::{PatternCache, SmartAddress};
pub use bundle::{format_bundle, read_bundle, read_packet};
pub use codec::padded;
pub use error::{Error, Result};
pub use message::{format_message, read_message, Message};
pub use stats::Stats;
pub use text::{EncodingErrors, TextCodec, TextEncoding};
pub use time::{time_to_timetag, timetag_to_time, Timetag};
pub use types::{MidiMessage, OscValue};

/// Library version, reported by the `/_osckit/version` meta route
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest datagram the receive side will accept
pub const UDP_MAX_SIZE: usize = 65535;

/// Literal header opening every bundle
pub const BUNDLE_HEADER: &[u8; 8] = b"#bundle\0";
