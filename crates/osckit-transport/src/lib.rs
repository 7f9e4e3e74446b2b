//! osckit transport layer
//!
//! OSC 1.0 is datagram based. The core only needs two primitives from a
//! transport: send bytes to a peer, and receive bytes along with the peer
//! they came from. [`DatagramTransport`] captures that; [`UdpTransport`] is the
//! tokio UDP implementation.

pub mod error;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use traits::DatagramTransport;
pub use udp::{resolve, UdpConfig, UdpTransport};
