//! Transport error types

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed { addr: String, source: io::Error },

    #[error("send to {target} failed: {source}")]
    SendFailed { target: SocketAddr, source: io::Error },

    #[error("receive failed: {0}")]
    ReceiveFailed(io::Error),

    #[error("could not resolve {0}")]
    Resolve(String),

    #[error("transport closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Errors a receive loop should skip rather than stop on
    ///
    /// Some platforms report an ICMP port unreachable from a previous send as
    /// a reset on the next receive.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::ReceiveFailed(e) | TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}
