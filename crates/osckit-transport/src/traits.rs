//! Transport trait definitions

use async_trait::async_trait;
use std::net::SocketAddr;

use crate::error::Result;

/// A connectionless, message oriented socket
///
/// Each `recv_from` returns exactly one datagram. Implementations must be
/// shareable across tasks: one task may be blocked in `recv_from` while others
/// send.
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    /// Send one datagram to `target`
    async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()>;

    /// Send one datagram without waiting
    ///
    /// Used from synchronous callbacks. Fails instead of blocking when the
    /// socket is not writable.
    fn try_send_to(&self, data: &[u8], target: SocketAddr) -> Result<()>;

    /// Receive one datagram into `buf`
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;

    /// Local address the transport is bound to
    fn local_addr(&self) -> Result<SocketAddr>;
}
