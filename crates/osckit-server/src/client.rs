//! Sending side
//!
//! Free functions take the transport explicitly; [`OscClient`] pairs a
//! transport with a target and keeps running totals.

use osckit_core::{format_bundle, format_message, OscValue, Stats, TextCodec};
use osckit_transport::{resolve, DatagramTransport, UdpTransport};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

/// Encode and send one message, returning what was sent
pub async fn send_message(
    transport: &dyn DatagramTransport,
    address: &[u8],
    values: &[OscValue],
    target: SocketAddr,
    codec: Option<&TextCodec>,
) -> Result<Stats> {
    let (data, stats) = format_message(address, values, codec)?;
    transport.send_to(&data, target).await?;
    debug!(
        "sent {} ({} bytes) to {}",
        String::from_utf8_lossy(address),
        data.len(),
        target
    );
    Ok(stats)
}

/// Encode and send one bundle, returning what was sent
///
/// `timetag` is a Unix time; `None` sends an immediate bundle.
pub async fn send_bundle<A: AsRef<[u8]>>(
    transport: &dyn DatagramTransport,
    messages: &[(A, Vec<OscValue>)],
    target: SocketAddr,
    timetag: Option<f64>,
    codec: Option<&TextCodec>,
) -> Result<Stats> {
    let (data, stats) = format_bundle(messages, timetag, codec)?;
    transport.send_to(&data, target).await?;
    debug!(
        "sent bundle of {} messages ({} bytes) to {}",
        messages.len(),
        data.len(),
        target
    );
    Ok(stats)
}

/// Sends to one fixed target
pub struct OscClient {
    target: SocketAddr,
    transport: Arc<dyn DatagramTransport>,
    codec: Option<TextCodec>,
    stats: Mutex<Stats>,
}

impl OscClient {
    pub fn new(
        transport: Arc<dyn DatagramTransport>,
        target: SocketAddr,
        codec: Option<TextCodec>,
    ) -> Self {
        Self {
            target,
            transport,
            codec,
            stats: Mutex::new(Stats::new()),
        }
    }

    /// Resolve `host:port` and send from an ephemeral UDP socket
    pub async fn connect(host: &str, port: u16, codec: Option<TextCodec>) -> Result<Self> {
        let target = resolve(host, port).await?;
        let local = if target.is_ipv6() {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let transport = UdpTransport::bind(local).await?;
        Ok(Self::new(Arc::new(transport), target, codec))
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.transport.local_addr()?)
    }

    pub async fn send_message(
        &self,
        address: impl AsRef<[u8]>,
        values: &[OscValue],
    ) -> Result<Stats> {
        let stats = send_message(
            self.transport.as_ref(),
            address.as_ref(),
            values,
            self.target,
            self.codec.as_ref(),
        )
        .await?;
        *self.stats.lock() += &stats;
        Ok(stats)
    }

    pub async fn send_bundle<A: AsRef<[u8]>>(
        &self,
        messages: &[(A, Vec<OscValue>)],
        timetag: Option<f64>,
    ) -> Result<Stats> {
        let stats = send_bundle(
            self.transport.as_ref(),
            messages,
            self.target,
            timetag,
            self.codec.as_ref(),
        )
        .await?;
        *self.stats.lock() += &stats;
        Ok(stats)
    }

    /// Totals over every send so far
    pub fn stats(&self) -> Stats {
        self.stats.lock().clone()
    }
}
