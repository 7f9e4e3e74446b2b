//! UDP transport implementation

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DatagramTransport;

/// UDP configuration
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Maximum packet size accepted on receive
    pub max_packet_size: usize,
    /// Allow sending to broadcast addresses
    pub broadcast: bool,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            max_packet_size: 65535,
            broadcast: false,
        }
    }
}

/// UDP transport (connectionless)
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    config: UdpConfig,
}

impl UdpTransport {
    /// Bind to a local address, e.g. `"127.0.0.1:0"` or `"localhost:8000"`
    pub async fn bind(addr: &str) -> Result<Self> {
        Self::bind_with_config(addr, UdpConfig::default()).await
    }

    /// Bind with config
    pub async fn bind_with_config(addr: &str, config: UdpConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            })?;

        if config.broadcast {
            socket.set_broadcast(true)?;
        }

        info!("UDP bound to {}", socket.local_addr()?);

        Ok(Self {
            socket: Arc::new(socket),
            config,
        })
    }

    /// Wrap an already bound std socket
    pub fn from_std(socket: std::net::UdpSocket) -> Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket: Arc::new(UdpSocket::from_std(socket)?),
            config: UdpConfig::default(),
        })
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    /// Enable broadcast
    pub fn set_broadcast(&self, enable: bool) -> Result<()> {
        self.socket.set_broadcast(enable).map_err(TransportError::Io)
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        self.socket
            .send_to(data, target)
            .await
            .map_err(|source| TransportError::SendFailed { target, source })?;
        Ok(())
    }

    fn try_send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        self.socket
            .try_send_to(data, target)
            .map_err(|source| TransportError::SendFailed { target, source })?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let (len, from) = self
            .socket
            .recv_from(buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        debug!("UDP received {} bytes from {}", len, from);
        Ok((len, from))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(TransportError::Io)
    }
}

/// Resolve `host:port` to the first matching socket address
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let target = format!("{}:{}", host, port);
    let first = tokio::net::lookup_host(target.as_str())
        .await
        .map_err(|_| TransportError::Resolve(target.clone()))?
        .next();
    first.ok_or(TransportError::Resolve(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_bind() {
        let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();
        assert!(addr.port() > 0);
    }

    #[tokio::test]
    async fn test_udp_send_recv() {
        let server = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let client = UdpTransport::bind("127.0.0.1:0").await.unwrap();

        let server_addr = server.local_addr().unwrap();
        client.send_to(b"hello", server_addr).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from.port(), client.local_addr().unwrap().port());
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let addr = resolve("127.0.0.1", 9000).await.unwrap();
        assert_eq!(addr.port(), 9000);
    }

    #[tokio::test]
    async fn test_resolve_bad_host() {
        let err = resolve("no such host", 9000).await.unwrap_err();
        assert!(matches!(err, TransportError::Resolve(ref t) if t == "no such host:9000"));
    }
}
