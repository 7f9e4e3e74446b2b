//! Callbacks and the per-message request context

use osckit_core::{format_bundle, format_message, OscValue, Stats, TextCodec};
use osckit_transport::DatagramTransport;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::fmt;
use std::mem;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use crate::dispatch::SocketId;
use crate::error::{Result, ServerError};

type Handler = dyn Fn(&Request<'_>) -> anyhow::Result<()> + Send + Sync;

/// A handler bound to one or more addresses
///
/// Handlers without captured state (`fn` items, capture-less closures) are
/// equal whenever they wrap the same function. Capturing closures are equal
/// only to clones of the same `Callback`.
#[derive(Clone)]
pub struct Callback {
    handler: Arc<Handler>,
    function: Option<TypeId>,
}

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Request<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let function = (mem::size_of::<F>() == 0).then(TypeId::of::<F>);
        Self {
            handler: Arc::new(f),
            function,
        }
    }

    /// Whether both wrap the same handler
    pub fn same(&self, other: &Callback) -> bool {
        match (self.function, other.function) {
            (Some(a), Some(b)) => a == b,
            _ => Arc::ptr_eq(&self.handler, &other.handler),
        }
    }

    /// Run the handler, turning both returned errors and panics into
    /// [`ServerError::Callback`]
    pub fn invoke(&self, request: &Request<'_>) -> Result<()> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(request))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ServerError::Callback {
                address: request.address_lossy(),
                message: format!("{:#}", err),
            }),
            Err(payload) => Err(ServerError::Callback {
                address: request.address_lossy(),
                message: format!("panicked: {}", panic_message(&*payload)),
            }),
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.handler))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}

/// Where answers to a request go out from
#[derive(Clone)]
pub struct Replier {
    pub(crate) transport: Arc<dyn DatagramTransport>,
    pub(crate) codec: Option<TextCodec>,
    pub(crate) stats_sent: Arc<Mutex<Stats>>,
}

impl Replier {
    pub fn new(
        transport: Arc<dyn DatagramTransport>,
        codec: Option<TextCodec>,
        stats_sent: Arc<Mutex<Stats>>,
    ) -> Self {
        Self {
            transport,
            codec,
            stats_sent,
        }
    }

    fn send(&self, data: &[u8], stats: Stats, target: SocketAddr) -> Result<Stats> {
        self.transport.try_send_to(data, target)?;
        *self.stats_sent.lock() += &stats;
        Ok(stats)
    }
}

/// Everything a callback learns about the message it handles
///
/// The matched address is only present when the callback was bound asking
/// for it.
#[derive(Clone, Copy)]
pub struct Request<'a> {
    route: &'a [u8],
    address: Option<&'a [u8]>,
    values: &'a [OscValue],
    sender: SocketAddr,
    socket: SocketId,
    replier: Option<&'a Replier>,
}

impl<'a> Request<'a> {
    pub fn new(
        address: &'a [u8],
        values: &'a [OscValue],
        sender: SocketAddr,
        socket: SocketId,
    ) -> Self {
        Self {
            route: address,
            address: Some(address),
            values,
            sender,
            socket,
            replier: None,
        }
    }

    /// Attach the socket answers are sent from
    pub fn with_replier(mut self, replier: &'a Replier) -> Self {
        self.replier = Some(replier);
        self
    }

    pub(crate) fn without_address(mut self) -> Self {
        self.address = None;
        self
    }

    /// The concrete address the message was sent to
    pub fn address(&self) -> Option<&'a [u8]> {
        self.address
    }

    pub fn values(&self) -> &'a [OscValue] {
        self.values
    }

    /// Where the datagram came from
    pub fn sender(&self) -> SocketAddr {
        self.sender
    }

    /// The server socket it arrived on
    pub fn socket(&self) -> SocketId {
        self.socket
    }

    fn address_lossy(&self) -> String {
        String::from_utf8_lossy(self.route).into_owned()
    }

    fn target(&self, port: Option<u16>) -> SocketAddr {
        let mut target = self.sender;
        if let Some(port) = port {
            target.set_port(port);
        }
        target
    }

    fn replier(&self) -> Result<&'a Replier> {
        self.replier.ok_or_else(|| {
            ServerError::Configuration("request has no socket to answer from".to_string())
        })
    }

    /// Send a message back to the sender
    ///
    /// Goes out from the receiving socket, to the sender's port unless `port`
    /// overrides it.
    pub fn answer(
        &self,
        address: impl AsRef<[u8]>,
        values: &[OscValue],
        port: Option<u16>,
    ) -> Result<Stats> {
        let replier = self.replier()?;
        let (data, stats) = format_message(address.as_ref(), values, replier.codec.as_ref())?;
        let target = self.target(port);
        debug!("answering {} with {} bytes", target, data.len());
        replier.send(&data, stats, target)
    }

    /// Send a bundle back to the sender
    pub fn answer_bundle<A: AsRef<[u8]>>(
        &self,
        messages: &[(A, Vec<OscValue>)],
        timetag: Option<f64>,
        port: Option<u16>,
    ) -> Result<Stats> {
        let replier = self.replier()?;
        let (data, stats) = format_bundle(messages, timetag, replier.codec.as_ref())?;
        replier.send(&data, stats, self.target(port))
    }
}

impl fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("address", &self.address.map(String::from_utf8_lossy))
            .field("values", &self.values)
            .field("sender", &self.sender)
            .field("socket", &self.socket)
            .finish()
    }
}
