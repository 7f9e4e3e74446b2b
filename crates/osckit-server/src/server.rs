//! OSC server
//!
//! An [`OscServer`] owns any number of datagram sockets. Each socket gets a
//! reader task that forwards datagrams into one bounded channel; a single
//! dispatcher task decodes them and runs the bound callbacks.
//!
//! # Example
//!
//! ```no_run
//! use osckit_server::{Callback, OscServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> osckit_server::Result<()> {
//!     let server = OscServer::new(ServerConfig::default());
//!     server.listen("127.0.0.1", 8000, true).await?;
//!
//!     let ping = Callback::new(|request| {
//!         println!("ping from {}", request.sender());
//!         Ok(())
//!     });
//!     server.bind("/ping", &ping, None, false)?;
//!
//!     server.start()?;
//!     server.join(None).await;
//!     Ok(())
//! }
//! ```

use bytes::Bytes;
use osckit_core::{read_packet, OscValue, Stats, TextCodec};
use osckit_transport::{DatagramTransport, TransportError, UdpConfig, UdpTransport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::callback::{Callback, Replier, Request};
use crate::client;
use crate::config::ServerConfig;
use crate::dispatch::{dispatch, DispatchTable, SocketId};
use crate::error::{Result, ServerError};
use crate::meta;

/// Server lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No socket yet
    Created,
    /// Sockets bound, dispatcher not started
    Listening,
    /// Dispatcher running
    Running,
    /// Termination requested
    Terminating,
    /// Sockets closed and dispatcher exited
    Terminated,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Created => "created",
            ServerState::Listening => "listening",
            ServerState::Running => "running",
            ServerState::Terminating => "terminating",
            ServerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A route descriptor for [`OscServer::bind_routes`]
#[derive(Debug, Clone)]
pub struct Route {
    pub address: Vec<u8>,
    pub callback: Callback,
    pub wants_address: bool,
}

impl Route {
    pub fn new(address: impl Into<Vec<u8>>, callback: Callback) -> Self {
        Self {
            address: address.into(),
            callback,
            wants_address: false,
        }
    }

    /// Pass the matched address to the callback
    pub fn with_address(mut self) -> Self {
        self.wants_address = true;
        self
    }
}

enum Event {
    Datagram {
        socket: SocketId,
        data: Bytes,
        from: SocketAddr,
    },
    Failed {
        socket: SocketId,
        error: TransportError,
    },
}

struct SocketEntry {
    transport: Arc<dyn DatagramTransport>,
    reader: JoinHandle<()>,
}

struct Registry {
    table: DispatchTable,
    sockets: HashMap<SocketId, SocketEntry>,
    default: Option<SocketId>,
}

impl Registry {
    fn socket_id(&self, socket: Option<SocketId>) -> Result<SocketId> {
        match socket {
            Some(id) if self.sockets.contains_key(&id) => Ok(id),
            Some(id) => Err(ServerError::UnknownSocket(id)),
            None => self.default.ok_or_else(|| {
                ServerError::Configuration("no socket given and no default socket".to_string())
            }),
        }
    }

    fn transport(&self, socket: Option<SocketId>) -> Result<Arc<dyn DatagramTransport>> {
        let id = self.socket_id(socket)?;
        self.sockets
            .get(&id)
            .map(|entry| Arc::clone(&entry.transport))
            .ok_or(ServerError::UnknownSocket(id))
    }

    fn remove(&mut self, id: SocketId) -> Option<SocketEntry> {
        if self.default == Some(id) {
            self.default = None;
        }
        self.table.remove_socket(id);
        self.sockets.remove(&id)
    }
}

pub(crate) struct Inner {
    config: ServerConfig,
    codec: Option<TextCodec>,
    registry: Mutex<Registry>,
    state: watch::Sender<ServerState>,
    shutdown: watch::Sender<bool>,
    events: mpsc::Sender<Event>,
    receiver: Mutex<Option<mpsc::Receiver<Event>>>,
    next_socket: AtomicU64,
    stats_received: Mutex<Stats>,
    stats_sent: Arc<Mutex<Stats>>,
}

impl Inner {
    pub(crate) fn stats_received(&self) -> Stats {
        self.stats_received.lock().clone()
    }

    pub(crate) fn stats_sent(&self) -> Stats {
        self.stats_sent.lock().clone()
    }

    pub(crate) fn addresses(&self, socket: SocketId) -> Vec<Vec<u8>> {
        self.registry.lock().table.addresses(socket)
    }

    fn handle_event(&self, event: Event) -> Result<()> {
        match event {
            Event::Datagram { socket, data, from } => self.handle_datagram(socket, &data, from),
            Event::Failed { socket, error } => {
                if self.registry.lock().sockets.contains_key(&socket) {
                    Err(error.into())
                } else {
                    debug!("ignoring receive error on closed {}: {}", socket, error);
                    Ok(())
                }
            }
        }
    }

    fn handle_datagram(&self, socket: SocketId, data: &[u8], from: SocketAddr) -> Result<()> {
        let transport = match self.registry.lock().sockets.get(&socket) {
            Some(entry) => Arc::clone(&entry.transport),
            None => {
                warn!("skipping datagram from {} on closed {}", from, socket);
                return Ok(());
            }
        };

        let messages = match read_packet(data, self.config.drop_late_bundles, self.codec.as_ref())
        {
            Ok(messages) => messages,
            Err(err) => {
                warn!("dropping packet of {} bytes from {}: {}", data.len(), from, err);
                return Ok(());
            }
        };
        debug!(
            "{} received {} message(s) from {}",
            socket,
            messages.len(),
            from
        );

        let replier = Replier::new(transport, self.codec, Arc::clone(&self.stats_sent));
        for (message, offset) in &messages {
            *self.stats_received.lock() += Stats::for_message(*offset, &message.tags);

            let groups = self.registry.lock().table.resolve(socket, &message.address);
            if groups.is_empty() {
                debug!("no route for {}", message.address_str());
                continue;
            }

            let request = Request::new(&message.address, &message.values, from, socket)
                .with_replier(&replier);
            for group in &groups {
                dispatch(group, &request, self.config.intercept_errors)?;
            }
        }
        Ok(())
    }

    /// Close every socket and mark the server terminated
    fn finish(&self) {
        let sockets: Vec<(SocketId, SocketEntry)> = {
            let mut registry = self.registry.lock();
            let ids: Vec<SocketId> = registry.sockets.keys().copied().collect();
            ids.into_iter()
                .filter_map(|id| registry.remove(id).map(|entry| (id, entry)))
                .collect()
        };
        for (id, entry) in sockets {
            entry.reader.abort();
            debug!("{} closed", id);
        }
        self.receiver.lock().take();
        self.state.send_replace(ServerState::Terminated);
        info!("OSC server terminated");
    }
}

/// OSC server
///
/// Cheap to clone; clones share the same sockets and routes.
#[derive(Clone)]
pub struct OscServer {
    inner: Arc<Inner>,
}

impl OscServer {
    pub fn new(config: ServerConfig) -> Self {
        let (events, receiver) = mpsc::channel(config.channel_capacity.max(1));
        let (state, _) = watch::channel(ServerState::Created);
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                codec: config.text_codec(),
                registry: Mutex::new(Registry {
                    table: DispatchTable::new(config.advanced_matching),
                    sockets: HashMap::new(),
                    default: None,
                }),
                config,
                state,
                shutdown,
                events,
                receiver: Mutex::new(Some(receiver)),
                next_socket: AtomicU64::new(1),
                stats_received: Mutex::new(Stats::new()),
                stats_sent: Arc::new(Mutex::new(Stats::new())),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ServerState {
        *self.inner.state.borrow()
    }

    /// Bind a UDP socket on `host:port` and start reading from it
    ///
    /// Port 0 picks a free port; see [`OscServer::local_addr`].
    pub async fn listen(&self, host: &str, port: u16, default: bool) -> Result<SocketId> {
        let addr = osckit_transport::resolve(host, port).await?;
        let config = UdpConfig {
            max_packet_size: self.inner.config.max_packet_size,
            ..Default::default()
        };
        let transport = UdpTransport::bind_with_config(&addr.to_string(), config).await?;
        self.add_socket(Arc::new(transport), default)
    }

    /// Add an already bound transport
    ///
    /// Must be called from within a Tokio runtime. The reserved `/_osckit/`
    /// routes are bound on the new socket.
    pub fn add_socket(
        &self,
        transport: Arc<dyn DatagramTransport>,
        default: bool,
    ) -> Result<SocketId> {
        let state = self.state();
        if matches!(state, ServerState::Terminating | ServerState::Terminated) {
            return Err(ServerError::State(state.to_string()));
        }

        let local = transport.local_addr()?;
        let id = SocketId::new(self.inner.next_socket.fetch_add(1, Ordering::Relaxed));
        {
            let mut registry = self.inner.registry.lock();
            if default {
                if let Some(existing) = registry.default {
                    return Err(ServerError::DuplicateDefaultSocket(existing));
                }
            }

            for (address, callback) in meta::routes(Arc::downgrade(&self.inner)) {
                registry.table.bind(id, address.as_bytes(), callback, false)?;
            }

            let reader = spawn_reader(
                id,
                Arc::clone(&transport),
                self.inner.events.clone(),
                self.inner.config.max_packet_size,
            );
            registry.sockets.insert(id, SocketEntry { transport, reader });
            if default {
                registry.default = Some(id);
            }
        }

        self.inner.state.send_if_modified(|state| {
            if *state == ServerState::Created {
                *state = ServerState::Listening;
                true
            } else {
                false
            }
        });
        info!("OSC {} listening on {}", id, local);
        Ok(id)
    }

    /// Bind `callback` to `address` on `socket`, or the default socket
    pub fn bind(
        &self,
        address: impl AsRef<[u8]>,
        callback: &Callback,
        socket: Option<SocketId>,
        wants_address: bool,
    ) -> Result<()> {
        let mut registry = self.inner.registry.lock();
        let id = registry.socket_id(socket)?;
        registry
            .table
            .bind(id, address.as_ref(), callback.clone(), wants_address)
    }

    /// Remove `callback` from `address` on `socket`, or the default socket
    pub fn unbind(
        &self,
        address: impl AsRef<[u8]>,
        callback: &Callback,
        socket: Option<SocketId>,
    ) -> Result<()> {
        let mut registry = self.inner.registry.lock();
        let id = registry.socket_id(socket)?;
        let removed = registry.table.unbind(id, address.as_ref(), callback);
        debug!("unbound {} callback(s) on {}", removed, id);
        Ok(())
    }

    /// Bind every route of a declared list
    pub fn bind_routes(&self, routes: &[Route], socket: Option<SocketId>) -> Result<()> {
        for route in routes {
            self.bind(&route.address, &route.callback, socket, route.wants_address)?;
        }
        Ok(())
    }

    /// Handler for messages that match no route, on any socket
    pub fn set_default_handler(&self, callback: Option<Callback>) {
        self.inner.registry.lock().table.set_default(callback);
    }

    /// Addresses with at least one callback on `socket`
    pub fn routes(&self, socket: Option<SocketId>) -> Result<Vec<Vec<u8>>> {
        let registry = self.inner.registry.lock();
        let id = registry.socket_id(socket)?;
        Ok(registry.table.addresses(id))
    }

    /// Local address of `socket`, or of the default socket
    pub fn local_addr(&self, socket: Option<SocketId>) -> Result<SocketAddr> {
        let transport = self.inner.registry.lock().transport(socket)?;
        Ok(transport.local_addr()?)
    }

    /// Sockets currently open
    pub fn sockets(&self) -> Vec<SocketId> {
        let mut ids: Vec<SocketId> = self.inner.registry.lock().sockets.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Stop listening on `socket`, or on the default socket
    ///
    /// Its routes are dropped; datagrams already queued from it are skipped.
    pub fn stop(&self, socket: Option<SocketId>) -> Result<()> {
        let (id, entry) = {
            let mut registry = self.inner.registry.lock();
            let id = registry.socket_id(socket)?;
            let entry = registry.remove(id).ok_or(ServerError::UnknownSocket(id))?;
            (id, entry)
        };
        entry.reader.abort();
        info!("OSC {} stopped", id);
        Ok(())
    }

    /// Same as [`OscServer::stop`]
    pub fn close(&self, socket: Option<SocketId>) -> Result<()> {
        self.stop(socket)
    }

    /// Stop every socket; the server stays usable
    pub fn stop_all(&self) {
        for id in self.sockets() {
            if let Err(err) = self.stop(Some(id)) {
                debug!("{} already gone: {}", id, err);
            }
        }
    }

    /// Start dispatching received datagrams
    ///
    /// Must be called from within a Tokio runtime. Starting a running server
    /// is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut events = None;
        let mut refused = None;
        self.inner.state.send_if_modified(|state| match *state {
            ServerState::Running => false,
            ServerState::Terminating | ServerState::Terminated => {
                refused = Some(state.to_string());
                false
            }
            ServerState::Created | ServerState::Listening => {
                match self.inner.receiver.lock().take() {
                    Some(receiver) => {
                        events = Some(receiver);
                        *state = ServerState::Running;
                        true
                    }
                    None => {
                        refused = Some("already started".to_string());
                        false
                    }
                }
            }
        });

        if let Some(reason) = refused {
            return Err(ServerError::State(reason));
        }
        if let Some(events) = events {
            tokio::spawn(run(Arc::clone(&self.inner), events));
            info!("OSC server running");
        }
        Ok(())
    }

    /// Request termination
    ///
    /// A running dispatcher stops at its next datagram boundary; a callback
    /// already running is not interrupted. Use [`OscServer::join`] to wait.
    pub fn terminate(&self) {
        let mut requested = false;
        let mut dispatcher_running = false;
        self.inner.state.send_if_modified(|state| match *state {
            ServerState::Terminating | ServerState::Terminated => false,
            ServerState::Running => {
                *state = ServerState::Terminating;
                requested = true;
                dispatcher_running = true;
                true
            }
            ServerState::Created | ServerState::Listening => {
                *state = ServerState::Terminating;
                requested = true;
                true
            }
        });

        if requested {
            self.inner.shutdown.send_replace(true);
            if !dispatcher_running {
                self.inner.finish();
            }
        }
    }

    /// Wait for the server to terminate
    ///
    /// Returns `false` if `timeout` expired first; the server is left as it
    /// was.
    pub async fn join(&self, timeout: Option<Duration>) -> bool {
        let mut state = self.inner.state.subscribe();
        let terminated = async move {
            state
                .wait_for(|s| *s == ServerState::Terminated)
                .await
                .is_ok()
        };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, terminated)
                .await
                .unwrap_or(false),
            None => terminated.await,
        }
    }

    /// Send a message from `socket`, or the default socket
    pub async fn send_message(
        &self,
        address: impl AsRef<[u8]>,
        values: &[OscValue],
        target: SocketAddr,
        socket: Option<SocketId>,
    ) -> Result<Stats> {
        let transport = self.inner.registry.lock().transport(socket)?;
        let stats = client::send_message(
            transport.as_ref(),
            address.as_ref(),
            values,
            target,
            self.inner.codec.as_ref(),
        )
        .await?;
        *self.inner.stats_sent.lock() += &stats;
        Ok(stats)
    }

    /// Send a bundle from `socket`, or the default socket
    pub async fn send_bundle<A: AsRef<[u8]>>(
        &self,
        messages: &[(A, Vec<OscValue>)],
        target: SocketAddr,
        timetag: Option<f64>,
        socket: Option<SocketId>,
    ) -> Result<Stats> {
        let transport = self.inner.registry.lock().transport(socket)?;
        let stats = client::send_bundle(
            transport.as_ref(),
            messages,
            target,
            timetag,
            self.inner.codec.as_ref(),
        )
        .await?;
        *self.inner.stats_sent.lock() += &stats;
        Ok(stats)
    }

    /// Everything received so far
    pub fn stats_received(&self) -> Stats {
        self.inner.stats_received()
    }

    /// Everything sent so far, including answers
    pub fn stats_sent(&self) -> Stats {
        self.inner.stats_sent()
    }
}

fn spawn_reader(
    socket: SocketId,
    transport: Arc<dyn DatagramTransport>,
    events: mpsc::Sender<Event>,
    max_packet_size: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; max_packet_size];
        loop {
            match transport.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    let event = Event::Datagram {
                        socket,
                        data: Bytes::copy_from_slice(&buf[..len]),
                        from,
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Err(err) if err.is_transient() => {
                    debug!("{} ignoring receive error: {}", socket, err);
                }
                Err(err) => {
                    let _ = events.send(Event::Failed { socket, error: err }).await;
                    break;
                }
            }
        }
        debug!("{} reader exited", socket);
    })
}

async fn run(inner: Arc<Inner>, mut events: mpsc::Receiver<Event>) {
    let mut shutdown = inner.shutdown.subscribe();
    loop {
        let stopping = *shutdown.borrow();
        if stopping {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            event = events.recv() => match event {
                Some(event) => {
                    if let Err(err) = inner.handle_event(event) {
                        error!("OSC server stopping: {}", err);
                        break;
                    }
                }
                None => break,
            },
        }
    }
    inner.finish();
}
