//! UDP broadcast mesh transport
//!
//! Sends go out synchronously on a non-blocking socket to every target
//! address. A background task receives datagrams, updates presence and
//! queues events for `poll_event`. Idle nodes announce themselves with a
//! `Hello` envelope so that they stay visible to their peers.
//!
//! Sockets are opened with `SO_REUSEADDR` so a reset can rebind a fixed
//! port while the old receive task is still winding down.

use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use glowmesh_core::{LinkStatus, MeshError, MeshResult, MeshTime, NodeId, MODE_BROADCAST_INTERVAL};
use glowmesh_wire::{peek_sender, Envelope, MAX_ENVELOPE_SIZE};

use crate::{random_node_id, MeshClock, MeshEvent, MeshTransport, PresenceTable, Sighting};

/// Default UDP port for the mesh
pub const DEFAULT_MESH_PORT: u16 = 47800;

/// Receive buffer, larger than any valid envelope so oversize datagrams
/// are seen (and rejected) whole
const RECV_BUFFER_SIZE: usize = MAX_ENVELOPE_SIZE * 8;

/// UDP transport configuration
#[derive(Clone, Debug)]
pub struct UdpMeshConfig {
    pub node_id: NodeId,
    pub bind_addr: SocketAddr,
    /// Broadcast or unicast addresses every envelope is sent to
    pub targets: Vec<SocketAddr>,
    /// A peer not heard from for this long leaves the membership
    pub peer_timeout: Duration,
    /// Send a `Hello` if nothing else went out for this long
    pub heartbeat_interval: Duration,
    /// Receive-side event queue depth
    pub event_buffer: usize,
}

impl Default for UdpMeshConfig {
    fn default() -> Self {
        UdpMeshConfig {
            node_id: random_node_id(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_MESH_PORT)),
            targets: vec![SocketAddr::from(([255, 255, 255, 255], DEFAULT_MESH_PORT))],
            peer_timeout: Duration::from_secs(3),
            heartbeat_interval: MODE_BROADCAST_INTERVAL,
            event_buffer: 256,
        }
    }
}

impl UdpMeshConfig {
    /// Loopback config on an ephemeral port with no targets
    pub fn loopback(node_id: NodeId) -> Self {
        UdpMeshConfig {
            node_id,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            targets: Vec::new(),
            ..Default::default()
        }
    }
}

/// State shared with the receive task
struct Shared {
    local_id: NodeId,
    presence: Mutex<PresenceTable>,
    link: Mutex<LinkStatus>,
}

/// An open socket and its receive task
struct Link {
    socket: StdUdpSocket,
    local_addr: SocketAddr,
    receiver: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.receiver.abort();
    }
}

/// UDP broadcast implementation of [`MeshTransport`]
pub struct UdpMeshTransport {
    config: UdpMeshConfig,
    shared: Arc<Shared>,
    link: Option<Link>,
    events_tx: mpsc::Sender<MeshEvent>,
    events_rx: mpsc::Receiver<MeshEvent>,
    pending: VecDeque<MeshEvent>,
    runtime: Handle,
    clock: MeshClock,
    last_sent: Instant,
}

impl UdpMeshTransport {
    /// Bind the socket and start receiving. Must be called within a tokio runtime.
    pub async fn bind(config: UdpMeshConfig) -> MeshResult<Self> {
        if !config.node_id.is_valid() {
            return Err(MeshError::InvalidConfig("node id must be non-zero".into()));
        }

        let shared = Arc::new(Shared {
            local_id: config.node_id,
            presence: Mutex::new(PresenceTable::new()),
            link: Mutex::new(LinkStatus::Up),
        });
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let runtime = Handle::current();

        let link = open_link(config.bind_addr, &shared, &events_tx, &runtime)?;
        info!(node = %config.node_id, addr = %link.local_addr, "mesh transport bound");

        Ok(UdpMeshTransport {
            config,
            shared,
            link: Some(link),
            events_tx,
            events_rx,
            pending: VecDeque::new(),
            runtime,
            clock: MeshClock::new(),
            last_sent: Instant::now(),
        })
    }

    /// Bound address, if the link is open
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().map(|link| link.local_addr)
    }

    pub fn add_target(&mut self, addr: SocketAddr) {
        if !self.config.targets.contains(&addr) {
            self.config.targets.push(addr);
        }
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> MeshResult<()> {
        let Some(link) = self.link.as_ref() else {
            *self.shared.link.lock() = LinkStatus::Down;
            return Err(MeshError::TransportNotBound);
        };

        let mut last_err = None;
        for target in &self.config.targets {
            if let Err(e) = link.socket.send_to(bytes, target) {
                if e.kind() == std::io::ErrorKind::WouldBlock {
                    trace!(%target, "send buffer full, datagram dropped");
                    continue;
                }
                debug!(%target, error = %e, "send failed");
                last_err = Some(e);
            }
        }
        self.last_sent = Instant::now();

        match last_err {
            Some(e) => {
                *self.shared.link.lock() = LinkStatus::Down;
                Err(MeshError::TransportError(e.to_string()))
            }
            None => Ok(()),
        }
    }

    fn reopen(&mut self) -> MeshResult<()> {
        let addr = self.config.bind_addr;
        let link = open_link(addr, &self.shared, &self.events_tx, &self.runtime)?;
        info!(addr = %link.local_addr, "mesh transport reopened");
        self.link = Some(link);
        *self.shared.link.lock() = LinkStatus::Up;
        Ok(())
    }

    /// Close the link; the receive task stops and the status goes Down
    fn close(&mut self) {
        self.link = None;
        *self.shared.link.lock() = LinkStatus::Down;
    }
}

impl MeshTransport for UdpMeshTransport {
    fn local_id(&self) -> NodeId {
        self.shared.local_id
    }

    fn current_membership(&self) -> Vec<NodeId> {
        self.shared.presence.lock().members()
    }

    fn mesh_now(&self) -> MeshTime {
        self.clock.now()
    }

    fn broadcast(&mut self, envelope: &Envelope) -> MeshResult<()> {
        self.send_bytes(&envelope.to_bytes())
    }

    /// Reopen a closed link, expire peers, re-anchor the clock and send a
    /// heartbeat when due
    fn maintain(&mut self) {
        if self.link.is_none() {
            if let Err(e) = self.reopen() {
                trace!(error = %e, "mesh transport still closed");
                return;
            }
        }

        let expired = self
            .shared
            .presence
            .lock()
            .expire(Instant::now(), self.config.peer_timeout);
        if !expired.is_empty() {
            debug!(?expired, "peers timed out");
            self.pending.push_back(MeshEvent::MembershipChanged);
        }

        if let Some(offset) = self.clock.check_adjust() {
            self.pending.push_back(MeshEvent::ClockAdjusted(offset));
        }

        if self.last_sent.elapsed() >= self.config.heartbeat_interval {
            let hello = Envelope::hello(self.shared.local_id, self.clock.now());
            // Failures already mark the link down
            let _ = self.send_bytes(&hello.to_bytes());
        }
    }

    fn poll_event(&mut self) -> Option<MeshEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        self.events_rx.try_recv().ok()
    }

    fn link_status(&self) -> LinkStatus {
        *self.shared.link.lock()
    }

    fn reset(&mut self) -> MeshResult<()> {
        warn!(node = %self.shared.local_id, "reinitializing mesh transport");
        self.close();
        self.shared.presence.lock().clear();
        self.pending.push_back(MeshEvent::MembershipChanged);
        // A failed reopen is retried from maintain
        self.reopen()
    }
}

fn open_link(
    addr: SocketAddr,
    shared: &Arc<Shared>,
    events: &mpsc::Sender<MeshEvent>,
    runtime: &Handle,
) -> MeshResult<Link> {
    let transport_err = |e: std::io::Error| MeshError::TransportError(e.to_string());

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP)).map_err(transport_err)?;
    socket.set_reuse_address(true).map_err(transport_err)?;
    socket.set_broadcast(true).map_err(transport_err)?;
    socket.bind(&addr.into()).map_err(transport_err)?;
    socket.set_nonblocking(true).map_err(transport_err)?;
    let socket: StdUdpSocket = socket.into();
    let local_addr = socket.local_addr().map_err(transport_err)?;

    let recv_socket = socket.try_clone().map_err(transport_err)?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let receiver = {
        let _guard = runtime.enter();
        let recv_socket = UdpSocket::from_std(recv_socket).map_err(transport_err)?;
        runtime.spawn(receive_loop(recv_socket, Arc::clone(shared), events.clone(), shutdown_rx))
    };

    Ok(Link {
        socket,
        local_addr,
        receiver,
        shutdown: Some(shutdown_tx),
    })
}

async fn receive_loop(
    socket: UdpSocket,
    shared: Arc<Shared>,
    events: mpsc::Sender<MeshEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    loop {
        let received = tokio::select! {
            _ = &mut shutdown => return,
            received = socket.recv_from(&mut buf) => received,
        };
        let (len, addr) = match received {
            Ok(received) => received,
            Err(e) => {
                warn!(error = %e, "UDP receive error");
                *shared.link.lock() = LinkStatus::Down;
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        let datagram = &buf[..len];
        let Some(claimed) = peek_sender(datagram) else {
            trace!(%addr, len, "runt datagram dropped");
            continue;
        };
        if claimed == shared.local_id {
            continue; // our own broadcast
        }

        let sighting = shared.presence.lock().observe(claimed, addr, Instant::now());
        let mut batch = Vec::with_capacity(3);
        match sighting {
            Sighting::Joined(id) => {
                debug!(peer = %id, %addr, "peer heard for the first time");
                batch.push(MeshEvent::PeerJoined(id));
                batch.push(MeshEvent::MembershipChanged);
            }
            Sighting::Replaced { old, new } => {
                info!(%old, %new, %addr, "peer came back under a new identifier");
                batch.push(MeshEvent::PeerJoined(new));
                batch.push(MeshEvent::MembershipChanged);
            }
            Sighting::Refreshed(_) => {}
        }
        batch.push(MeshEvent::Received {
            from: sighting.node(),
            payload: Bytes::copy_from_slice(datagram),
        });

        for event in batch {
            if events.send(event).await.is_err() {
                return; // transport dropped
            }
        }
    }
}
