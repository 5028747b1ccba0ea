//! Dht node.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ed25519_dalek::SigningKey;
use flume::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::common::{Id, Message, Node, RoutingTable};
use crate::rpc::{Config, KrpcSocket, Protocol};
use crate::{Error, Result};

/// Requesters waiting to be acked. Past this, new requesters are not acked.
const ACK_QUEUE_SIZE: usize = 128;

#[derive(Debug, Clone)]
/// A Kademlia node answering pings and FIND_NODE requests over UDP.
///
/// Runs two threads: an actor answering incoming requests, and an acker feeding
/// every requester through [Protocol::ack], so liveness probes never hold up
/// responses. Clones share the same node; call [Dht::shutdown] to stop it, or drop
/// every clone to let its threads wind down on their own.
pub struct Dht {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    protocol: Arc<Protocol<KrpcSocket>>,
    request_timeout: Duration,
    running: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Dht {
    /// Binds the socket, starts the node's threads and bootstraps from [Config::bootstrap].
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let signing_key = config
            .signing_key
            .unwrap_or_else(|| SigningKey::from_bytes(&rand::random()));
        let id = Id::from(&signing_key.verifying_key());

        let socket = Arc::new(KrpcSocket::bind(
            config.bind_address,
            id,
            config.public_address,
        )?);
        let protocol = Arc::new(Protocol::new(socket, config.protocol)?);

        let running = Arc::new(AtomicBool::new(true));
        let (ack_tx, ack_rx) = flume::bounded(ACK_QUEUE_SIZE);

        let actor = thread::Builder::new().name("kademlia-actor".into()).spawn({
            let protocol = protocol.clone();
            let running = running.clone();
            move || run_actor(&protocol, &running, ack_tx)
        })?;

        let acker = thread::Builder::new().name("kademlia-ack".into()).spawn({
            let protocol = protocol.clone();
            move || run_acker(&protocol, ack_rx)
        })?;

        info!(id = %protocol.local().id, address = ?protocol.local().address, "Dht node started");

        let dht = Dht {
            inner: Arc::new(Inner {
                protocol,
                request_timeout: config.request_timeout,
                running,
                handles: Mutex::new(vec![actor, acker]),
            }),
        };

        if !config.bootstrap.is_empty() {
            dht.bootstrap(&config.bootstrap);
        }

        Ok(dht)
    }

    // === Getters ===

    /// This node's [Node] record as advertised to others.
    pub fn local(&self) -> &Node {
        self.inner.protocol.local()
    }

    /// Returns the address the UDP socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.protocol.network().local_addr()
    }

    /// Returns the routing table.
    pub fn table(&self) -> &Arc<RoutingTable> {
        self.inner.protocol.table()
    }

    pub fn protocol(&self) -> &Protocol<KrpcSocket> {
        &self.inner.protocol
    }

    // === Public Methods ===

    /// See [Protocol::find].
    pub fn find(&self, target: Id) -> Vec<Node> {
        self.inner.protocol.find(target)
    }

    /// See [Protocol::discover].
    pub fn discover(&self) -> Vec<Node> {
        self.inner.protocol.discover()
    }

    /// Pings `address`, acking and returning the node that answered.
    pub fn ping(&self, address: SocketAddr) -> Result<Node> {
        let (node, response) =
            self.inner
                .protocol
                .network()
                .exchange(address, Message::Ping, self.inner.request_timeout)?;

        match response {
            Message::Pong => {
                self.inner.protocol.ack(node.clone());
                Ok(node)
            }
            other => Err(Error::UnexpectedResponse {
                expected: "pong",
                got: other.kind(),
            }),
        }
    }

    /// Pings every address to learn who is there, then discovers nodes close to this one.
    ///
    /// Returns the closest nodes the discovery found.
    pub fn bootstrap(&self, addresses: &[SocketAddr]) -> Vec<Node> {
        for address in addresses {
            if let Err(error) = self.ping(*address) {
                debug!(?address, ?error, "Bootstrap node did not respond");
            }
        }

        let closest = self.discover();

        if self.table().is_empty() {
            debug!("Could not bootstrap the routing table");
        } else {
            debug!(table_size = self.table().len(), "Populated the routing table");
        }

        closest
    }

    /// Stops the node's threads and waits for them to exit.
    pub fn shutdown(&self) {
        self.inner.running.store(false, Ordering::Relaxed);

        let handles: Vec<_> = self.inner.handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Returns true until [Self::shutdown] is called.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Relaxed)
    }
}

/// Answers incoming requests until `running` is cleared, passing requesters on to be acked.
fn run_actor(protocol: &Protocol<KrpcSocket>, running: &AtomicBool, acks: Sender<Node>) {
    let socket = protocol.network();

    while running.load(Ordering::Relaxed) {
        let Some(request) = socket.recv_from() else {
            continue;
        };

        if let Some(response) = protocol.respond(&request.message) {
            if let Err(error) = socket.respond(request.from.address, request.transaction_id, &response)
            {
                debug!(?error, from = ?request.from.id, "Failed to respond");
            }
        }

        if !forward_ack(&acks, request.from) {
            break;
        }
    }

    trace!("Actor stopped");
}

/// Queues `node` to be acked without blocking, dropping it if the acker is behind.
///
/// Returns false once the acker is gone.
fn forward_ack(acks: &Sender<Node>, node: Node) -> bool {
    match acks.try_send(node) {
        Ok(()) => true,
        Err(TrySendError::Full(node)) => {
            trace!(peer = ?node.id, "Ack queue is full, dropping ack");
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Acks every requester the actor forwards, until the actor stops.
fn run_acker(protocol: &Protocol<KrpcSocket>, acks: Receiver<Node>) {
    for node in acks.iter() {
        protocol.ack(node);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
